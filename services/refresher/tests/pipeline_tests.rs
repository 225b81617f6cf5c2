//! End-to-end scheduler tests with scripted source adapters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use forecast_common::{
    CanonicalDataset, Field, GridCoords, RawDataset, RefreshError, RefreshResult, SourceId,
};
use forecast_store::ForecastStore;
use normalizer::SourceMapping;
use refresher::scheduler::{Scheduler, TickOutcome};
use source_adapters::SourceAdapter;

/// Adapter whose probe and retrieval answers are set by the test.
struct ScriptedAdapter {
    id: SourceId,
    mapping: SourceMapping,
    /// `None` makes the probe fail with `SourceUnavailable`.
    issuance: Mutex<Option<DateTime<Utc>>>,
    fragments: Mutex<Vec<RawDataset>>,
    retrieve_calls: AtomicUsize,
    cached: Mutex<Option<CanonicalDataset>>,
}

impl ScriptedAdapter {
    fn new(id: SourceId) -> Self {
        Self {
            id,
            mapping: SourceMapping::for_source(id),
            issuance: Mutex::new(None),
            fragments: Mutex::new(Vec::new()),
            retrieve_calls: AtomicUsize::new(0),
            cached: Mutex::new(None),
        }
    }

    fn set_issuance(&self, issuance: Option<DateTime<Utc>>) {
        *self.issuance.lock().unwrap() = issuance;
    }

    fn set_fragments(&self, fragments: Vec<RawDataset>) {
        *self.fragments.lock().unwrap() = fragments;
    }

    fn set_cached(&self, dataset: CanonicalDataset) {
        *self.cached.lock().unwrap() = Some(dataset);
    }

    fn retrieve_calls(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn id(&self) -> SourceId {
        self.id
    }

    fn mapping(&self) -> &SourceMapping {
        &self.mapping
    }

    async fn probe(&self) -> RefreshResult<DateTime<Utc>> {
        self.issuance
            .lock()
            .unwrap()
            .ok_or(RefreshError::SourceUnavailable {
                source: self.id,
                message: "scripted probe failure".to_string(),
            })
    }

    async fn retrieve(&self) -> RefreshResult<Vec<RawDataset>> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.fragments.lock().unwrap().clone())
    }

    async fn baseline(&self) -> Option<DateTime<Utc>> {
        self.cached
            .lock()
            .unwrap()
            .as_ref()
            .map(|ds| ds.forecast_reference_time)
    }

    async fn restore(&self) -> Option<CanonicalDataset> {
        self.cached.lock().unwrap().clone()
    }

    async fn persist(&self, dataset: &CanonicalDataset) -> RefreshResult<()> {
        *self.cached.lock().unwrap() = Some(dataset.clone());
        Ok(())
    }
}

fn t0() -> DateTime<Utc> {
    "2024-01-01T00:00:00Z".parse().unwrap()
}

fn coords() -> BTreeMap<String, Field> {
    let mut coords = BTreeMap::new();
    coords.insert("latitude".into(), Field::vector("y", vec![60.0, 61.0]));
    coords.insert("longitude".into(), Field::vector("x", vec![10.0]));
    coords
}

fn var(n_times: usize, fill: f64) -> Field {
    Field::new(
        vec!["time".into(), "y".into(), "x".into()],
        vec![n_times, 2, 1],
        vec![fill; n_times * 2],
    )
    .unwrap()
}

/// Global-style retrieval: surface parameters in one fragment, 2 m
/// temperature in a second one carrying a vertical-level coordinate.
fn global_fragments(reference: DateTime<Utc>) -> Vec<RawDataset> {
    let valid_times: Vec<_> = (0..3).map(|i| reference + Duration::hours(6 * i)).collect();

    let mut surface = RawDataset {
        forecast_reference_time: Some(reference),
        valid_times: valid_times.clone(),
        coords: coords(),
        variables: BTreeMap::new(),
    };
    surface.variables.insert("tcc".into(), var(3, 42.0));
    surface.variables.insert("tp".into(), var(3, 0.5));
    surface.variables.insert("u10".into(), var(3, 0.0));
    surface.variables.insert("v10".into(), var(3, 5.0));

    let mut temperature = RawDataset {
        forecast_reference_time: Some(reference),
        valid_times,
        coords: coords(),
        variables: BTreeMap::new(),
    };
    temperature.coords.insert(
        "heightAboveGround".into(),
        Field::vector("heightAboveGround", vec![2.0]),
    );
    temperature.variables.insert("t2m".into(), var(3, 300.0));

    vec![surface, temperature]
}

/// Regional-style retrieval: one fragment, speed/direction wind.
fn regional_fragment(reference: DateTime<Utc>) -> RawDataset {
    let mut raw = RawDataset {
        forecast_reference_time: Some(reference),
        valid_times: (0..2).map(|i| reference + Duration::hours(i)).collect(),
        coords: coords(),
        variables: BTreeMap::new(),
    };
    raw.variables
        .insert("precipitation_amount".into(), var(2, 0.1));
    raw.variables
        .insert("air_temperature_2m".into(), var(2, 275.15));
    raw.variables
        .insert("relative_humidity_2m".into(), var(2, 80.0));
    raw.variables
        .insert("cloud_area_fraction".into(), var(2, 0.42));
    raw.variables.insert("wind_speed_10m".into(), var(2, 5.0));
    raw.variables
        .insert("wind_direction_10m".into(), var(2, 90.0));
    raw
}

fn scheduler_with(
    adapters: Vec<Arc<dyn SourceAdapter>>,
    store: Arc<ForecastStore>,
) -> Scheduler {
    Scheduler::new(
        adapters,
        store,
        StdDuration::from_secs(600),
        StdDuration::from_secs(30),
    )
}

#[tokio::test]
async fn test_first_tick_publishes_canonical_dataset() {
    let adapter = Arc::new(ScriptedAdapter::new(SourceId::Global));
    adapter.set_issuance(Some(t0()));
    adapter.set_fragments(global_fragments(t0()));

    let store = Arc::new(ForecastStore::new());
    let scheduler = scheduler_with(vec![adapter.clone()], store.clone());

    let outcome = scheduler.refresh(SourceId::Global).await;
    assert!(matches!(outcome, TickOutcome::Published { .. }));

    let ds = store.get(SourceId::Global).unwrap();
    assert_eq!(ds.forecast_reference_time, t0());
    assert_eq!(ds.steps, vec![0.0, 6.0, 12.0]);
    for name in ["cloud", "tp", "ws", "wd", "u", "v", "t2m"] {
        assert!(ds.variable(name).is_some(), "missing {}", name);
    }
    // Kelvin converted; the level coordinate never reaches the canonical grid.
    assert!((ds.variable("t2m").unwrap().values[0] - 26.85).abs() < 1e-6);
    assert!(matches!(ds.grid, GridCoords::Regular1D { .. }));
    // Cursor advanced to the published issuance.
    assert_eq!(scheduler.cursor(SourceId::Global), Some(t0()));
}

#[tokio::test]
async fn test_unchanged_issuance_is_idempotent() {
    let adapter = Arc::new(ScriptedAdapter::new(SourceId::Global));
    adapter.set_issuance(Some(t0()));
    adapter.set_fragments(global_fragments(t0()));

    let store = Arc::new(ForecastStore::new());
    let scheduler = scheduler_with(vec![adapter.clone()], store.clone());

    scheduler.refresh(SourceId::Global).await;
    let first = store.get(SourceId::Global).unwrap();
    assert_eq!(adapter.retrieve_calls(), 1);

    // Same issuance: no retrieval, store entry reference-identical.
    let outcome = scheduler.refresh(SourceId::Global).await;
    assert!(matches!(outcome, TickOutcome::UpToDate));
    assert_eq!(adapter.retrieve_calls(), 1);
    let second = store.get(SourceId::Global).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_older_issuance_never_regresses_cursor() {
    let adapter = Arc::new(ScriptedAdapter::new(SourceId::Global));
    adapter.set_issuance(Some(t0()));
    adapter.set_fragments(global_fragments(t0()));

    let store = Arc::new(ForecastStore::new());
    let scheduler = scheduler_with(vec![adapter.clone()], store.clone());
    scheduler.refresh(SourceId::Global).await;

    // Upstream briefly reports an older run.
    adapter.set_issuance(Some(t0() - Duration::hours(6)));
    let outcome = scheduler.refresh(SourceId::Global).await;
    assert!(matches!(outcome, TickOutcome::UpToDate));
    assert_eq!(scheduler.cursor(SourceId::Global), Some(t0()));
    assert_eq!(store.reference_time(SourceId::Global), Some(t0()));

    // A genuinely newer run goes through.
    let t1 = t0() + Duration::hours(6);
    adapter.set_issuance(Some(t1));
    adapter.set_fragments(global_fragments(t1));
    let outcome = scheduler.refresh(SourceId::Global).await;
    assert!(matches!(outcome, TickOutcome::Published { .. }));
    assert_eq!(scheduler.cursor(SourceId::Global), Some(t1));
}

#[tokio::test]
async fn test_failing_source_does_not_block_the_other() {
    let global = Arc::new(ScriptedAdapter::new(SourceId::Global));
    // Global probe fails outright.
    global.set_issuance(None);

    let regional = Arc::new(ScriptedAdapter::new(SourceId::Regional));
    regional.set_issuance(Some(t0()));
    regional.set_fragments(vec![regional_fragment(t0())]);

    let store = Arc::new(ForecastStore::new());
    let scheduler = scheduler_with(vec![global.clone(), regional.clone()], store.clone());

    scheduler.run_all().await;

    assert!(store.get(SourceId::Global).is_none());
    let ds = store.get(SourceId::Regional).unwrap();
    assert_eq!(ds.forecast_reference_time, t0());
    assert!(ds.variable("rh").is_some());

    let statuses = scheduler.status_report();
    let global_status = statuses.iter().find(|s| s.source == "global").unwrap();
    assert_eq!(global_status.failed, 1);
    let regional_status = statuses.iter().find(|s| s.source == "regional").unwrap();
    assert_eq!(regional_status.published, 1);
}

#[tokio::test]
async fn test_partially_published_run_is_retained_silently() {
    let adapter = Arc::new(ScriptedAdapter::new(SourceId::Regional));
    adapter.set_issuance(Some(t0()));
    adapter.set_fragments(vec![regional_fragment(t0())]);

    let store = Arc::new(ForecastStore::new());
    let scheduler = scheduler_with(vec![adapter.clone()], store.clone());
    scheduler.refresh(SourceId::Regional).await;
    let previous = store.get(SourceId::Regional).unwrap();

    // Next run's metadata is up, but its coordinates have not landed.
    let t1 = t0() + Duration::hours(6);
    adapter.set_issuance(Some(t1));
    let mut incomplete = regional_fragment(t1);
    incomplete.coords.remove("latitude");
    adapter.set_fragments(vec![incomplete]);

    let outcome = scheduler.refresh(SourceId::Regional).await;
    match outcome {
        TickOutcome::NotReady { missing } => assert!(missing.contains("latitude")),
        other => panic!("expected NotReady, got {:?}", other),
    }

    // Previous dataset still published, cursor not advanced, so the next
    // tick retries the same run.
    let current = store.get(SourceId::Regional).unwrap();
    assert!(Arc::ptr_eq(&previous, &current));
    assert_eq!(scheduler.cursor(SourceId::Regional), Some(t0()));

    // Once the data lands, the run publishes.
    adapter.set_fragments(vec![regional_fragment(t1)]);
    let outcome = scheduler.refresh(SourceId::Regional).await;
    assert!(matches!(outcome, TickOutcome::Published { .. }));
    assert_eq!(store.reference_time(SourceId::Regional), Some(t1));
}

#[tokio::test]
async fn test_schema_mismatch_retains_previous_dataset() {
    let adapter = Arc::new(ScriptedAdapter::new(SourceId::Global));
    adapter.set_issuance(Some(t0()));
    adapter.set_fragments(global_fragments(t0()));

    let store = Arc::new(ForecastStore::new());
    let scheduler = scheduler_with(vec![adapter.clone()], store.clone());
    scheduler.refresh(SourceId::Global).await;
    let previous = store.get(SourceId::Global).unwrap();

    // The next run drops a required variable.
    let t1 = t0() + Duration::hours(6);
    adapter.set_issuance(Some(t1));
    let mut fragments = global_fragments(t1);
    fragments[0].variables.remove("tcc");
    adapter.set_fragments(fragments);

    let outcome = scheduler.refresh(SourceId::Global).await;
    match outcome {
        TickOutcome::Failed { kind, .. } => assert_eq!(kind, "schema_mismatch"),
        other => panic!("expected Failed, got {:?}", other),
    }

    let current = store.get(SourceId::Global).unwrap();
    assert!(Arc::ptr_eq(&previous, &current));
    // Cursor did not advance; the run is retried next tick.
    assert_eq!(scheduler.cursor(SourceId::Global), Some(t0()));
}

#[tokio::test]
async fn test_cursor_tracks_accepted_run_not_probed_announcement() {
    let adapter = Arc::new(ScriptedAdapter::new(SourceId::Global));
    adapter.set_issuance(Some(t0()));
    adapter.set_fragments(global_fragments(t0()));

    let store = Arc::new(ForecastStore::new());
    let scheduler = scheduler_with(vec![adapter.clone()], store.clone());
    scheduler.refresh(SourceId::Global).await;

    // Provider metadata announces the next run while the payload still
    // carries the previous one.
    let t1 = t0() + Duration::hours(6);
    adapter.set_issuance(Some(t1));
    let outcome = scheduler.refresh(SourceId::Global).await;
    assert!(matches!(outcome, TickOutcome::Published { .. }));
    // The cursor pins to the run actually accepted, not the announcement,
    // so the announced run is retried instead of silently skipped.
    assert_eq!(scheduler.cursor(SourceId::Global), Some(t0()));
    assert_eq!(store.reference_time(SourceId::Global), Some(t0()));

    // Once the payload catches up, the next tick fetches and publishes it.
    adapter.set_fragments(global_fragments(t1));
    let before = adapter.retrieve_calls();
    let outcome = scheduler.refresh(SourceId::Global).await;
    assert!(matches!(outcome, TickOutcome::Published { .. }));
    assert_eq!(adapter.retrieve_calls(), before + 1);
    assert_eq!(store.reference_time(SourceId::Global), Some(t1));
    assert_eq!(scheduler.cursor(SourceId::Global), Some(t1));
}

#[tokio::test]
async fn test_seed_restores_cache_and_skips_redownload() {
    let adapter = Arc::new(ScriptedAdapter::new(SourceId::Global));
    adapter.set_issuance(Some(t0()));
    adapter.set_fragments(global_fragments(t0()));

    // First service lifetime: publish and persist.
    let store = Arc::new(ForecastStore::new());
    let scheduler = scheduler_with(vec![adapter.clone()], store.clone());
    scheduler.refresh(SourceId::Global).await;
    assert_eq!(adapter.retrieve_calls(), 1);

    // Restart: fresh store and scheduler over the same adapter cache.
    let store2 = Arc::new(ForecastStore::new());
    let scheduler2 = scheduler_with(vec![adapter.clone()], store2.clone());
    scheduler2.seed().await;

    // The store is populated before any network round-trip.
    let ds = store2.get(SourceId::Global).unwrap();
    assert_eq!(ds.forecast_reference_time, t0());
    assert_eq!(scheduler2.cursor(SourceId::Global), Some(t0()));

    // The unchanged upstream issuance is not re-downloaded.
    let outcome = scheduler2.refresh(SourceId::Global).await;
    assert!(matches!(outcome, TickOutcome::UpToDate));
    assert_eq!(adapter.retrieve_calls(), 1);
}

#[tokio::test]
async fn test_empty_retrieval_is_merge_conflict() {
    let adapter = Arc::new(ScriptedAdapter::new(SourceId::Global));
    adapter.set_issuance(Some(t0()));
    adapter.set_fragments(Vec::new());

    let store = Arc::new(ForecastStore::new());
    let scheduler = scheduler_with(vec![adapter], store.clone());

    let outcome = scheduler.refresh(SourceId::Global).await;
    match outcome {
        TickOutcome::Failed { kind, .. } => assert_eq!(kind, "merge_conflict"),
        other => panic!("expected Failed, got {:?}", other),
    }
    assert!(store.get(SourceId::Global).is_none());
}
