//! Grid merger for fragmented retrievals.
//!
//! A single bulk retrieval can return parameter groups keyed on different
//! lead-time resolutions (e.g. most surface parameters every 6 hours, 2 m
//! temperature per-step with an extra vertical-level coordinate). Each
//! group arrives as its own `RawDataset` fragment; this module reconciles
//! them into one dataset with a single lead-time axis.

use std::collections::BTreeMap;

use forecast_common::{Field, RawDataset, RefreshError, RefreshResult, SourceId};
use tracing::debug;

/// Vertical-level coordinates that force a parameter group into its own
/// coordinate space. Dropped before merging.
const LEVEL_COORDS: &[&str] = &[
    "heightAboveGround",
    "height_above_ground",
    "height",
    "level",
    "isobaricInhPa",
];

/// Merge retrieval fragments into one raw dataset.
///
/// Fragments are merged on the union of their valid times with an
/// "override" conflict policy: a later fragment's values win for any
/// (variable, valid time) both provide. Positions a fragment does not
/// cover are filled with NaN.
pub fn merge_fragments(
    source: SourceId,
    fragments: Vec<RawDataset>,
) -> RefreshResult<RawDataset> {
    if fragments.is_empty() {
        return Err(RefreshError::MergeConflict {
            source,
            message: "retrieval produced no fragments".to_string(),
        });
    }

    // All fragments must come from the same forecast run.
    let reference_time = fragments[0].forecast_reference_time.ok_or_else(|| {
        RefreshError::MergeConflict {
            source,
            message: "fragment missing forecast_reference_time".to_string(),
        }
    })?;
    for fragment in &fragments {
        match fragment.forecast_reference_time {
            Some(t) if t == reference_time => {}
            Some(t) => {
                return Err(RefreshError::MergeConflict {
                    source,
                    message: format!(
                        "fragments from different runs: {} vs {}",
                        reference_time, t
                    ),
                })
            }
            None => {
                return Err(RefreshError::MergeConflict {
                    source,
                    message: "fragment missing forecast_reference_time".to_string(),
                })
            }
        }
    }

    // Fragments must share a spatial grid.
    let spatial = spatial_coords(&fragments[0]);
    for fragment in &fragments[1..] {
        for (name, field) in spatial_coords(fragment) {
            if let Some(first) = spatial.iter().find(|(n, _)| *n == name).map(|(_, f)| f) {
                if first.shape != field.shape || first.values != field.values {
                    return Err(RefreshError::MergeConflict {
                        source,
                        message: format!("fragments disagree on coordinate '{}'", name),
                    });
                }
            }
        }
    }

    // Union of valid times, ascending.
    let mut union: Vec<_> = fragments
        .iter()
        .flat_map(|f| f.valid_times.iter().copied())
        .collect();
    union.sort_unstable();
    union.dedup();

    let mut variables: BTreeMap<String, Field> = BTreeMap::new();
    let mut coords: BTreeMap<String, Field> = BTreeMap::new();

    for fragment in &fragments {
        for (name, field) in &fragment.coords {
            if LEVEL_COORDS.contains(&name.as_str()) {
                debug!(source = %source, coord = %name, "Dropping vertical-level coordinate");
                continue;
            }
            coords.insert(name.clone(), field.clone());
        }

        for (name, field) in &fragment.variables {
            if field.ndim() == 0 || field.shape[0] != fragment.valid_times.len() {
                return Err(RefreshError::MergeConflict {
                    source,
                    message: format!(
                        "variable '{}' leading dimension {:?} does not match {} valid times",
                        name,
                        field.shape.first(),
                        fragment.valid_times.len()
                    ),
                });
            }

            let inner_dims: Vec<String> = field.dims[1..].to_vec();
            let inner_shape: Vec<usize> = field.shape[1..].to_vec();
            let inner_len = field.inner_len();

            let merged = variables.entry(name.clone()).or_insert_with(|| {
                let mut dims = vec!["time".to_string()];
                dims.extend(inner_dims.iter().cloned());
                let mut shape = vec![union.len()];
                shape.extend(inner_shape.iter().cloned());
                Field {
                    dims,
                    shape,
                    values: vec![f64::NAN; union.len() * inner_len],
                }
            });

            if merged.shape[1..] != field.shape[1..] {
                return Err(RefreshError::MergeConflict {
                    source,
                    message: format!(
                        "variable '{}' has incompatible spatial shapes {:?} vs {:?}",
                        name,
                        &merged.shape[1..],
                        &field.shape[1..]
                    ),
                });
            }

            for (i, valid_time) in fragment.valid_times.iter().enumerate() {
                // Union is sorted and contains every fragment time.
                let pos = union.binary_search(valid_time).expect("time in union");
                let src = &field.values[i * inner_len..(i + 1) * inner_len];
                merged.values[pos * inner_len..(pos + 1) * inner_len].copy_from_slice(src);
            }
        }
    }

    debug!(
        source = %source,
        fragments = fragments.len(),
        steps = union.len(),
        variables = variables.len(),
        "Merged retrieval fragments"
    );

    Ok(RawDataset {
        forecast_reference_time: Some(reference_time),
        valid_times: union,
        coords,
        variables,
    })
}

fn spatial_coords(fragment: &RawDataset) -> Vec<(&str, &Field)> {
    fragment
        .coords
        .iter()
        .filter(|(name, _)| !LEVEL_COORDS.contains(&name.as_str()))
        .map(|(name, field)| (name.as_str(), field))
        .collect()
}
