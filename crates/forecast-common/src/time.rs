//! Time handling for forecast issuances and lead times.

use chrono::{DateTime, TimeZone, Utc};

/// Baseline issuance used when no prior forecast is known.
///
/// Comparing any real issuance against this forces an initial download.
pub fn epoch_sentinel() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()
}

/// Lead time in hours from issuance to valid time.
///
/// Fractional hours are preserved (some regional feeds publish on
/// sub-hourly boundaries).
pub fn step_hours(reference_time: DateTime<Utc>, valid_time: DateTime<Utc>) -> f64 {
    let millis = valid_time
        .signed_duration_since(reference_time)
        .num_milliseconds();
    millis as f64 / 3_600_000.0
}
