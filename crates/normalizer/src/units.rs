//! Unit conversions applied during normalization.

/// Kelvin to Celsius.
pub fn kelvin_to_celsius(k: f64) -> f64 {
    k - 273.15
}

/// Cloud fraction [0, 1] to percent.
pub fn fraction_to_percent(f: f64) -> f64 {
    f * 100.0
}
