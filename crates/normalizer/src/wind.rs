//! Wind vector math.
//!
//! Convention: `wd` is the direction the wind blows *from*, in degrees
//! clockwise from north, normalized to [0, 360). The (u, v) pair is the
//! "to" vector (eastward, northward components), hence the 180-degree
//! rotation when converting between the two.

/// Speed and "from" direction from (u, v) components.
pub fn speed_direction_from_components(u: &[f64], v: &[f64]) -> (Vec<f64>, Vec<f64>) {
    debug_assert_eq!(u.len(), v.len());
    let ws = u
        .iter()
        .zip(v)
        .map(|(u, v)| (u * u + v * v).sqrt())
        .collect();
    let wd = u
        .iter()
        .zip(v)
        .map(|(u, v)| (u.atan2(*v).to_degrees() + 180.0).rem_euclid(360.0))
        .collect();
    (ws, wd)
}

/// (u, v) components from speed and "from" direction.
pub fn components_from_speed_direction(ws: &[f64], wd: &[f64]) -> (Vec<f64>, Vec<f64>) {
    debug_assert_eq!(ws.len(), wd.len());
    let u = ws
        .iter()
        .zip(wd)
        .map(|(ws, wd)| -ws * wd.to_radians().sin())
        .collect();
    let v = ws
        .iter()
        .zip(wd)
        .map(|(ws, wd)| -ws * wd.to_radians().cos())
        .collect();
    (u, v)
}
