//! Schema normalizer: raw source dataset to canonical dataset.

use std::collections::BTreeMap;

use forecast_common::{
    step_hours, CanonicalDataset, Field, GridCoords, RawDataset, RefreshError, RefreshResult,
};
use tracing::debug;

use crate::mapping::{SourceMapping, WindRepresentation};
use crate::units;
use crate::wind;

/// Map a merged raw dataset onto the canonical schema.
///
/// Applies the source's rename table, unit conversions, the single wind
/// derivation path chosen by the mapping, and the relative `step`
/// coordinate. Fails with `SchemaMismatch` if any required source-native
/// variable is absent or shaped inconsistently with the time axis.
pub fn normalize(mapping: &SourceMapping, raw: &RawDataset) -> RefreshResult<CanonicalDataset> {
    let source = mapping.source;

    let reference_time =
        raw.forecast_reference_time
            .ok_or_else(|| RefreshError::SchemaMismatch {
                source,
                message: "missing forecast_reference_time".to_string(),
            })?;

    let missing: Vec<&str> = mapping
        .required
        .iter()
        .copied()
        .filter(|name| !raw.variables.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(RefreshError::SchemaMismatch {
            source,
            message: format!("missing required variables: {}", missing.join(", ")),
        });
    }

    if raw.valid_times.is_empty() {
        return Err(RefreshError::SchemaMismatch {
            source,
            message: "dataset has no valid times".to_string(),
        });
    }

    // Relative lead-time coordinate; must be non-negative and strictly
    // ascending so downstream step selection is well-defined.
    let steps: Vec<f64> = raw
        .valid_times
        .iter()
        .map(|t| step_hours(reference_time, *t))
        .collect();
    if steps[0] < 0.0 {
        return Err(RefreshError::SchemaMismatch {
            source,
            message: format!("negative lead time: {} h", steps[0]),
        });
    }
    if steps.windows(2).any(|w| w[1] <= w[0]) {
        return Err(RefreshError::SchemaMismatch {
            source,
            message: "lead times are not strictly ascending".to_string(),
        });
    }

    let grid = GridCoords::from_coords(&raw.coords).ok_or_else(|| RefreshError::SchemaMismatch {
        source,
        message: "latitude/longitude coordinates missing or inconsistent".to_string(),
    })?;

    let mut variables: BTreeMap<String, Field> = BTreeMap::new();

    for (native, canonical) in mapping.renames {
        let field = checked_variable(mapping, raw, native)?;
        let converted = match *canonical {
            "t2m" if mapping.temperature_kelvin => field.map(units::kelvin_to_celsius),
            "cloud" if mapping.cloud_fraction => field.map(units::fraction_to_percent),
            _ => field.clone(),
        };
        variables.insert(canonical.to_string(), converted.with_leading_dim("step"));
    }

    // Exactly one derivation path runs, chosen by the mapping.
    match mapping.wind {
        WindRepresentation::Components { u, v } => {
            let u_field = checked_variable(mapping, raw, u)?;
            let v_field = checked_variable(mapping, raw, v)?;
            if u_field.shape != v_field.shape {
                return Err(RefreshError::SchemaMismatch {
                    source,
                    message: format!("wind components '{}' and '{}' differ in shape", u, v),
                });
            }
            let (ws, wd) =
                wind::speed_direction_from_components(&u_field.values, &v_field.values);
            insert_wind(&mut variables, u_field, [("u", u_field.values.clone()), ("v", v_field.values.clone()), ("ws", ws), ("wd", wd)]);
        }
        WindRepresentation::SpeedDirection { speed, direction } => {
            let ws_field = checked_variable(mapping, raw, speed)?;
            let wd_field = checked_variable(mapping, raw, direction)?;
            if ws_field.shape != wd_field.shape {
                return Err(RefreshError::SchemaMismatch {
                    source,
                    message: format!(
                        "wind speed '{}' and direction '{}' differ in shape",
                        speed, direction
                    ),
                });
            }
            let wd_norm: Vec<f64> = wd_field
                .values
                .iter()
                .map(|d| d.rem_euclid(360.0))
                .collect();
            let (u, v) = wind::components_from_speed_direction(&ws_field.values, &wd_norm);
            insert_wind(
                &mut variables,
                ws_field,
                [("u", u), ("v", v), ("ws", ws_field.values.clone()), ("wd", wd_norm)],
            );
        }
    }

    debug!(
        source = %source,
        reference_time = %reference_time,
        steps = steps.len(),
        variables = variables.len(),
        "Normalized dataset"
    );

    Ok(CanonicalDataset {
        source,
        forecast_reference_time: reference_time,
        steps,
        valid_times: raw.valid_times.clone(),
        grid,
        variables,
    })
}

/// Fetch a source-native variable and check its leading dimension spans
/// the time axis.
fn checked_variable<'a>(
    mapping: &SourceMapping,
    raw: &'a RawDataset,
    name: &str,
) -> RefreshResult<&'a Field> {
    let field = raw
        .variables
        .get(name)
        .ok_or_else(|| RefreshError::SchemaMismatch {
            source: mapping.source,
            message: format!("missing required variable '{}'", name),
        })?;
    if field.ndim() == 0 || field.shape[0] != raw.valid_times.len() {
        return Err(RefreshError::SchemaMismatch {
            source: mapping.source,
            message: format!(
                "variable '{}' leading dimension {:?} does not span {} valid times",
                name,
                field.shape.first(),
                raw.valid_times.len()
            ),
        });
    }
    Ok(field)
}

/// Insert the four wind variables, reusing the native field's dims/shape
/// with the leading dimension re-labeled `step`.
fn insert_wind(
    variables: &mut BTreeMap<String, Field>,
    template: &Field,
    pairs: [(&str, Vec<f64>); 4],
) {
    for (name, values) in pairs {
        let field = Field {
            dims: template.dims.clone(),
            shape: template.shape.clone(),
            values,
        }
        .with_leading_dim("step");
        variables.insert(name.to_string(), field);
    }
}
