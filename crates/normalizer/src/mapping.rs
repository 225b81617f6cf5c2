//! Per-source schema mapping tables.
//!
//! Each upstream source gets one typed table describing how its native
//! variable names and units map onto the canonical schema. The wind
//! representation is decided here, once, and carried through
//! normalization; nothing downstream branches on which keys happen to be
//! present.

use forecast_common::SourceId;

/// Which wind pair the source reports natively. The other pair is always
/// derived during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindRepresentation {
    /// Source reports eastward/northward components under these names.
    Components {
        u: &'static str,
        v: &'static str,
    },
    /// Source reports speed and meteorological "from" direction.
    SpeedDirection {
        speed: &'static str,
        direction: &'static str,
    },
}

impl WindRepresentation {
    /// Source-native names this representation requires.
    pub fn native_names(&self) -> [&'static str; 2] {
        match self {
            Self::Components { u, v } => [u, v],
            Self::SpeedDirection { speed, direction } => [speed, direction],
        }
    }
}

/// Mapping from one source's raw schema to the canonical schema.
#[derive(Debug, Clone)]
pub struct SourceMapping {
    pub source: SourceId,
    /// Source-native name -> canonical name, for non-wind variables.
    pub renames: &'static [(&'static str, &'static str)],
    /// Source-native variables that must be present for normalization to
    /// proceed (wind natives included).
    pub required: &'static [&'static str],
    /// Temperature is reported in Kelvin and needs conversion.
    pub temperature_kelvin: bool,
    /// Cloud cover is reported as a [0, 1] fraction and needs scaling.
    pub cloud_fraction: bool,
    pub wind: WindRepresentation,
}

impl SourceMapping {
    /// Mapping for the global ECMWF open-data feed (GRIB shortnames as
    /// exposed by the retrieval decode).
    pub fn global() -> Self {
        Self {
            source: SourceId::Global,
            renames: &[("tcc", "cloud"), ("tp", "tp"), ("t2m", "t2m")],
            required: &["tcc", "tp", "t2m", "u10", "v10"],
            temperature_kelvin: true,
            // tcc arrives already scaled to percent by the decode.
            cloud_fraction: false,
            wind: WindRepresentation::Components { u: "u10", v: "v10" },
        }
    }

    /// Mapping for the regional MET Nordic feed (CF standard names).
    pub fn regional() -> Self {
        Self {
            source: SourceId::Regional,
            renames: &[
                ("precipitation_amount", "tp"),
                ("air_temperature_2m", "t2m"),
                ("relative_humidity_2m", "rh"),
                ("cloud_area_fraction", "cloud"),
            ],
            required: &[
                "precipitation_amount",
                "air_temperature_2m",
                "cloud_area_fraction",
                "wind_speed_10m",
                "wind_direction_10m",
            ],
            temperature_kelvin: true,
            cloud_fraction: true,
            wind: WindRepresentation::SpeedDirection {
                speed: "wind_speed_10m",
                direction: "wind_direction_10m",
            },
        }
    }

    /// Look up the mapping for a source.
    pub fn for_source(source: SourceId) -> Self {
        match source {
            SourceId::Global => Self::global(),
            SourceId::Regional => Self::regional(),
        }
    }
}
