//! Gridded dataset model: raw (source-native) and canonical shapes.
//!
//! Data values are stored as flat row-major `Vec<f64>` with explicit
//! dimension names and shape, so merge and normalization can reason about
//! the lead-time axis without caring about the spatial layout.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::SourceId;

/// Coordinate names a raw dataset must carry before it can be normalized.
pub const REQUIRED_COORDS: &[&str] = &["time", "latitude", "longitude"];

/// A named n-dimensional array, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Dimension names, outermost first (e.g. `["time", "y", "x"]`).
    pub dims: Vec<String>,
    /// Extent of each dimension, same order as `dims`.
    pub shape: Vec<usize>,
    /// Flat values; length is the product of `shape`.
    pub values: Vec<f64>,
}

impl Field {
    /// Create a field, checking that the shape matches the value count.
    pub fn new(dims: Vec<String>, shape: Vec<usize>, values: Vec<f64>) -> Result<Self, String> {
        if dims.len() != shape.len() {
            return Err(format!(
                "Dimension count {} does not match shape rank {}",
                dims.len(),
                shape.len()
            ));
        }
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(format!(
                "Shape {:?} implies {} values, got {}",
                shape,
                expected,
                values.len()
            ));
        }
        Ok(Self { dims, shape, values })
    }

    /// 1-D field over a single dimension.
    pub fn vector(dim: &str, values: Vec<f64>) -> Self {
        Self {
            dims: vec![dim.to_string()],
            shape: vec![values.len()],
            values,
        }
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of values per index of the leading dimension.
    pub fn inner_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Slice of values for one index of the leading dimension.
    pub fn leading_slice(&self, index: usize) -> Option<&[f64]> {
        if self.shape.is_empty() || index >= self.shape[0] {
            return None;
        }
        let inner = self.inner_len();
        Some(&self.values[index * inner..(index + 1) * inner])
    }

    /// Apply an elementwise transform, keeping dims and shape.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            dims: self.dims.clone(),
            shape: self.shape.clone(),
            values: self.values.iter().copied().map(f).collect(),
        }
    }

    /// Rename the leading dimension.
    pub fn with_leading_dim(mut self, name: &str) -> Self {
        if let Some(first) = self.dims.first_mut() {
            *first = name.to_string();
        }
        self
    }
}

/// A dataset as retrieved from one source (or one fragment of one
/// retrieval), still in source-native names and units.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDataset {
    /// Issuance instant of the forecast run, if the payload carried it.
    pub forecast_reference_time: Option<DateTime<Utc>>,
    /// Absolute instant each index of the time dimension predicts.
    #[serde(default)]
    pub valid_times: Vec<DateTime<Utc>>,
    /// Coordinate fields (latitude, longitude, vertical levels, ...).
    #[serde(default)]
    pub coords: BTreeMap<String, Field>,
    /// Data variables keyed by source-native name.
    #[serde(default)]
    pub variables: BTreeMap<String, Field>,
}

impl RawDataset {
    /// Required coordinates absent from this dataset.
    ///
    /// A non-empty result means the upstream publication is still in
    /// progress and the dataset must be treated as not ready.
    pub fn missing_coords(&self) -> Vec<&'static str> {
        REQUIRED_COORDS
            .iter()
            .copied()
            .filter(|name| match *name {
                // The time coordinate arrives as the valid-time vector.
                "time" => self.valid_times.is_empty(),
                other => !self.coords.contains_key(other),
            })
            .collect()
    }

    pub fn is_ready(&self) -> bool {
        self.missing_coords().is_empty()
    }
}

/// Spatial coordinates of a canonical dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GridCoords {
    /// Separable grid: 1-D longitude and latitude vectors.
    Regular1D { lon: Vec<f64>, lat: Vec<f64> },
    /// Curvilinear grid: per-cell longitude/latitude, row-major over
    /// `(ny, nx)`.
    Curvilinear2D {
        ny: usize,
        nx: usize,
        lon: Vec<f64>,
        lat: Vec<f64>,
    },
}

impl GridCoords {
    /// Build from raw latitude/longitude coordinate fields.
    pub fn from_coords(coords: &BTreeMap<String, Field>) -> Option<Self> {
        let lat = coords.get("latitude")?;
        let lon = coords.get("longitude")?;
        match (lat.ndim(), lon.ndim()) {
            (1, 1) => Some(Self::Regular1D {
                lon: lon.values.clone(),
                lat: lat.values.clone(),
            }),
            (2, 2) if lat.shape == lon.shape => Some(Self::Curvilinear2D {
                ny: lat.shape[0],
                nx: lat.shape[1],
                lon: lon.values.clone(),
                lat: lat.values.clone(),
            }),
            _ => None,
        }
    }

    /// Number of spatial points per lead time.
    pub fn points(&self) -> usize {
        match self {
            Self::Regular1D { lon, lat } => lon.len() * lat.len(),
            Self::Curvilinear2D { lon, .. } => lon.len(),
        }
    }
}

/// The normalized, source-independent dataset published to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalDataset {
    pub source: SourceId,
    /// Issuance instant of the forecast run.
    pub forecast_reference_time: DateTime<Utc>,
    /// Lead times in hours, non-negative and strictly ascending.
    pub steps: Vec<f64>,
    /// Absolute instant each step predicts.
    pub valid_times: Vec<DateTime<Utc>>,
    pub grid: GridCoords,
    /// Canonical variables, each with leading dimension `step`.
    pub variables: BTreeMap<String, Field>,
}

impl CanonicalDataset {
    pub fn variable(&self, name: &str) -> Option<&Field> {
        self.variables.get(name)
    }

    /// Variable names in this dataset.
    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_shape_validation() {
        assert!(Field::new(
            vec!["time".into(), "y".into()],
            vec![2, 3],
            vec![0.0; 6]
        )
        .is_ok());
        assert!(Field::new(vec!["time".into()], vec![2], vec![0.0; 6]).is_err());
        assert!(Field::new(vec!["time".into()], vec![2, 3], vec![0.0; 6]).is_err());
    }

    #[test]
    fn test_leading_slice() {
        let field = Field::new(
            vec!["time".into(), "x".into()],
            vec![2, 3],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        )
        .unwrap();
        assert_eq!(field.leading_slice(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(field.leading_slice(2), None);
    }

    #[test]
    fn test_missing_coords_reported() {
        let mut raw = RawDataset::default();
        assert_eq!(raw.missing_coords(), vec!["time", "latitude", "longitude"]);

        raw.valid_times = vec!["2024-01-01T00:00:00Z".parse().unwrap()];
        raw.coords
            .insert("latitude".into(), Field::vector("y", vec![60.0]));
        assert_eq!(raw.missing_coords(), vec!["longitude"]);

        raw.coords
            .insert("longitude".into(), Field::vector("x", vec![10.0]));
        assert!(raw.is_ready());
    }

    #[test]
    fn test_grid_coords_1d_and_2d() {
        let mut coords = BTreeMap::new();
        coords.insert("latitude".into(), Field::vector("y", vec![60.0, 61.0]));
        coords.insert("longitude".into(), Field::vector("x", vec![10.0, 11.0, 12.0]));
        let grid = GridCoords::from_coords(&coords).unwrap();
        assert_eq!(grid.points(), 6);

        let mut coords = BTreeMap::new();
        coords.insert(
            "latitude".into(),
            Field::new(vec!["y".into(), "x".into()], vec![2, 2], vec![60.0; 4]).unwrap(),
        );
        coords.insert(
            "longitude".into(),
            Field::new(vec!["y".into(), "x".into()], vec![2, 2], vec![10.0; 4]).unwrap(),
        );
        let grid = GridCoords::from_coords(&coords).unwrap();
        assert!(matches!(grid, GridCoords::Curvilinear2D { ny: 2, nx: 2, .. }));
        assert_eq!(grid.points(), 4);
    }
}
