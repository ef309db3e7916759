//! Observation unit data model.
//!
//! Records arrive from the breeding-data service as loosely typed strings
//! ([`RawObservationUnit`]). [`ObservationUnit::from_raw`] parses them once into
//! tagged values so that downstream code matches on [`Position`] instead of
//! relying on NaN checks.

use crate::geom::{Coordinate, Polygon};
use crate::{Error, Result};
use geo::{Coord, LineString};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable external identity of an observation unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct UnitId(String);

impl UnitId {
    /// Creates an identity from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Tag attached to a raw X or Y coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PositionKind {
    Longitude,
    Latitude,
    GridRow,
    GridCol,
    PlantedRow,
    PlantedIndividual,
    MeasuredRow,
    MeasuredCol,
    #[default]
    Unknown,
}

impl PositionKind {
    /// Parses the service vocabulary (`"LONGITUDE"`, `"GRID_ROW"`, ...), case-insensitively.
    pub fn parse(s: &str) -> Self {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "longitude" | "lon" | "lng" => Self::Longitude,
            "latitude" | "lat" => Self::Latitude,
            "gridrow" => Self::GridRow,
            "gridcol" | "gridcolumn" => Self::GridCol,
            "plantedrow" => Self::PlantedRow,
            "plantedindividual" => Self::PlantedIndividual,
            "measuredrow" => Self::MeasuredRow,
            "measuredcol" | "measuredcolumn" => Self::MeasuredCol,
            _ => Self::Unknown,
        }
    }

    /// Returns true for tags that denote a grid row.
    pub fn is_row(self) -> bool {
        matches!(self, Self::GridRow | Self::PlantedRow | Self::MeasuredRow)
    }

    /// Returns true for tags that denote a grid column.
    pub fn is_col(self) -> bool {
        matches!(
            self,
            Self::GridCol | Self::MeasuredCol | Self::PlantedIndividual
        )
    }

    /// Returns true for geographic tags.
    pub fn is_geographic(self) -> bool {
        matches!(self, Self::Longitude | Self::Latitude)
    }
}

/// A parsed X/Y position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Position {
    /// Both coordinates parsed to finite numbers.
    Numeric {
        x: f64,
        y: f64,
        x_kind: PositionKind,
        y_kind: PositionKind,
    },
    /// Missing or unparseable.
    #[default]
    Unknown,
}

impl Position {
    /// Parses raw X/Y strings and their type tags.
    pub fn classify(
        x: Option<&str>,
        y: Option<&str>,
        x_kind: Option<&str>,
        y_kind: Option<&str>,
    ) -> Self {
        match (parse_finite(x), parse_finite(y)) {
            (Some(x), Some(y)) => Self::Numeric {
                x,
                y,
                x_kind: x_kind.map(PositionKind::parse).unwrap_or_default(),
                y_kind: y_kind.map(PositionKind::parse).unwrap_or_default(),
            },
            _ => Self::Unknown,
        }
    }

    /// Returns the position as a lon/lat coordinate when both tags are geographic.
    pub fn as_coordinate(&self) -> Option<Coordinate> {
        match *self {
            Self::Numeric {
                x,
                y,
                x_kind: PositionKind::Longitude,
                y_kind: PositionKind::Latitude,
            } => Some(Coord { x, y }),
            Self::Numeric {
                x,
                y,
                x_kind: PositionKind::Latitude,
                y_kind: PositionKind::Longitude,
            } => Some(Coord { x: y, y: x }),
            _ => None,
        }
    }

    /// Returns the position as grid indices when one tag is a row and the other a column.
    pub fn as_grid(&self) -> Option<GridIndex> {
        let Self::Numeric {
            x,
            y,
            x_kind,
            y_kind,
        } = *self
        else {
            return None;
        };
        let (row, col) = if y_kind.is_row() && x_kind.is_col() {
            (y, x)
        } else if x_kind.is_row() && y_kind.is_col() {
            (x, y)
        } else {
            return None;
        };
        Some(GridIndex::new(to_index(row)?, to_index(col)?))
    }
}

fn parse_finite(s: Option<&str>) -> Option<f64> {
    s.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn to_index(v: f64) -> Option<u32> {
    if v >= 0.0 && v <= u32::MAX as f64 {
        Some(v.round() as u32)
    } else {
        None
    }
}

/// Grid position of a plot (zero or one based, as supplied).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridIndex {
    pub row: u32,
    pub col: u32,
}

impl GridIndex {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// Experimental design grouping of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupKey {
    pub block: Option<String>,
    pub replicate: Option<String>,
}

/// Observation level a unit is recorded at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ObservationLevel {
    #[default]
    Plot,
    Plant,
    Block,
    Replicate,
    Other(String),
}

impl ObservationLevel {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "plot" => Self::Plot,
            "plant" => Self::Plant,
            "block" => Self::Block,
            "rep" | "replicate" => Self::Replicate,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Geometry attached to a unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitGeometry {
    Point(Coordinate),
    Polygon(Polygon),
}

/// Geo-shape as exchanged with the data service (`{"type": ..., "coordinates": ...}`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "coordinates"))]
pub enum GeoShape {
    Point([f64; 2]),
    Polygon(Vec<Vec<[f64; 2]>>),
}

impl GeoShape {
    /// Converts to a unit geometry, closing the outer ring if needed.
    ///
    /// Holes are ignored. Rings with fewer than three distinct positions are rejected.
    pub fn to_geometry(&self) -> Result<UnitGeometry> {
        match self {
            GeoShape::Point([x, y]) => {
                if x.is_finite() && y.is_finite() {
                    Ok(UnitGeometry::Point(Coord { x: *x, y: *y }))
                } else {
                    Err(Error::InvalidGeometry("non-finite point".into()))
                }
            }
            GeoShape::Polygon(rings) => {
                let outer = rings
                    .first()
                    .ok_or_else(|| Error::InvalidGeometry("polygon without rings".into()))?;
                let mut coords: Vec<Coordinate> =
                    outer.iter().map(|&[x, y]| Coord { x, y }).collect();
                if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
                    return Err(Error::InvalidGeometry("non-finite ring coordinate".into()));
                }
                if coords.len() > 1 && coords.first() == coords.last() {
                    coords.pop();
                }
                if coords.len() < 3 {
                    return Err(Error::InvalidGeometry(format!(
                        "ring must have at least 3 distinct positions, got {}",
                        coords.len()
                    )));
                }
                Ok(UnitGeometry::Polygon(Polygon::new(
                    LineString::from(coords),
                    vec![],
                )))
            }
        }
    }

    /// Converts a polygon to its exchange form (closed outer ring).
    pub fn from_polygon(polygon: &Polygon) -> Self {
        GeoShape::Polygon(vec![polygon
            .exterior()
            .coords()
            .map(|c| [c.x, c.y])
            .collect()])
    }
}

/// An observation unit record as delivered by the data service.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RawObservationUnit {
    pub id: String,
    pub level: Option<String>,
    pub plot_number: Option<String>,
    pub x: Option<String>,
    pub x_type: Option<String>,
    pub y: Option<String>,
    pub y_type: Option<String>,
    pub geo_shape: Option<GeoShape>,
    pub row: Option<u32>,
    pub col: Option<u32>,
    pub block: Option<String>,
    pub replicate: Option<String>,
}

/// A classified observation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationUnit {
    pub id: UnitId,
    pub level: ObservationLevel,
    pub plot_number: Option<f64>,
    pub position: Position,
    pub geometry: Option<UnitGeometry>,
    pub grid: Option<GridIndex>,
    pub group: GroupKey,
}

impl ObservationUnit {
    /// Creates a plot-level unit with no position data.
    pub fn new(id: impl Into<UnitId>) -> Self {
        Self {
            id: id.into(),
            level: ObservationLevel::Plot,
            plot_number: None,
            position: Position::Unknown,
            geometry: None,
            grid: None,
            group: GroupKey::default(),
        }
    }

    /// Parses and classifies a raw record.
    ///
    /// Geometry prefers the explicit geo-shape over a lon/lat position; grid
    /// indices prefer explicit row/col over row/col tagged positions. Invalid
    /// geo-shapes are dropped with a warning.
    pub fn from_raw(raw: &RawObservationUnit) -> Self {
        let position = Position::classify(
            raw.x.as_deref(),
            raw.y.as_deref(),
            raw.x_type.as_deref(),
            raw.y_type.as_deref(),
        );

        let shape = raw
            .geo_shape
            .as_ref()
            .and_then(|shape| match shape.to_geometry() {
                Ok(geometry) => Some(geometry),
                Err(e) => {
                    log::warn!("Ignoring geo-shape of unit '{}': {}", raw.id, e);
                    None
                }
            });
        let geometry = shape.or_else(|| position.as_coordinate().map(UnitGeometry::Point));

        let grid = match (raw.row, raw.col) {
            (Some(row), Some(col)) => Some(GridIndex::new(row, col)),
            _ => position.as_grid(),
        };

        Self {
            id: UnitId::new(raw.id.clone()),
            level: raw
                .level
                .as_deref()
                .map(ObservationLevel::parse)
                .unwrap_or_default(),
            plot_number: parse_finite(raw.plot_number.as_deref()),
            position,
            geometry,
            grid,
            group: GroupKey {
                block: raw.block.clone(),
                replicate: raw.replicate.clone(),
            },
        }
    }

    pub fn with_plot_number(mut self, n: f64) -> Self {
        self.plot_number = Some(n);
        self
    }

    pub fn with_grid(mut self, row: u32, col: u32) -> Self {
        self.grid = Some(GridIndex::new(row, col));
        self
    }

    pub fn with_geometry(mut self, geometry: UnitGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_block(mut self, block: impl Into<String>) -> Self {
        self.group.block = Some(block.into());
        self
    }

    pub fn with_replicate(mut self, replicate: impl Into<String>) -> Self {
        self.group.replicate = Some(replicate.into());
        self
    }

    pub fn with_level(mut self, level: ObservationLevel) -> Self {
        self.level = level;
        self
    }

    /// Returns true if this unit is laid out as a plot.
    pub fn is_plot(&self) -> bool {
        self.level == ObservationLevel::Plot
    }
}
