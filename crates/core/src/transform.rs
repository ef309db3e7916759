//! Affine transforms applied about an explicit origin.
//!
//! Transforms never compose implicitly: each value describes one operation,
//! and [`Transform::inverse`] yields the parameters that undo it.

use crate::geom::{self, Coordinate, Polygon};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single affine operation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Transform {
    /// Counter-clockwise rotation in degrees about `origin`.
    Rotate { angle_deg: f64, origin: Coordinate },
    /// Uniform scale about `origin`.
    Scale { factor: f64, origin: Coordinate },
    /// Translation in coordinate units.
    Translate { dx: f64, dy: f64 },
}

impl Transform {
    pub fn rotate(angle_deg: f64, origin: Coordinate) -> Self {
        Self::Rotate { angle_deg, origin }
    }

    pub fn scale(factor: f64, origin: Coordinate) -> Self {
        Self::Scale { factor, origin }
    }

    pub fn translate(dx: f64, dy: f64) -> Self {
        Self::Translate { dx, dy }
    }

    /// Returns true if applying this transform leaves geometry unchanged.
    pub fn is_identity(&self) -> bool {
        match *self {
            Self::Rotate { angle_deg, .. } => angle_deg.rem_euclid(360.0) == 0.0,
            Self::Scale { factor, .. } => factor == 1.0,
            Self::Translate { dx, dy } => dx == 0.0 && dy == 0.0,
        }
    }

    /// Returns the transform that undoes this one.
    ///
    /// A zero scale factor has no inverse and yields `None`.
    pub fn inverse(&self) -> Option<Self> {
        match *self {
            Self::Rotate { angle_deg, origin } => Some(Self::Rotate {
                angle_deg: -angle_deg,
                origin,
            }),
            Self::Scale { factor, origin } => (factor != 0.0 && factor.is_finite())
                .then(|| Self::Scale {
                    factor: 1.0 / factor,
                    origin,
                }),
            Self::Translate { dx, dy } => Some(Self::Translate { dx: -dx, dy: -dy }),
        }
    }

    /// Applies the transform to a polygon.
    pub fn apply(&self, polygon: &Polygon) -> Polygon {
        if self.is_identity() {
            return polygon.clone();
        }
        match *self {
            Self::Rotate { angle_deg, origin } => geom::rotate(polygon, angle_deg, origin),
            Self::Scale { factor, origin } => geom::scale(polygon, factor, origin),
            Self::Translate { dx, dy } => geom::translate(polygon, dx, dy),
        }
    }

    /// Applies the transform to a coordinate.
    pub fn apply_coord(&self, c: Coordinate) -> Coordinate {
        match *self {
            Self::Rotate { angle_deg, origin } => geom::rotate_coord(c, angle_deg, origin),
            Self::Scale { factor, origin } => geom::scale_coord(c, factor, origin),
            Self::Translate { dx, dy } => Coordinate {
                x: c.x + dx,
                y: c.y + dy,
            },
        }
    }
}
