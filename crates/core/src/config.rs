//! Layout configuration.

use crate::geom::Coordinate;
use crate::{Error, Result};
use geo::Coord;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default origin for boundary-less layouts (longitude, latitude).
pub const DEFAULT_ORIGIN: Coordinate = Coord {
    x: -76.451431,
    y: 42.464292,
};

/// Configuration shared by every layout stage.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LayoutConfig {
    /// Top-left corner of the default grid when no boundary is drawn.
    pub origin: Coordinate,

    /// Plot width (east-west) in km. `None` derives it from the boundary.
    pub plot_width_km: Option<f64>,

    /// Plot length (north-south) in km. `None` derives it from the boundary.
    pub plot_length_km: Option<f64>,

    /// Plot size used when neither a boundary nor an explicit size is available.
    pub fallback_plot_size_km: f64,

    /// Scale applied to point positions before Voronoi partitioning.
    pub point_scale: f64,

    /// Scale applied to a cell before it is split.
    pub split_scale: f64,

    /// Final per-plot scale about each plot's centroid (1.0 keeps plots touching).
    pub plot_scale: f64,

    /// Angles within this many degrees of a grid axis count as already level.
    pub level_tolerance_deg: f64,

    /// Page size requested from the unit source.
    pub page_size: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN,
            plot_width_km: None,
            plot_length_km: None,
            fallback_plot_size_km: 0.002,
            point_scale: 50.0,
            split_scale: 50.0,
            plot_scale: 1.0,
            level_tolerance_deg: 1.0,
            page_size: 1000,
        }
    }
}

impl LayoutConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the origin used for boundary-less layouts.
    pub fn with_origin(mut self, lon: f64, lat: f64) -> Self {
        self.origin = Coord { x: lon, y: lat };
        self
    }

    /// Sets an explicit plot size in km.
    pub fn with_plot_size(mut self, width_km: f64, length_km: f64) -> Self {
        self.plot_width_km = Some(width_km);
        self.plot_length_km = Some(length_km);
        self
    }

    /// Sets the plot size used when nothing else determines it.
    pub fn with_fallback_plot_size(mut self, size_km: f64) -> Self {
        self.fallback_plot_size_km = size_km;
        self
    }

    /// Sets the point and split rescale factors.
    pub fn with_scales(mut self, point_scale: f64, split_scale: f64) -> Self {
        self.point_scale = point_scale;
        self.split_scale = split_scale;
        self
    }

    /// Sets the final per-plot scale.
    pub fn with_plot_scale(mut self, scale: f64) -> Self {
        self.plot_scale = scale;
        self
    }

    /// Sets the leveling tolerance in degrees.
    pub fn with_level_tolerance(mut self, deg: f64) -> Self {
        self.level_tolerance_deg = deg.abs();
        self
    }

    /// Sets the page size requested from unit sources.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Plot width if configured, else the fallback size.
    pub fn plot_width_or_fallback(&self) -> f64 {
        self.plot_width_km.unwrap_or(self.fallback_plot_size_km)
    }

    /// Plot length if configured, else the configured width, else the fallback size.
    pub fn plot_length_or_fallback(&self) -> f64 {
        self.plot_length_km
            .or(self.plot_width_km)
            .unwrap_or(self.fallback_plot_size_km)
    }

    /// Validates value ranges.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidInput(format!(
                    "{} must be positive and finite, got {}",
                    name, v
                )))
            }
        };
        if !(self.origin.x.is_finite() && self.origin.y.is_finite()) {
            return Err(Error::InvalidInput("origin must be finite".into()));
        }
        if let Some(w) = self.plot_width_km {
            positive("plot_width_km", w)?;
        }
        if let Some(l) = self.plot_length_km {
            positive("plot_length_km", l)?;
        }
        positive("fallback_plot_size_km", self.fallback_plot_size_km)?;
        positive("point_scale", self.point_scale)?;
        positive("split_scale", self.split_scale)?;
        positive("plot_scale", self.plot_scale)?;
        if !(0.0..45.0).contains(&self.level_tolerance_deg) {
            return Err(Error::InvalidInput(format!(
                "level_tolerance_deg must be in [0, 45), got {}",
                self.level_tolerance_deg
            )));
        }
        if self.page_size == 0 {
            return Err(Error::InvalidInput("page_size must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(LayoutConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let cfg = LayoutConfig::new()
            .with_origin(1.0, 2.0)
            .with_plot_size(0.003, 0.006)
            .with_plot_scale(0.85);
        assert_eq!(cfg.origin, Coord { x: 1.0, y: 2.0 });
        assert_eq!(cfg.plot_width_or_fallback(), 0.003);
        assert_eq!(cfg.plot_length_or_fallback(), 0.006);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_length_falls_back_to_width() {
        let mut cfg = LayoutConfig::new();
        cfg.plot_width_km = Some(0.004);
        assert_eq!(cfg.plot_length_or_fallback(), 0.004);
    }

    #[test]
    fn test_invalid_values() {
        assert!(LayoutConfig::new().with_plot_scale(0.0).validate().is_err());
        assert!(LayoutConfig::new().with_page_size(0).validate().is_err());
        assert!(LayoutConfig::new()
            .with_plot_size(-1.0, 1.0)
            .validate()
            .is_err());
    }
}
