//! # Plotmap Core
//!
//! Shared types for the plotmap field layout engine.
//!
//! This crate provides the data model and geometry kernel used by the layout
//! stages in `plotmap-layout`.
//!
//! ## Core Components
//!
//! - **Data model**: [`ObservationUnit`], [`RawObservationUnit`], [`Position`], [`GridIndex`], [`GroupKey`]
//! - **Geometry kernel**: [`geom`] - area, centroids, hull, point grids, bounded Voronoi, overlay, geodesic helpers
//! - **Transforms**: [`Transform`] - rotate/scale/translate about an explicit origin
//! - **Configuration**: [`LayoutConfig`]
//! - **Results**: [`LayoutResult`], [`LayoutWarning`]
//! - **Split memo**: [`SplitCache`]
//!
//! ## Configuration
//!
//! ```rust
//! use plotmap_core::LayoutConfig;
//!
//! let config = LayoutConfig::new()
//!     .with_origin(-76.451431, 42.464292)
//!     .with_plot_size(0.003, 0.006)
//!     .with_plot_scale(0.85);
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod cache;
pub mod config;
pub mod error;
pub mod geom;
pub mod result;
pub mod transform;
pub mod unit;

// Re-exports
pub use cache::{SplitCache, SplitKey, SplitParts};
pub use config::{LayoutConfig, DEFAULT_ORIGIN};
pub use error::{Error, Result};
pub use geom::{Coordinate, Polygon, Rect};
pub use result::{LayoutResult, LayoutWarning};
pub use transform::Transform;
pub use unit::{
    GeoShape, GridIndex, GroupKey, ObservationLevel, ObservationUnit, Position, PositionKind,
    RawObservationUnit, UnitGeometry, UnitId,
};
