//! # Plotmap Layout
//!
//! Field plot layout for the plotmap engine.
//!
//! This crate turns observation units into one non-overlapping polygon per
//! plot, from whatever positional data the units carry: explicit geometry,
//! explicit grid indices, or nothing at all (grid shape inferred from block
//! sizes and tiled into a drawn boundary).
//!
//! ## Features
//!
//! - Boundary leveling (dominant-axis rotation before tiling)
//! - Grid width inference with snake ordering
//! - Voronoi tessellation of point positions and synthetic grids
//! - Memoized splitting of cells shared by several units
//! - Paged loading with supersession of stale loads
//! - Per-item write-back reporting
//! - Spatial indexing for overlap checks
//!
//! ## Quick Start
//!
//! ```rust
//! use plotmap_layout::{LayoutConfig, LayoutPipeline, ObservationUnit};
//!
//! let units: Vec<ObservationUnit> = (0..6)
//!     .map(|i| ObservationUnit::new(format!("plot-{}", i)).with_grid(i / 3, i % 3))
//!     .collect();
//!
//! let config = LayoutConfig::new().with_plot_size(0.003, 0.006);
//! let mut pipeline = LayoutPipeline::new(config);
//! let result = pipeline.run(units, None).unwrap();
//!
//! assert_eq!(result.len(), 6);
//! assert!(!result.shaped);
//! ```
//!
//! ## Subdividing a Drawn Area
//!
//! ```rust
//! use plotmap_layout::{subdivide, BoundaryEditor, BoundaryTool};
//! use geo::Coord;
//!
//! let mut editor = BoundaryEditor::new();
//! BoundaryTool::NewRectangle.activate(&mut editor);
//! editor.push_vertex(Coord { x: -76.4515, y: 42.4640 }).unwrap();
//! editor.push_vertex(Coord { x: -76.4495, y: 42.4650 }).unwrap();
//!
//! let plots = subdivide(editor.boundary().unwrap(), 2, 4, 0.85).unwrap();
//! assert_eq!(plots.len(), 8);
//! ```

pub mod draw;
pub mod grid;
pub mod load;
pub mod orientation;
pub mod pipeline;
pub mod spatial_index;
pub mod split;
pub mod tessellate;
pub mod writeback;

// Re-exports
pub use draw::{BoundaryEditor, BoundaryTool, EditMode};
pub use grid::{assign_grid, infer_width, median_block_length, snake_index, GridShape};
pub use load::{InMemorySource, LayoutSession, LoadCoordinator, LoadTicket, UnitPage, UnitSource};
pub use orientation::{level, Leveling};
pub use pipeline::{prepare, Classification, LayoutPipeline, LayoutState};
pub use spatial_index::{find_overlaps, Overlap, PlotEntry, PlotIndex};
pub use split::CellSplitter;
pub use tessellate::{default_plot, subdivide, tessellate_grid, tessellate_points};
pub use writeback::{write_back, PlotWriter, WriteOutcome, WriteReport};
pub use plotmap_core::{
    Coordinate, Error, GridIndex, LayoutConfig, LayoutResult, LayoutWarning, ObservationUnit,
    Polygon, RawObservationUnit, Result, SplitCache, Transform, UnitGeometry, UnitId,
};
