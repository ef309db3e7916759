//! File handling for the `plotmap` command-line runner.
//!
//! This crate provides:
//! - JSON readers for observation units and boundary geo-shapes
//! - TOML reader for [`LayoutConfig`](plotmap_core::LayoutConfig)
//! - The JSON layout output, which doubles as a plot writer

mod io;
mod output;

pub use io::{load_boundary, load_config, load_units, rectangle_boundary, IoError};
pub use output::{LayoutOutput, PlotRecord, SkippedRecord};
