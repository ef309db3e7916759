//! Layout output file.

use crate::io::IoError;
use plotmap_core::{GeoShape, LayoutResult, Polygon, UnitId};
use plotmap_layout::{Overlap, PlotWriter, WriteOutcome, WriteReport};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One plot in the output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotRecord {
    pub id: String,
    pub geometry: GeoShape,
}

/// A unit left without a plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub id: String,
    pub reason: String,
}

/// Layout summary written by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutOutput {
    pub study: Option<String>,
    pub shaped: bool,
    pub level_angle_deg: f64,
    pub plots: Vec<PlotRecord>,
    pub skipped: Vec<SkippedRecord>,
    /// Pairs of overlapping plots with their shared area in km².
    pub overlaps: Vec<(String, String, f64)>,
}

impl LayoutOutput {
    /// Creates an empty output carrying the layout's metadata.
    pub fn for_result(study: Option<String>, result: &LayoutResult) -> Self {
        Self {
            study,
            shaped: result.shaped,
            level_angle_deg: result.level_angle_deg,
            skipped: result
                .warnings
                .iter()
                .map(|w| SkippedRecord {
                    id: w.unit.to_string(),
                    reason: w.message.clone(),
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Records overlapping pairs.
    pub fn with_overlaps(mut self, overlaps: &[Overlap]) -> Self {
        self.overlaps = overlaps
            .iter()
            .map(|o| (o.first.to_string(), o.second.to_string(), o.area_km2))
            .collect();
        self
    }

    /// Adds write failures to the skipped list.
    pub fn record_failures(&mut self, report: &WriteReport) {
        for (id, reason) in &report.failed {
            self.skipped.push(SkippedRecord {
                id: id.to_string(),
                reason: format!("write failed: {}", reason),
            });
        }
    }

    /// Saves the output as pretty JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl PlotWriter for LayoutOutput {
    fn write_batch(&mut self, batch: &[(UnitId, Polygon)]) -> Vec<WriteOutcome> {
        batch
            .iter()
            .map(|(id, polygon)| {
                let ring = polygon.exterior();
                if ring.0.len() < 4 || ring.coords().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
                    return WriteOutcome::Failed("plot ring is not a valid polygon".into());
                }
                self.plots.push(PlotRecord {
                    id: id.to_string(),
                    geometry: GeoShape::from_polygon(polygon),
                });
                WriteOutcome::Written
            })
            .collect()
    }
}
