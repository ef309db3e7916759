//! Write-back of final plot polygons.

use plotmap_core::{LayoutResult, Polygon, UnitId};

/// Per-item outcome reported by a writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Failed(String),
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// Destination for final plots.
pub trait PlotWriter {
    /// Writes a batch, returning one outcome per item in batch order.
    fn write_batch(&mut self, batch: &[(UnitId, Polygon)]) -> Vec<WriteOutcome>;
}

/// Summary of one write-back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteReport {
    pub written: Vec<UnitId>,
    pub failed: Vec<(UnitId, String)>,
}

impl WriteReport {
    /// Returns true if every item was written.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.written.len() + self.failed.len()
    }
}

/// Sends every plot of `result` to `writer` in one batch.
///
/// Items the writer reports no outcome for count as failures. Every failure
/// is logged; nothing is retried.
pub fn write_back<W>(result: &LayoutResult, writer: &mut W) -> WriteReport
where
    W: PlotWriter + ?Sized,
{
    let batch: Vec<(UnitId, Polygon)> = result
        .iter()
        .map(|(id, polygon)| (id.clone(), polygon.clone()))
        .collect();
    let outcomes = writer.write_batch(&batch);
    if outcomes.len() != batch.len() {
        log::warn!(
            "Writer returned {} outcomes for {} plots",
            outcomes.len(),
            batch.len()
        );
    }

    let mut report = WriteReport::default();
    let mut outcomes = outcomes.into_iter();
    for (id, _) in batch {
        match outcomes.next() {
            Some(WriteOutcome::Written) => report.written.push(id),
            Some(WriteOutcome::Failed(reason)) => {
                log::warn!("Failed to write plot '{}': {}", id, reason);
                report.failed.push((id, reason));
            }
            None => {
                log::warn!("No write outcome for plot '{}'", id);
                report.failed.push((id, "no outcome reported".into()));
            }
        }
    }

    log::info!(
        "Wrote {}/{} plots",
        report.written.len(),
        report.total()
    );
    report
}
