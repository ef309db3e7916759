//! Layout result representation.

use crate::geom::Polygon;
use crate::unit::UnitId;
use std::collections::HashMap;

/// Reason a unit was left out of a layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutWarning {
    /// Affected unit.
    pub unit: UnitId,
    /// Human-readable cause.
    pub message: String,
}

impl LayoutWarning {
    pub fn new(unit: UnitId, message: impl Into<String>) -> Self {
        Self {
            unit,
            message: message.into(),
        }
    }
}

/// Final plot polygons keyed by unit identity.
///
/// Entries keep insertion order, which the pipeline makes equal to plot order.
#[derive(Debug, Clone, Default)]
pub struct LayoutResult {
    entries: Vec<(UnitId, Polygon)>,
    index: HashMap<UnitId, usize>,

    /// True when plots come from real geometry rather than an inferred grid.
    pub shaped: bool,

    /// Leveling rotation (degrees) that was undone on the result; 0 if none.
    pub level_angle_deg: f64,

    /// Units skipped because their geometry could not be built.
    pub warnings: Vec<LayoutWarning>,
}

impl LayoutResult {
    /// Creates an empty result.
    pub fn new(shaped: bool) -> Self {
        Self {
            shaped,
            ..Default::default()
        }
    }

    /// Adds a plot. The first polygon recorded for an identity wins; returns false for repeats.
    pub fn insert(&mut self, id: UnitId, polygon: Polygon) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push((id, polygon));
        true
    }

    /// Returns the polygon of a unit.
    pub fn get(&self, id: &UnitId) -> Option<&Polygon> {
        self.index.get(id).map(|&i| &self.entries[i].1)
    }

    /// Returns true if the unit has a plot.
    pub fn contains(&self, id: &UnitId) -> bool {
        self.index.contains_key(id)
    }

    /// Number of plots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no plots.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates plots in order.
    pub fn iter(&self) -> impl Iterator<Item = (&UnitId, &Polygon)> {
        self.entries.iter().map(|(id, p)| (id, p))
    }

    /// Unit identities in order.
    pub fn ids(&self) -> impl Iterator<Item = &UnitId> {
        self.entries.iter().map(|(id, _)| id)
    }

    /// Replaces every polygon with `f(polygon)`, keeping identities and order.
    pub fn map_polygons<F>(mut self, mut f: F) -> Self
    where
        F: FnMut(&Polygon) -> Polygon,
    {
        for (_, polygon) in &mut self.entries {
            *polygon = f(polygon);
        }
        self
    }

    /// Records a skipped unit.
    pub fn warn(&mut self, unit: UnitId, message: impl Into<String>) {
        self.warnings.push(LayoutWarning::new(unit, message));
    }
}
