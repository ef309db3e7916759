//! Spatial indexing of laid-out plots using an R*-tree.
//!
//! Used as the broad phase when checking a layout for overlapping plots:
//! only plots whose bounding boxes intersect are compared exactly.

use plotmap_core::geom::{self, Polygon};
use plotmap_core::{LayoutResult, UnitId};
use rstar::{RTree, RTreeObject, AABB};

/// A plot's bounding box in the index.
#[derive(Debug, Clone)]
pub struct PlotEntry {
    /// Position of the plot in the layout result.
    pub index: usize,
    pub id: UnitId,
    /// Axis-aligned bounding box (min_x, min_y, max_x, max_y)
    pub aabb: [f64; 4],
}

impl PlotEntry {
    /// Creates an entry from a plot polygon; `None` for an empty polygon.
    pub fn from_polygon(index: usize, id: UnitId, polygon: &Polygon) -> Option<Self> {
        let bbox = geom::polygon_bbox(polygon)?;
        Some(Self {
            index,
            id,
            aabb: [bbox.min().x, bbox.min().y, bbox.max().x, bbox.max().y],
        })
    }
}

impl RTreeObject for PlotEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.aabb[0], self.aabb[1]], [self.aabb[2], self.aabb[3]])
    }
}

/// R*-tree over plot bounding boxes.
#[derive(Debug)]
pub struct PlotIndex {
    tree: RTree<PlotEntry>,
}

impl PlotIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Bulk-loads every plot of a layout.
    pub fn from_result(result: &LayoutResult) -> Self {
        let entries: Vec<PlotEntry> = result
            .iter()
            .enumerate()
            .filter_map(|(i, (id, polygon))| PlotEntry::from_polygon(i, id.clone(), polygon))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Returns the number of entries in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns true if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Finds all entries whose bounding boxes intersect with the given AABB.
    pub fn query_aabb(&self, min: [f64; 2], max: [f64; 2]) -> Vec<&PlotEntry> {
        let envelope = AABB::from_corners(min, max);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .collect()
    }

    /// Entries whose boxes intersect `entry`'s box, excluding `entry` itself.
    pub fn neighbours(&self, entry: &PlotEntry) -> Vec<&PlotEntry> {
        self.query_aabb([entry.aabb[0], entry.aabb[1]], [entry.aabb[2], entry.aabb[3]])
            .into_iter()
            .filter(|other| other.index != entry.index)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlotEntry> {
        self.tree.iter()
    }
}

impl Default for PlotIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Two plots whose interiors intersect.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlap {
    pub first: UnitId,
    pub second: UnitId,
    /// Intersection area in km².
    pub area_km2: f64,
}

/// Pairs of plots overlapping by more than `min_area_km2`, in plot order.
pub fn find_overlaps(result: &LayoutResult, min_area_km2: f64) -> Vec<Overlap> {
    let polygons: Vec<&Polygon> = result.iter().map(|(_, p)| p).collect();
    let index = PlotIndex::from_result(result);

    let mut entries: Vec<&PlotEntry> = index.iter().collect();
    entries.sort_by_key(|e| e.index);

    let mut overlaps = Vec::new();
    for entry in entries {
        let mut candidates = index.neighbours(entry);
        candidates.retain(|other| other.index > entry.index);
        candidates.sort_by_key(|other| other.index);
        for other in candidates {
            let area: f64 = geom::intersect_pieces(polygons[entry.index], polygons[other.index])
                .iter()
                .map(geom::area_km2)
                .sum();
            if area > min_area_km2 {
                overlaps.push(Overlap {
                    first: entry.id.clone(),
                    second: other.id.clone(),
                    area_km2: area,
                });
            }
        }
    }

    if !overlaps.is_empty() {
        log::warn!("Layout has {} overlapping plot pairs", overlaps.len());
    }
    overlaps
}
