//! Cell splitter.
//!
//! Divides one cell polygon into `p` non-overlapping parts of roughly equal
//! point count. The cell is sampled with a masked grid, samples are bucketed
//! into `p` groups in row-major order (north to south, then west to east),
//! and the Voronoi diagram of the group centroids, clipped to the cell, gives
//! the parts.
//!
//! This is an equal-count spatial partition, not an exact-area split: parts
//! near irregular edges may differ slightly in area.

use plotmap_core::geom::{self, Coordinate, Polygon};
use plotmap_core::{Error, LayoutConfig, Result, SplitCache, SplitKey, SplitParts};

/// Extra sample points requested per part.
const POINTS_PER_PART: usize = 100;

/// Sample points requested regardless of part count.
const BASE_POINTS: usize = 50;

/// Fraction of the bbox size added on every side before sampling and clipping.
const BBOX_PADDING: f64 = 0.01;

/// How many times the sample step is halved when a cell yields too few points.
const MAX_REFINEMENTS: usize = 4;

/// Splits cells shared by several units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSplitter {
    scale: f64,
}

impl Default for CellSplitter {
    fn default() -> Self {
        Self::new(LayoutConfig::default().split_scale)
    }
}

impl CellSplitter {
    /// Creates a splitter that works in a frame rescaled by `scale` about the cell centroid.
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }

    /// Creates a splitter from the layout configuration.
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::new(config.split_scale)
    }

    /// Returns part `i` of `cell` split into `p` pieces.
    ///
    /// `p < 2` returns the cell unchanged. The split itself is memoized in
    /// `cache`, so sibling parts of one cell are computed once.
    pub fn split(
        &self,
        cache: &mut SplitCache,
        cell: &Polygon,
        p: usize,
        i: usize,
    ) -> Result<Polygon> {
        if p < 2 {
            return Ok(cell.clone());
        }
        if i >= p {
            return Err(Error::InvalidInput(format!(
                "part index {} out of range for {} parts",
                i, p
            )));
        }

        let parts = self.parts(cache, cell, p)?;
        parts[i].clone().ok_or_else(|| {
            Error::PartitionGeometry(format!("part {} of {} has no cell", i, p))
        })
    }

    /// Returns all `p` parts of `cell` in row-major order.
    pub fn split_all(&self, cache: &mut SplitCache, cell: &Polygon, p: usize) -> Result<SplitParts> {
        if p < 2 {
            return Ok(SplitParts::new(vec![Some(cell.clone())]));
        }
        self.parts(cache, cell, p)
    }

    fn parts(&self, cache: &mut SplitCache, cell: &Polygon, p: usize) -> Result<SplitParts> {
        let key = SplitKey::new(cell, p);
        cache.get_or_compute(key, || self.compute(cell, p))
    }

    fn compute(&self, cell: &Polygon, p: usize) -> Result<Vec<Option<Polygon>>> {
        geom::validate_polygon(cell)?;

        let center = geom::centroid(cell);
        let scaled = geom::scale(cell, self.scale, center);
        let bbox = geom::polygon_bbox(&scaled)
            .map(|r| geom::pad_rect(&r, BBOX_PADDING))
            .ok_or_else(|| Error::PartitionGeometry("cell has no extent".into()))?;

        let samples = sample_cell(&scaled, &bbox, p);
        if samples.len() < p {
            return Err(Error::PartitionGeometry(format!(
                "only {} samples for {} parts",
                samples.len(),
                p
            )));
        }

        let centers = group_centroids(samples, p);
        let outside = geom::mask(&scaled, &bbox);
        let inverse = 1.0 / self.scale;

        let pieces: Vec<Vec<Polygon>> = geom::voronoi(&centers, &bbox)
            .into_iter()
            .map(|v| match (v, &outside) {
                (None, _) => Vec::new(),
                (Some(v), Some(outside)) => geom::difference_pieces(&v, outside),
                (Some(v), None) => vec![v],
            })
            .collect();
        let parts: Vec<Option<Polygon>> = geom::merge_detached(pieces)
            .into_iter()
            .map(|part| part.map(|p| geom::scale(&p, inverse, center)))
            .collect();

        let missing = parts.iter().filter(|part| part.is_none()).count();
        if missing > 0 {
            log::warn!("{} of {} split parts produced no polygon", missing, p);
        }
        log::debug!("Split cell into {} parts", p);
        Ok(parts)
    }
}

/// Masked grid of roughly `50 + 100p` points inside `cell`.
fn sample_cell(cell: &Polygon, bbox: &geom::Rect, p: usize) -> Vec<Coordinate> {
    let target = (BASE_POINTS + POINTS_PER_PART * p) as f64;
    let mut step = (geom::planar_area(cell) / target).sqrt();

    let mut samples = geom::point_grid_planar(bbox, step, step, Some(cell));
    for _ in 0..MAX_REFINEMENTS {
        if samples.len() >= p {
            break;
        }
        step /= 2.0;
        samples = geom::point_grid_planar(bbox, step, step, Some(cell));
    }
    samples
}

/// Buckets samples into `p` row-major groups and returns each group's centroid.
fn group_centroids(mut samples: Vec<Coordinate>, p: usize) -> Vec<Coordinate> {
    samples.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let row_width = (p as f64).sqrt().ceil() as usize;
    let per_part = samples.len() / p;
    let full_rows = p / row_width;
    let remainder = p % row_width;

    let mut widths = vec![row_width; full_rows];
    if remainder > 0 {
        widths.push(remainder);
    }

    let mut centers = Vec::with_capacity(p);
    let mut start = 0;
    for width in widths {
        let end = start + width * per_part;
        let mut row = samples[start..end].to_vec();
        row.sort_by(|a, b| a.x.total_cmp(&b.x).then(b.y.total_cmp(&a.y)));
        for group in row.chunks(per_part) {
            if let Some(c) = geom::mean(group) {
                centers.push(c);
            }
        }
        start = end;
    }
    centers
}
