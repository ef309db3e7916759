//! Orientation normalization ("leveling") of a hand-drawn boundary.
//!
//! The boundary is sampled with a masked point grid; the samples farthest
//! from the center of mass are split into two clusters, and the axis through
//! the more northern cluster is taken as the dominant direction. The boundary
//! is then rotated by the smallest angle that puts that axis on a grid axis.
//!
//! This approximates a bounding orientation. It is not a minimum-area
//! rectangle fit: near-square or irregular shapes may level imperfectly.

use plotmap_core::geom::{self, Coordinate, Polygon};
use plotmap_core::{LayoutConfig, Result, Transform};

/// Upper bound on 2-means iterations.
const MAX_KMEANS_ITERATIONS: usize = 32;

/// Fraction of samples (by distance from center) treated as extremes.
const EXTREME_PERCENTILE: f64 = 0.75;

/// A leveled boundary and the rotation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Leveling {
    /// Counter-clockwise rotation applied to the boundary, degrees.
    pub angle_deg: f64,
    /// Rotation origin (the boundary's center of mass).
    pub origin: Coordinate,
    /// The rotated boundary.
    pub leveled: Polygon,
}

impl Leveling {
    /// A leveling that leaves the boundary as drawn.
    pub fn identity(boundary: &Polygon) -> Self {
        Self {
            angle_deg: 0.0,
            origin: geom::center_of_mass(boundary),
            leveled: boundary.clone(),
        }
    }

    /// The forward rotation.
    pub fn transform(&self) -> Transform {
        Transform::rotate(self.angle_deg, self.origin)
    }

    /// Rotates a polygon from the leveled frame back to the drawn frame.
    pub fn undo(&self, polygon: &Polygon) -> Polygon {
        if self.angle_deg == 0.0 {
            return polygon.clone();
        }
        self.transform()
            .inverse()
            .map_or_else(|| polygon.clone(), |t| t.apply(polygon))
    }
}

/// Levels `boundary`, rotating it about its own center of mass.
pub fn level(boundary: &Polygon, config: &LayoutConfig) -> Result<Leveling> {
    geom::validate_polygon(boundary)?;

    let origin = geom::center_of_mass(boundary);
    let candidate = leveling_angle(boundary, origin, config.level_tolerance_deg);
    if candidate == 0.0 {
        return Ok(Leveling::identity(boundary));
    }

    let leveled = Transform::rotate(candidate, origin).apply(boundary);
    if bbox_fill(&leveled) + 1e-9 < bbox_fill(boundary) {
        log::debug!(
            "Discarding leveling rotation of {:.2}° that loosens the bounding box",
            candidate
        );
        return Ok(Leveling::identity(boundary));
    }

    log::debug!("Leveled boundary by {:.2}°", candidate);
    Ok(Leveling {
        angle_deg: candidate,
        origin,
        leveled,
    })
}

/// Estimates the leveling rotation in degrees, in `(-45, 45]`.
pub fn leveling_angle(boundary: &Polygon, center: Coordinate, tolerance_deg: f64) -> f64 {
    let Some(bbox) = geom::polygon_bbox(boundary) else {
        return 0.0;
    };
    let spacing_km = geom::area_km2(boundary).sqrt() / 10.0;
    let samples = geom::point_grid(&bbox, spacing_km, Some(boundary));
    if samples.len() < 3 {
        log::warn!(
            "Only {} leveling samples inside the boundary; leaving it unrotated",
            samples.len()
        );
        return 0.0;
    }

    let extremes = extreme_points(&samples, center);
    let Some((a, b)) = two_means(&extremes, center) else {
        return 0.0;
    };
    let northern = if a.y >= b.y { a } else { b };
    let bearing = geom::planar_bearing_deg(center, northern);
    reduce_to_axis(bearing, tolerance_deg)
}

/// Samples strictly beyond the 75th-percentile distance from `center`.
fn extreme_points(samples: &[Coordinate], center: Coordinate) -> Vec<Coordinate> {
    let mut distances: Vec<f64> = samples.iter().map(|&p| dist2(p, center)).collect();
    distances.sort_by(|a, b| a.total_cmp(b));
    let cut = distances[((distances.len() - 1) as f64 * EXTREME_PERCENTILE).floor() as usize];

    let beyond: Vec<Coordinate> = samples
        .iter()
        .copied()
        .filter(|&p| dist2(p, center) > cut)
        .collect();
    if beyond.len() >= 2 {
        beyond
    } else {
        samples
            .iter()
            .copied()
            .filter(|&p| dist2(p, center) >= cut)
            .collect()
    }
}

/// Deterministic 2-means: seeded with the point farthest from `center` and the point farthest from that one.
fn two_means(points: &[Coordinate], center: Coordinate) -> Option<(Coordinate, Coordinate)> {
    let farthest_from = |q: Coordinate| {
        points
            .iter()
            .copied()
            .max_by(|&a, &b| dist2(a, q).total_cmp(&dist2(b, q)))
    };
    let mut ca = farthest_from(center)?;
    let mut cb = farthest_from(ca)?;
    if ca == cb {
        return None;
    }

    for _ in 0..MAX_KMEANS_ITERATIONS {
        let (left, right): (Vec<Coordinate>, Vec<Coordinate>) =
            points.iter().copied().partition(|&p| dist2(p, ca) <= dist2(p, cb));
        let (Some(na), Some(nb)) = (geom::mean(&left), geom::mean(&right)) else {
            return None;
        };
        if na == ca && nb == cb {
            break;
        }
        ca = na;
        cb = nb;
    }
    Some((ca, cb))
}

/// Smallest rotation (degrees, counter-clockwise) that aligns an axis at `bearing_deg` with a grid axis.
fn reduce_to_axis(bearing_deg: f64, tolerance_deg: f64) -> f64 {
    let mut a = bearing_deg.rem_euclid(90.0);
    if a > 45.0 {
        a -= 90.0;
    }
    if a.abs() <= tolerance_deg {
        0.0
    } else {
        a
    }
}

/// Polygon area over bounding-box area.
fn bbox_fill(polygon: &Polygon) -> f64 {
    let Some(bbox) = geom::polygon_bbox(polygon) else {
        return 0.0;
    };
    let box_area = bbox.width() * bbox.height();
    if box_area > 0.0 {
        geom::planar_area(polygon) / box_area
    } else {
        0.0
    }
}

fn dist2(a: Coordinate, b: Coordinate) -> f64 {
    (a.x - b.x).powi(2) + (a.y - b.y).powi(2)
}
