//! Planar and spherical geometry kernel.
//!
//! Coordinates are `(longitude, latitude)` in decimal degrees. Planar
//! operations (Voronoi, overlay, affine transforms) work directly in that
//! plane, which is adequate for plot-scale extents. Distances are kilometers.
//!
//! Boolean operations use `i_overlay`; area, centroid, hull and affine
//! operations come from `geo`. The bounded Voronoi diagram is computed by
//! clipping the bounding rectangle with the perpendicular bisector of every
//! other seed.

use crate::{Error, Result};
use geo::{
    Area, Bearing, BoundingRect, Centroid, ChamberlainDuquetteArea, Contains, ConvexHull, Coord,
    Destination, Distance, Haversine, LineString, MultiPoint, Point, Rotate, Scale, Translate,
};
use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;

/// A `(longitude, latitude)` pair in degrees.
pub type Coordinate = Coord<f64>;

/// A closed polygon; only the exterior ring is used for plots.
pub type Polygon = geo::Polygon<f64>;

/// An axis-aligned bounding box.
pub type Rect = geo::Rect<f64>;

/// Mean earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Kilometers per degree of latitude on the mean sphere.
pub const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

// ============================================================================
// Measures
// ============================================================================

/// Unsigned area in squared coordinate units.
pub fn planar_area(polygon: &Polygon) -> f64 {
    polygon.unsigned_area()
}

/// Geodesic area in km².
pub fn area_km2(polygon: &Polygon) -> f64 {
    polygon.chamberlain_duquette_unsigned_area() / 1.0e6
}

/// Bounding box of a set of coordinates, `None` if empty.
pub fn bounding_box<I>(coords: I) -> Option<Rect>
where
    I: IntoIterator<Item = Coordinate>,
{
    MultiPoint::from_iter(coords.into_iter().map(Point::from)).bounding_rect()
}

/// Bounding box of a polygon's exterior.
pub fn polygon_bbox(polygon: &Polygon) -> Option<Rect> {
    polygon.bounding_rect()
}

/// Expands a rectangle by `fraction` of its size on every side.
///
/// Zero-size dimensions are padded by `fraction` of the other dimension, or
/// by `fraction` itself when the rectangle is a single point.
pub fn pad_rect(rect: &Rect, fraction: f64) -> Rect {
    let w = rect.width();
    let h = rect.height();
    let base = w.max(h).max(f64::EPSILON);
    let dx = if w > 0.0 { w * fraction } else { base * fraction };
    let dy = if h > 0.0 { h * fraction } else { base * fraction };
    Rect::new(
        Coord {
            x: rect.min().x - dx,
            y: rect.min().y - dy,
        },
        Coord {
            x: rect.max().x + dx,
            y: rect.max().y + dy,
        },
    )
}

/// Vertex mean of the exterior ring (closing coordinate excluded).
pub fn centroid(polygon: &Polygon) -> Coordinate {
    let coords = open_ring(polygon);
    mean(&coords).unwrap_or(Coord { x: 0.0, y: 0.0 })
}

/// Area-weighted centroid; falls back to the vertex mean for zero-area rings.
pub fn center_of_mass(polygon: &Polygon) -> Coordinate {
    if planar_area(polygon) > 0.0 {
        if let Some(c) = polygon.centroid() {
            return c.0;
        }
    }
    centroid(polygon)
}

/// Arithmetic mean of coordinates.
pub fn mean(coords: &[Coordinate]) -> Option<Coordinate> {
    if coords.is_empty() {
        return None;
    }
    let n = coords.len() as f64;
    let (sx, sy) = coords
        .iter()
        .fold((0.0, 0.0), |(sx, sy), c| (sx + c.x, sy + c.y));
    Some(Coord {
        x: sx / n,
        y: sy / n,
    })
}

/// Convex hull of a point set.
pub fn convex_hull(points: &[Coordinate]) -> Polygon {
    MultiPoint::from(points.to_vec()).convex_hull()
}

/// Returns the exterior ring without its closing coordinate.
pub fn open_ring(polygon: &Polygon) -> Vec<Coordinate> {
    let mut coords: Vec<Coordinate> = polygon.exterior().coords().copied().collect();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    coords
}

/// Builds a polygon from an open or closed ring.
pub fn polygon_from_ring(ring: Vec<Coordinate>) -> Polygon {
    Polygon::new(LineString::from(ring), vec![])
}

/// Checks the polygon contract: closed ring of at least 4 finite coordinates and positive area.
pub fn validate_polygon(polygon: &Polygon) -> Result<()> {
    let ring = polygon.exterior();
    if ring.0.len() < 4 {
        return Err(Error::InvalidGeometry(format!(
            "ring must have at least 4 coordinates, got {}",
            ring.0.len()
        )));
    }
    if ring.coords().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(Error::InvalidGeometry("non-finite coordinate".into()));
    }
    if planar_area(polygon) <= 0.0 {
        return Err(Error::InvalidGeometry("polygon has zero area".into()));
    }
    Ok(())
}

// ============================================================================
// Sampling
// ============================================================================

/// Uniform grid of points spaced `spacing_km` apart inside `rect`, optionally masked.
pub fn point_grid(rect: &Rect, spacing_km: f64, mask: Option<&Polygon>) -> Vec<Coordinate> {
    let mid_lat = rect.center().y;
    let step_y = spacing_km / KM_PER_DEGREE;
    let step_x = step_y / mid_lat.to_radians().cos().abs().max(1e-6);
    point_grid_planar(rect, step_x, step_y, mask)
}

/// Uniform grid with explicit per-axis steps in coordinate units.
///
/// The lattice is centered in the rectangle and listed row-major from the
/// south-west corner. Non-positive or non-finite steps yield no points.
pub fn point_grid_planar(
    rect: &Rect,
    step_x: f64,
    step_y: f64,
    mask: Option<&Polygon>,
) -> Vec<Coordinate> {
    if !(step_x.is_finite() && step_y.is_finite() && step_x > 0.0 && step_y > 0.0) {
        return Vec::new();
    }

    let nx = (rect.width() / step_x).floor() as usize + 1;
    let ny = (rect.height() / step_y).floor() as usize + 1;
    let x0 = rect.min().x + (rect.width() - (nx - 1) as f64 * step_x) / 2.0;
    let y0 = rect.min().y + (rect.height() - (ny - 1) as f64 * step_y) / 2.0;

    let mut points = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let c = Coord {
                x: x0 + i as f64 * step_x,
                y: y0 + j as f64 * step_y,
            };
            if mask.map_or(true, |m| m.contains(&Point::from(c))) {
                points.push(c);
            }
        }
    }
    points
}

// ============================================================================
// Voronoi
// ============================================================================

/// Voronoi diagram of `points` clipped to `rect`.
///
/// Returns one entry per input point in input order. Repeated points (after
/// the first occurrence) and cells that collapse to zero area are `None`.
pub fn voronoi(points: &[Coordinate], rect: &Rect) -> Vec<Option<Polygon>> {
    let frame = open_ring(&rect.to_polygon());

    points
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            if points[..i].iter().any(|q| *q == p) {
                return None;
            }
            let mut cell = frame.clone();
            for (j, &q) in points.iter().enumerate() {
                if i == j || q == p {
                    continue;
                }
                let mid = Coord {
                    x: (p.x + q.x) / 2.0,
                    y: (p.y + q.y) / 2.0,
                };
                let normal = Coord {
                    x: q.x - p.x,
                    y: q.y - p.y,
                };
                cell = clip_half_plane(&cell, mid, normal);
                if cell.len() < 3 {
                    return None;
                }
            }
            let polygon = polygon_from_ring(cell);
            (planar_area(&polygon) > 0.0).then_some(polygon)
        })
        .collect()
}

/// Keeps the part of a convex ring on the side `(c - mid) · normal <= 0`.
fn clip_half_plane(ring: &[Coordinate], mid: Coordinate, normal: Coordinate) -> Vec<Coordinate> {
    let side = |c: Coordinate| (c.x - mid.x) * normal.x + (c.y - mid.y) * normal.y;
    let n = ring.len();
    let mut out = Vec::with_capacity(n + 1);

    for k in 0..n {
        let a = ring[k];
        let b = ring[(k + 1) % n];
        let sa = side(a);
        let sb = side(b);
        if sa <= 0.0 {
            out.push(a);
        }
        if (sa < 0.0 && sb > 0.0) || (sa > 0.0 && sb < 0.0) {
            let t = sa / (sa - sb);
            out.push(Coord {
                x: a.x + t * (b.x - a.x),
                y: a.y + t * (b.y - a.y),
            });
        }
    }
    out
}

// ============================================================================
// Boolean operations
// ============================================================================

/// Intersection of two polygons; the largest resulting piece, if any.
pub fn intersect(a: &Polygon, b: &Polygon) -> Option<Polygon> {
    intersect_pieces(a, b).into_iter().next()
}

/// `a` minus `b`; the largest resulting piece, if any.
pub fn difference(a: &Polygon, b: &Polygon) -> Option<Polygon> {
    difference_pieces(a, b).into_iter().next()
}

/// Every piece of the intersection, largest first.
pub fn intersect_pieces(a: &Polygon, b: &Polygon) -> Vec<Polygon> {
    overlay(a, b, OverlayRule::Intersect)
}

/// Every piece of `a` minus `b`, largest first.
pub fn difference_pieces(a: &Polygon, b: &Polygon) -> Vec<Polygon> {
    overlay(a, b, OverlayRule::Difference)
}

/// Union of two polygons, largest piece first. Polygons sharing an edge merge into one piece.
pub fn union(a: &Polygon, b: &Polygon) -> Vec<Polygon> {
    overlay(a, b, OverlayRule::Union)
}

/// The rectangle minus the polygon (a frame with the polygon as its hole).
pub fn mask(polygon: &Polygon, rect: &Rect) -> Option<Polygon> {
    difference(&rect.to_polygon(), polygon)
}

fn overlay(a: &Polygon, b: &Polygon, rule: OverlayRule) -> Vec<Polygon> {
    let subject = to_contours(a);
    let clip = to_contours(b);

    let mut pieces: Vec<(f64, Polygon)> = subject
        .overlay(&clip, rule, FillRule::EvenOdd)
        .into_iter()
        .filter(|shape| shape.first().map_or(false, |outer| outer.len() >= 3))
        .map(|shape| {
            let mut rings = shape.into_iter().map(|contour| {
                LineString::from(
                    contour
                        .into_iter()
                        .map(|[x, y]| Coord { x, y })
                        .collect::<Vec<_>>(),
                )
            });
            let exterior = rings.next().unwrap_or_else(|| LineString::new(vec![]));
            let polygon = Polygon::new(exterior, rings.collect());
            (planar_area(&polygon), polygon)
        })
        .filter(|(area, _)| *area > 0.0)
        .collect();
    pieces.sort_by(|(a, _), (b, _)| b.total_cmp(a));
    pieces.into_iter().map(|(_, polygon)| polygon).collect()
}

fn to_contours(polygon: &Polygon) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| {
            let mut contour: Vec<[f64; 2]> = ring.coords().map(|c| [c.x, c.y]).collect();
            if contour.len() > 1 && contour.first() == contour.last() {
                contour.pop();
            }
            contour
        })
        .collect()
}

/// Turns per-cell overlay pieces into one polygon per cell.
///
/// Each cell keeps its largest piece. Detached smaller pieces are merged into
/// the nearest kept polygon they share an edge with, so the cells still cover
/// the clipped region without overlapping. Pieces that touch no kept polygon
/// along an edge are dropped with a warning.
pub fn merge_detached(pieces: Vec<Vec<Polygon>>) -> Vec<Option<Polygon>> {
    let mut cells: Vec<Option<Polygon>> = Vec::with_capacity(pieces.len());
    let mut detached: Vec<Polygon> = Vec::new();
    for cell_pieces in pieces {
        let mut iter = cell_pieces.into_iter();
        cells.push(iter.next());
        detached.extend(iter);
    }
    if detached.is_empty() {
        return cells;
    }
    log::debug!("Reassigning {} detached cell pieces", detached.len());

    // A piece may only touch another cell through a piece merged earlier in the pass.
    loop {
        let before = detached.len();
        detached.retain(|piece| !absorb(&mut cells, piece));
        if detached.is_empty() || detached.len() == before {
            break;
        }
    }

    if !detached.is_empty() {
        let lost: f64 = detached.iter().map(area_km2).sum();
        log::warn!(
            "Dropped {} detached pieces ({:.6} km²) that share no edge with any plot",
            detached.len(),
            lost
        );
    }
    cells
}

/// Merges `piece` into the nearest cell it joins along an edge; returns false if none does.
fn absorb(cells: &mut [Option<Polygon>], piece: &Polygon) -> bool {
    let at = center_of_mass(piece);
    let mut candidates: Vec<(f64, usize)> = cells
        .iter()
        .enumerate()
        .filter_map(|(k, cell)| {
            let c = center_of_mass(cell.as_ref()?);
            Some(((c.x - at.x).powi(2) + (c.y - at.y).powi(2), k))
        })
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

    for (_, k) in candidates {
        let Some(cell) = cells[k].as_ref() else {
            continue;
        };
        let mut merged = union(cell, piece);
        if merged.len() == 1 {
            cells[k] = merged.pop();
            return true;
        }
    }
    false
}

// ============================================================================
// Offsetting
// ============================================================================

/// Offsets a convex ring by `distance` (positive grows, negative shrinks), mitered corners.
pub fn offset_convex(polygon: &Polygon, distance: f64) -> Result<Polygon> {
    let mut ring = open_ring(polygon);
    ring.dedup_by(|a, b| (a.x - b.x).abs() < f64::EPSILON && (a.y - b.y).abs() < f64::EPSILON);
    if ring.len() < 3 {
        return Err(Error::InvalidGeometry(
            "offset needs at least 3 distinct vertices".into(),
        ));
    }
    if polygon_from_ring(ring.clone()).signed_area() < 0.0 {
        ring.reverse();
    }

    let n = ring.len();
    // Outward normal of edge i (ring[i] -> ring[i + 1]) for a CCW ring.
    let normals: Vec<Coordinate> = (0..n)
        .map(|i| {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            let (dx, dy) = (b.x - a.x, b.y - a.y);
            let len = (dx * dx + dy * dy).sqrt();
            Coord {
                x: dy / len,
                y: -dx / len,
            }
        })
        .collect();

    let out: Vec<Coordinate> = (0..n)
        .map(|i| {
            let prev = normals[(i + n - 1) % n];
            let next = normals[i];
            let bisector = Coord {
                x: prev.x + next.x,
                y: prev.y + next.y,
            };
            let cos_half = (bisector.x * next.x + bisector.y * next.y)
                / (bisector.x * bisector.x + bisector.y * bisector.y).sqrt();
            let v = ring[i];
            if !cos_half.is_finite() || cos_half.abs() < 1e-9 {
                return Coord {
                    x: v.x + next.x * distance,
                    y: v.y + next.y * distance,
                };
            }
            let len = (bisector.x * bisector.x + bisector.y * bisector.y).sqrt();
            let scale = distance / cos_half / len;
            Coord {
                x: v.x + bisector.x * scale,
                y: v.y + bisector.y * scale,
            }
        })
        .collect();

    // Shrinking past the inradius flips edges; the ring stays CCW, so compare edge directions.
    let flipped = (0..n).any(|i| {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        let (p, q) = (out[i], out[(i + 1) % n]);
        (b.x - a.x) * (q.x - p.x) + (b.y - a.y) * (q.y - p.y) <= 0.0
    });
    if flipped {
        return Err(Error::InvalidGeometry("offset polygon collapsed".into()));
    }
    Ok(polygon_from_ring(out))
}

// ============================================================================
// Affine transforms (always about an explicit origin)
// ============================================================================

/// Scales a polygon by `factor` about `origin`.
pub fn scale(polygon: &Polygon, factor: f64, origin: Coordinate) -> Polygon {
    polygon.scale_around_point(factor, factor, origin)
}

/// Rotates a polygon counter-clockwise by `angle_deg` about `origin`.
pub fn rotate(polygon: &Polygon, angle_deg: f64, origin: Coordinate) -> Polygon {
    polygon.rotate_around_point(angle_deg, Point::from(origin))
}

/// Translates a polygon by `(dx, dy)`.
pub fn translate(polygon: &Polygon, dx: f64, dy: f64) -> Polygon {
    polygon.translate(dx, dy)
}

/// Scales a coordinate by `factor` about `origin`.
pub fn scale_coord(c: Coordinate, factor: f64, origin: Coordinate) -> Coordinate {
    Coord {
        x: origin.x + (c.x - origin.x) * factor,
        y: origin.y + (c.y - origin.y) * factor,
    }
}

/// Rotates a coordinate counter-clockwise by `angle_deg` about `origin`.
pub fn rotate_coord(c: Coordinate, angle_deg: f64, origin: Coordinate) -> Coordinate {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let dx = c.x - origin.x;
    let dy = c.y - origin.y;
    Coord {
        x: origin.x + dx * cos - dy * sin,
        y: origin.y + dx * sin + dy * cos,
    }
}

// ============================================================================
// Spherical measures
// ============================================================================

/// Great-circle distance in kilometers.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    Haversine::distance(Point::from(a), Point::from(b)) / 1000.0
}

/// Initial great-circle bearing from `a` to `b`, degrees clockwise from north in `[0, 360)`.
pub fn bearing_deg(a: Coordinate, b: Coordinate) -> f64 {
    normalize_bearing(Haversine::bearing(Point::from(a), Point::from(b)))
}

/// Bearing measured in the lon/lat plane, degrees clockwise from north in `[0, 360)`.
pub fn planar_bearing_deg(a: Coordinate, b: Coordinate) -> f64 {
    normalize_bearing((b.x - a.x).atan2(b.y - a.y).to_degrees())
}

/// Projects `origin` by `distance_km` along `bearing_deg`.
pub fn destination(origin: Coordinate, distance_km: f64, bearing_deg: f64) -> Coordinate {
    Haversine::destination(Point::from(origin), bearing_deg, distance_km * 1000.0).0
}

fn normalize_bearing(deg: f64) -> f64 {
    let b = deg.rem_euclid(360.0);
    if b >= 360.0 {
        0.0
    } else {
        b
    }
}
