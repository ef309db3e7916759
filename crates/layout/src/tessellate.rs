//! Plot tessellation.
//!
//! Two modes turn unit positions into plot polygons:
//!
//! - **Existing geometry**: point positions become Voronoi cells cropped to a
//!   slightly grown convex hull of the points ([`tessellate_points`]).
//! - **Synthetic grid**: grid indices become default rectangles, either used
//!   directly or as Voronoi seeds inside a boundary ([`tessellate_grid`]).
//!
//! [`subdivide`] is the manual variant: split a drawn area into a fixed
//! number of rows and columns.

use crate::grid::GridShape;
use geo::Coord;
use plotmap_core::geom::{self, Coordinate, Polygon, Rect};
use plotmap_core::{Error, GridIndex, LayoutConfig, Result};

/// Rectangle for grid cell `cell`, measured from `origin` (its north-west corner).
///
/// Each corner coordinate is projected from the origin along a single axis:
/// longitudes `col × width` and `(col + 1) × width` km east, latitudes
/// `row × length` and `(row + 1) × length` km south. Neighbouring cells
/// therefore share bit-identical edge coordinates.
pub fn default_plot(origin: Coordinate, cell: GridIndex, width_km: f64, length_km: f64) -> Polygon {
    let (row, col) = (cell.row as f64, cell.col as f64);
    let west = geom::destination(origin, col * width_km, 90.0).x;
    let east = geom::destination(origin, (col + 1.0) * width_km, 90.0).x;
    let north = geom::destination(origin, row * length_km, 180.0).y;
    let south = geom::destination(origin, (row + 1.0) * length_km, 180.0).y;

    geom::polygon_from_ring(vec![
        Coord { x: west, y: north },
        Coord { x: east, y: north },
        Coord { x: east, y: south },
        Coord { x: west, y: south },
    ])
}

/// Voronoi plots for point positions.
///
/// The points are rescaled by `point_scale` about their mean, cropped to
/// their convex hull grown by half the mean plot spacing (`√(hull_area/n)/2`),
/// partitioned, and scaled back. Returns one entry per input point; repeated
/// points after the first get `None`.
///
/// Collinear points are cropped to their bounding box padded by half the
/// point spacing. Fewer than two distinct points is a
/// [`Error::DegenerateInference`].
pub fn tessellate_points(points: &[Coordinate], config: &LayoutConfig) -> Result<Vec<Option<Polygon>>> {
    let mut distinct: Vec<Coordinate> = Vec::new();
    for &p in points {
        if !distinct.contains(&p) {
            distinct.push(p);
        }
    }
    if distinct.len() < 2 {
        return Err(Error::DegenerateInference(format!(
            "{} distinct point position(s) cannot be partitioned",
            distinct.len()
        )));
    }

    let center = geom::mean(&distinct)
        .ok_or_else(|| Error::Internal("no points after dedup".into()))?;
    let scale = config.point_scale;
    let scaled: Vec<Coordinate> = points
        .iter()
        .map(|&p| geom::scale_coord(p, scale, center))
        .collect();
    let scaled_distinct: Vec<Coordinate> = distinct
        .iter()
        .map(|&p| geom::scale_coord(p, scale, center))
        .collect();

    let crop = crop_region(&scaled_distinct)?;
    let bbox = geom::polygon_bbox(&crop)
        .ok_or_else(|| Error::PartitionGeometry("empty crop region".into()))?;
    log::debug!(
        "Tessellating {} points ({} distinct)",
        points.len(),
        distinct.len()
    );

    let inverse = 1.0 / scale;
    Ok(geom::voronoi(&scaled, &bbox)
        .into_iter()
        .map(|cell| {
            let plot = geom::intersect(&cell?, &crop)?;
            Some(geom::scale(&plot, inverse, center))
        })
        .collect())
}

/// Convex hull grown by half the mean spacing, or a padded bbox for collinear points.
fn crop_region(points: &[Coordinate]) -> Result<Polygon> {
    let n = points.len() as f64;
    let hull = geom::convex_hull(points);
    let hull_area = geom::planar_area(&hull);

    let bbox = geom::bounding_box(points.iter().copied())
        .ok_or_else(|| Error::PartitionGeometry("no points to crop".into()))?;
    let extent = bbox.width().max(bbox.height());

    if hull_area > extent * extent * 1e-9 {
        let margin = (hull_area / n).sqrt() / 2.0;
        return geom::offset_convex(&hull, margin);
    }

    log::warn!("Point positions are collinear; cropping to their padded bounding box");
    let margin = extent / (n - 1.0) / 2.0;
    let padded = Rect::new(
        Coord {
            x: bbox.min().x - margin,
            y: bbox.min().y - margin,
        },
        Coord {
            x: bbox.max().x + margin,
            y: bbox.max().y + margin,
        },
    );
    Ok(padded.to_polygon())
}

/// Plots for grid cells.
///
/// With a `boundary` (already leveled), the cell rectangles are laid over its
/// bounding box, sized from the configured plot size or else the box divided
/// by the grid shape; their centers seed a Voronoi diagram over the box,
/// intersected with the boundary. Without a boundary, the rectangles
/// themselves are the plots, anchored at `config.origin` with the configured
/// or fallback plot size.
///
/// Returns one entry per input cell. Cells are measured relative to the
/// top-left occupied cell; repeated cells after the first get `None`.
pub fn tessellate_grid(
    cells: &[GridIndex],
    boundary: Option<&Polygon>,
    config: &LayoutConfig,
) -> Result<Vec<Option<Polygon>>> {
    let shape = GridShape::of(cells.iter().copied());

    let Some(boundary) = boundary else {
        let (w, l) = (config.plot_width_or_fallback(), config.plot_length_or_fallback());
        log::debug!(
            "Laying out {}x{} default plots of {:.4}x{:.4} km",
            shape.rows,
            shape.cols,
            w,
            l
        );
        let mut seen = Vec::with_capacity(cells.len());
        return Ok(cells
            .iter()
            .map(|&g| {
                if seen.contains(&g) {
                    return None;
                }
                seen.push(g);
                Some(default_plot(config.origin, shape.relative(g), w, l))
            })
            .collect());
    };

    geom::validate_polygon(boundary)?;
    let bbox = geom::polygon_bbox(boundary)
        .ok_or_else(|| Error::InvalidGeometry("boundary has no extent".into()))?;
    let top_left = Coord {
        x: bbox.min().x,
        y: bbox.max().y,
    };

    let (w, l) = match config.plot_width_km {
        Some(_) => (config.plot_width_or_fallback(), config.plot_length_or_fallback()),
        None => {
            let top_right = Coord {
                x: bbox.max().x,
                y: bbox.max().y,
            };
            let bottom_left = Coord {
                x: bbox.min().x,
                y: bbox.min().y,
            };
            (
                geom::distance_km(top_left, top_right) / shape.cols as f64,
                geom::distance_km(top_left, bottom_left) / shape.rows as f64,
            )
        }
    };
    log::debug!(
        "Tessellating {}x{} grid inside boundary with {:.4}x{:.4} km cells",
        shape.rows,
        shape.cols,
        w,
        l
    );

    let centers: Vec<Coordinate> = cells
        .iter()
        .map(|&g| geom::centroid(&default_plot(top_left, shape.relative(g), w, l)))
        .collect();

    Ok(clip_cells(geom::voronoi(&centers, &bbox), boundary))
}

/// Clips Voronoi cells to `boundary`, keeping one polygon per cell.
///
/// On a concave boundary a cell can fall apart into several pieces; the
/// detached ones are merged into a neighbouring plot so no area is lost.
fn clip_cells(cells: Vec<Option<Polygon>>, boundary: &Polygon) -> Vec<Option<Polygon>> {
    let pieces = cells
        .into_iter()
        .map(|cell| cell.map_or_else(Vec::new, |c| geom::intersect_pieces(&c, boundary)))
        .collect();
    geom::merge_detached(pieces)
}

/// Splits `boundary` into `rows × cols` plots, each scaled by `plot_scale` about its center.
///
/// Cell centers sit on a regular lattice over the boundary's bounding box,
/// row-major from the south-west corner. Entries whose cell misses the
/// boundary are `None`.
pub fn subdivide(
    boundary: &Polygon,
    rows: usize,
    cols: usize,
    plot_scale: f64,
) -> Result<Vec<Option<Polygon>>> {
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidInput(format!(
            "cannot subdivide into {} rows and {} columns",
            rows, cols
        )));
    }
    if !(plot_scale.is_finite() && plot_scale > 0.0) {
        return Err(Error::InvalidInput(format!(
            "plot scale must be positive, got {}",
            plot_scale
        )));
    }
    geom::validate_polygon(boundary)?;
    let bbox = geom::polygon_bbox(boundary)
        .ok_or_else(|| Error::InvalidGeometry("boundary has no extent".into()))?;

    let dx = bbox.width() / cols as f64;
    let dy = bbox.height() / rows as f64;
    let mut centers = Vec::with_capacity(rows * cols);
    for i in 0..rows {
        for j in 0..cols {
            centers.push(Coord {
                x: bbox.min().x + dx / 2.0 + j as f64 * dx,
                y: bbox.min().y + dy / 2.0 + i as f64 * dy,
            });
        }
    }

    Ok(clip_cells(geom::voronoi(&centers, &bbox), boundary)
        .into_iter()
        .map(|plot| {
            let plot = plot?;
            if plot_scale == 1.0 {
                Some(plot)
            } else {
                let c = geom::center_of_mass(&plot);
                Some(geom::scale(&plot, plot_scale, c))
            }
        })
        .collect())
}
