//! Layout pipeline.
//!
//! Runs one batch of observation units through classification, optional
//! leveling and grid inference, tessellation and reconciliation of shared
//! cells:
//!
//! ```text
//! Idle → Loading → Classifying → (Leveling) → (Inferring) → Tessellating → Reconciling → Done
//! ```
//!
//! `Superseded` is terminal and can be entered from any state when a newer
//! load replaces the one feeding this pipeline. A run that returns an error
//! ends in `Failed`.

use crate::grid::{assign_grid, infer_width, median_block_length};
use crate::orientation::{level, Leveling};
use crate::split::CellSplitter;
use crate::tessellate::{tessellate_grid, tessellate_points};
use plotmap_core::geom::{self, Coordinate, Polygon};
use plotmap_core::{
    Error, GridIndex, LayoutConfig, LayoutResult, ObservationUnit, Result, SplitCache, SplitKey,
    UnitGeometry,
};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutState {
    Idle,
    Loading,
    Classifying,
    Leveling,
    Inferring,
    Tessellating,
    Reconciling,
    Done,
    Superseded,
    Failed,
}

impl LayoutState {
    /// Returns true for states a run never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Superseded | Self::Failed)
    }
}

impl fmt::Display for LayoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Classifying => "classifying",
            Self::Leveling => "leveling",
            Self::Inferring => "inferring",
            Self::Tessellating => "tessellating",
            Self::Reconciling => "reconciling",
            Self::Done => "done",
            Self::Superseded => "superseded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which position source a unit is laid out from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Explicit polygon geometry.
    Polygon,
    /// Explicit point geometry (geo-shape or lon/lat).
    Point,
    /// Grid row/column only.
    Grid,
    /// Nothing usable; the position must be inferred.
    Unplaced,
}

impl Classification {
    /// Classifies a unit, preferring geometry over grid indices.
    pub fn of(unit: &ObservationUnit) -> Self {
        match (&unit.geometry, unit.grid) {
            (Some(UnitGeometry::Polygon(_)), _) => Self::Polygon,
            (Some(UnitGeometry::Point(_)), _) => Self::Point,
            (None, Some(_)) => Self::Grid,
            (None, None) => Self::Unplaced,
        }
    }

    /// Returns true if the unit carries real geometry.
    pub fn has_geometry(self) -> bool {
        matches!(self, Self::Polygon | Self::Point)
    }
}

/// Keeps plot-level units, drops repeated identities (first wins), and
/// stable-sorts by plot number with unnumbered units last.
pub fn prepare(units: Vec<ObservationUnit>) -> Vec<ObservationUnit> {
    let mut seen = HashSet::new();
    let mut kept: Vec<ObservationUnit> = units
        .into_iter()
        .filter(ObservationUnit::is_plot)
        .filter(|u| {
            let fresh = seen.insert(u.id.clone());
            if !fresh {
                log::warn!("Dropping repeated unit '{}'", u.id);
            }
            fresh
        })
        .collect();

    kept.sort_by(|a, b| match (a.plot_number, b.plot_number) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    kept
}

/// Identity of a shared position in existing-geometry mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PositionKey {
    Point(u64, u64),
    Polygon(SplitKey),
}

impl PositionKey {
    fn of(geometry: &UnitGeometry) -> Self {
        match geometry {
            UnitGeometry::Point(c) => Self::Point(c.x.to_bits(), c.y.to_bits()),
            UnitGeometry::Polygon(p) => Self::Polygon(SplitKey::new(p, 0)),
        }
    }
}

/// A cell and the units (indices in plot order) that occupy it.
///
/// `cell` holds the reason when no polygon could be built for the position.
struct Occupancy {
    cell: std::result::Result<Polygon, String>,
    members: Vec<usize>,
}

/// Plot layout pipeline.
#[derive(Debug)]
pub struct LayoutPipeline {
    config: LayoutConfig,
    splitter: CellSplitter,
    state: LayoutState,
    history: Vec<LayoutState>,
}

impl LayoutPipeline {
    /// Creates an idle pipeline.
    pub fn new(config: LayoutConfig) -> Self {
        let splitter = CellSplitter::from_config(&config);
        Self {
            config,
            splitter,
            state: LayoutState::Idle,
            history: vec![LayoutState::Idle],
        }
    }

    /// Creates a pipeline with default configuration.
    pub fn default_config() -> Self {
        Self::new(LayoutConfig::default())
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Current stage.
    pub fn state(&self) -> LayoutState {
        self.state
    }

    /// Every stage entered since the run started, in order.
    pub fn history(&self) -> &[LayoutState] {
        &self.history
    }

    /// Marks the pipeline as waiting for units.
    pub fn begin_loading(&mut self) {
        self.reset();
        self.enter(LayoutState::Loading);
    }

    /// Marks the run as replaced by a newer one.
    pub fn supersede(&mut self) {
        self.enter(LayoutState::Superseded);
    }

    fn reset(&mut self) {
        self.state = LayoutState::Idle;
        self.history.clear();
        self.history.push(LayoutState::Idle);
    }

    fn enter(&mut self, next: LayoutState) {
        log::debug!("Layout state: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Lays out `units`, inside `boundary` when one is given.
    ///
    /// Units that all carry geometry are laid out from it directly (no
    /// boundary needed). Otherwise plots come from grid indices, inferring
    /// them when any unit lacks one; inference needs a boundary.
    pub fn run(
        &mut self,
        units: Vec<ObservationUnit>,
        boundary: Option<&Polygon>,
    ) -> Result<LayoutResult> {
        if self.state != LayoutState::Loading {
            self.reset();
        }
        match self.execute(units, boundary) {
            Ok(result) => Ok(result),
            Err(e) => {
                log::warn!("Layout failed in the {} stage: {}", self.state, e);
                self.enter(LayoutState::Failed);
                Err(e)
            }
        }
    }

    fn execute(
        &mut self,
        units: Vec<ObservationUnit>,
        boundary: Option<&Polygon>,
    ) -> Result<LayoutResult> {
        self.config.validate()?;

        self.enter(LayoutState::Classifying);
        let units = prepare(units);
        if units.is_empty() {
            log::info!("No plot-level units to lay out");
            self.enter(LayoutState::Done);
            return Ok(LayoutResult::new(false));
        }

        let classes: Vec<Classification> = units.iter().map(Classification::of).collect();
        let result = if classes.iter().all(|c| c.has_geometry()) {
            self.layout_existing(&units)?
        } else {
            self.layout_synthetic(units, boundary)?
        };

        self.enter(LayoutState::Done);
        log::info!(
            "Laid out {} plots ({} skipped, shaped: {}, leveled by {:.2}°)",
            result.len(),
            result.warnings.len(),
            result.shaped,
            result.level_angle_deg
        );
        Ok(result)
    }

    fn layout_existing(&mut self, units: &[ObservationUnit]) -> Result<LayoutResult> {
        self.enter(LayoutState::Tessellating);

        let mut points: Vec<Coordinate> = Vec::new();
        let mut point_slot: HashMap<usize, usize> = HashMap::new();
        for (i, unit) in units.iter().enumerate() {
            if let Some(UnitGeometry::Point(c)) = &unit.geometry {
                point_slot.insert(i, points.len());
                points.push(*c);
            }
        }
        let mut point_failure = None;
        let point_cells = if points.is_empty() {
            Vec::new()
        } else {
            match tessellate_points(&points, &self.config) {
                Ok(cells) => cells,
                Err(Error::DegenerateInference(msg)) => {
                    log::warn!("Point positions cannot be tessellated: {}", msg);
                    point_failure = Some(msg);
                    vec![None; points.len()]
                }
                Err(e) => return Err(e),
            }
        };

        let mut occupancy: Vec<Occupancy> = Vec::new();
        let mut by_key: HashMap<PositionKey, usize> = HashMap::new();
        for (i, unit) in units.iter().enumerate() {
            let geometry = unit
                .geometry
                .as_ref()
                .ok_or_else(|| Error::Internal(format!("unit '{}' lost its geometry", unit.id)))?;
            let slot = *by_key.entry(PositionKey::of(geometry)).or_insert_with(|| {
                let cell = match geometry {
                    UnitGeometry::Polygon(p) => Ok(p.clone()),
                    UnitGeometry::Point(_) => point_slot
                        .get(&i)
                        .and_then(|&k| point_cells.get(k).cloned().flatten())
                        .ok_or_else(|| {
                            point_failure
                                .clone()
                                .unwrap_or_else(|| "no cell for this position".into())
                        }),
                };
                occupancy.push(Occupancy {
                    cell,
                    members: Vec::new(),
                });
                occupancy.len() - 1
            });
            occupancy[slot].members.push(i);
        }

        self.enter(LayoutState::Reconciling);
        let plots = self.reconcile(occupancy, units.len());
        let mut result = LayoutResult::new(true);
        assemble(&mut result, units, plots)?;
        Ok(result)
    }

    fn layout_synthetic(
        &mut self,
        mut units: Vec<ObservationUnit>,
        boundary: Option<&Polygon>,
    ) -> Result<LayoutResult> {
        let needs_inference = units.iter().any(|u| u.grid.is_none());

        let leveling = match boundary {
            Some(b) if needs_inference => {
                self.enter(LayoutState::Leveling);
                Some(level(b, &self.config)?)
            }
            Some(b) => Some(Leveling::identity(b)),
            None if needs_inference => return Err(Error::MissingBoundary),
            None => None,
        };

        if needs_inference {
            self.enter(LayoutState::Inferring);
            let width = infer_width(units.len(), median_block_length(&units));
            assign_grid(&mut units, width);
        }

        self.enter(LayoutState::Tessellating);
        let mut cells: Vec<GridIndex> = Vec::new();
        let mut members: Vec<Vec<usize>> = Vec::new();
        let mut by_cell: HashMap<GridIndex, usize> = HashMap::new();
        for (i, unit) in units.iter().enumerate() {
            let g = unit
                .grid
                .ok_or_else(|| Error::Internal(format!("unit '{}' has no grid cell", unit.id)))?;
            let slot = *by_cell.entry(g).or_insert_with(|| {
                cells.push(g);
                members.push(Vec::new());
                cells.len() - 1
            });
            members[slot].push(i);
        }
        let shared = members.iter().filter(|m| m.len() > 1).count();
        if shared > 0 {
            log::debug!("{} grid cells are shared by several units", shared);
        }

        let polygons = tessellate_grid(&cells, leveling.as_ref().map(|l| &l.leveled), &self.config)?;

        self.enter(LayoutState::Reconciling);
        let occupancy = polygons
            .into_iter()
            .zip(members)
            .map(|(cell, members)| Occupancy {
                cell: cell.ok_or_else(|| "grid cell does not intersect the boundary".to_string()),
                members,
            })
            .collect();
        let plots = self.reconcile(occupancy, units.len());

        let mut result = LayoutResult::new(false);
        result.level_angle_deg = leveling.as_ref().map_or(0.0, |l| l.angle_deg);
        assemble(&mut result, &units, plots)?;

        let plot_scale = self.config.plot_scale;
        Ok(result.map_polygons(|plot| {
            let plot = match &leveling {
                Some(l) => l.undo(plot),
                None => plot.clone(),
            };
            if plot_scale == 1.0 {
                plot
            } else {
                geom::scale(&plot, plot_scale, geom::center_of_mass(&plot))
            }
        }))
    }

    /// Splits every shared cell among its occupants, in plot order.
    fn reconcile(&self, occupancy: Vec<Occupancy>, n: usize) -> Vec<Result<Polygon>> {
        let mut cache = SplitCache::new();
        let mut plots: Vec<Result<Polygon>> =
            vec![Err(Error::Internal("unit was not reconciled".into())); n];

        for Occupancy { cell, members } in occupancy {
            let p = members.len();
            for (k, idx) in members.into_iter().enumerate() {
                plots[idx] = match &cell {
                    Ok(cell) => self.splitter.split(&mut cache, cell, p, k),
                    Err(reason) => Err(Error::PartitionGeometry(reason.clone())),
                };
            }
        }

        let (hits, misses) = cache.stats();
        if misses > 0 {
            log::debug!("Split cache: {} splits, {} reuses", misses, hits);
        }
        plots
    }
}

impl Default for LayoutPipeline {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Records plots in unit order, skipping units whose geometry failed.
///
/// A failure is fatal only when it hits the sole unit of the run.
fn assemble(
    result: &mut LayoutResult,
    units: &[ObservationUnit],
    plots: Vec<Result<Polygon>>,
) -> Result<()> {
    let sole = units.len() == 1;
    for (unit, plot) in units.iter().zip(plots) {
        match plot {
            Ok(polygon) => {
                result.insert(unit.id.clone(), polygon);
            }
            Err(Error::PartitionGeometry(msg) | Error::InvalidGeometry(msg)) => {
                if sole {
                    return Err(Error::DegenerateInference(msg));
                }
                log::warn!("Skipping unit '{}': {}", unit.id, msg);
                result.warn(unit.id.clone(), msg);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::Coord;

    fn boundary() -> Polygon {
        let (x0, y0) = (-76.4515, 42.4640);
        geom::polygon_from_ring(vec![
            Coord { x: x0, y: y0 },
            Coord { x: x0 + 0.002, y: y0 },
            Coord {
                x: x0 + 0.002,
                y: y0 + 0.001,
            },
            Coord { x: x0, y: y0 + 0.001 },
        ])
    }

    #[test]
    fn test_prepare_dedupes_and_sorts() {
        let units = vec![
            ObservationUnit::new("c"),
            ObservationUnit::new("b").with_plot_number(2.0),
            ObservationUnit::new("a").with_plot_number(1.0),
            ObservationUnit::new("b").with_plot_number(0.0),
            ObservationUnit::new("p").with_level(plotmap_core::ObservationLevel::Plant),
        ];
        let ids: Vec<String> = prepare(units)
            .iter()
            .map(|u| u.id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_classification() {
        let polygon = ObservationUnit::new("a").with_geometry(UnitGeometry::Polygon(boundary()));
        let point = ObservationUnit::new("b")
            .with_geometry(UnitGeometry::Point(Coord { x: 0.0, y: 0.0 }))
            .with_grid(1, 1);
        let grid = ObservationUnit::new("c").with_grid(0, 0);
        assert_eq!(Classification::of(&polygon), Classification::Polygon);
        assert_eq!(Classification::of(&point), Classification::Point);
        assert_eq!(Classification::of(&grid), Classification::Grid);
        assert_eq!(Classification::of(&ObservationUnit::new("d")), Classification::Unplaced);
    }

    #[test]
    fn test_missing_boundary() {
        let mut pipeline = LayoutPipeline::default();
        let units = vec![ObservationUnit::new("a"), ObservationUnit::new("b")];
        let err = pipeline.run(units, None).unwrap_err();
        assert_eq!(err, Error::MissingBoundary);
        assert!(err.is_configuration());
        assert_eq!(pipeline.state(), LayoutState::Failed);
        assert!(pipeline.state().is_terminal());
        assert_eq!(
            pipeline.history(),
            &[LayoutState::Idle, LayoutState::Classifying, LayoutState::Failed]
        );
    }

    #[test]
    fn test_inferred_layout_history() {
        let mut pipeline = LayoutPipeline::default();
        let units: Vec<ObservationUnit> = (0..6)
            .map(|i| ObservationUnit::new(format!("u{}", i)).with_plot_number(i as f64))
            .collect();
        let result = pipeline.run(units, Some(&boundary())).unwrap();
        assert_eq!(result.len(), 6);
        assert!(!result.shaped);
        assert_eq!(
            pipeline.history(),
            &[
                LayoutState::Idle,
                LayoutState::Classifying,
                LayoutState::Leveling,
                LayoutState::Inferring,
                LayoutState::Tessellating,
                LayoutState::Reconciling,
                LayoutState::Done,
            ]
        );
        assert!(pipeline.state().is_terminal());
    }

    #[test]
    fn test_shared_cell_is_split() {
        let mut pipeline = LayoutPipeline::default();
        let units = vec![
            ObservationUnit::new("a").with_grid(0, 0).with_plot_number(1.0),
            ObservationUnit::new("b").with_grid(0, 0).with_plot_number(2.0),
            ObservationUnit::new("c").with_grid(0, 1).with_plot_number(3.0),
        ];
        let result = pipeline.run(units, Some(&boundary())).unwrap();
        assert_eq!(result.len(), 3);
        let a = geom::planar_area(result.get(&"a".into()).unwrap());
        let b = geom::planar_area(result.get(&"b".into()).unwrap());
        let c = geom::planar_area(result.get(&"c".into()).unwrap());
        assert_relative_eq!(a + b, c, max_relative = 1e-6);
        assert_relative_eq!(a + b + c, geom::planar_area(&boundary()), max_relative = 1e-6);
    }

    #[test]
    fn test_existing_polygons_pass_through() {
        let mut pipeline = LayoutPipeline::default();
        let other = geom::translate(&boundary(), 0.01, 0.0);
        let units = vec![
            ObservationUnit::new("a").with_geometry(UnitGeometry::Polygon(boundary())),
            ObservationUnit::new("b").with_geometry(UnitGeometry::Polygon(other.clone())),
        ];
        let result = pipeline.run(units, None).unwrap();
        assert!(result.shaped);
        assert_eq!(result.get(&"a".into()), Some(&boundary()));
        assert_eq!(result.get(&"b".into()), Some(&other));
    }

    #[test]
    fn test_sole_point_unit_is_degenerate() {
        let mut pipeline = LayoutPipeline::default();
        let units = vec![ObservationUnit::new("a")
            .with_geometry(UnitGeometry::Point(Coord { x: -76.45, y: 42.46 }))];
        let err = pipeline.run(units, None).unwrap_err();
        assert!(matches!(err, Error::DegenerateInference(_)));
        assert_eq!(pipeline.state(), LayoutState::Failed);
    }

    #[test]
    fn test_lone_point_among_polygons_is_skipped() {
        let mut pipeline = LayoutPipeline::default();
        let other = geom::translate(&boundary(), 0.01, 0.0);
        let units = vec![
            ObservationUnit::new("a")
                .with_plot_number(1.0)
                .with_geometry(UnitGeometry::Polygon(boundary())),
            ObservationUnit::new("b")
                .with_plot_number(2.0)
                .with_geometry(UnitGeometry::Polygon(other.clone())),
            ObservationUnit::new("c")
                .with_plot_number(3.0)
                .with_geometry(UnitGeometry::Point(Coord { x: -76.45, y: 42.46 })),
        ];
        let result = pipeline.run(units, None).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get(&"a".into()), Some(&boundary()));
        assert_eq!(result.get(&"b".into()), Some(&other));
        assert!(!result.contains(&"c".into()));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].unit.as_str(), "c");
        assert_eq!(pipeline.state(), LayoutState::Done);
    }

    #[test]
    fn test_repeated_single_point_is_skipped() {
        let p = Coord { x: -76.45, y: 42.46 };
        let units = vec![
            ObservationUnit::new("a").with_geometry(UnitGeometry::Point(p)),
            ObservationUnit::new("b").with_geometry(UnitGeometry::Point(p)),
        ];
        let result = LayoutPipeline::default().run(units, None).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_empty_run() {
        let mut pipeline = LayoutPipeline::default();
        let result = pipeline.run(Vec::new(), None).unwrap();
        assert!(result.is_empty());
        assert_eq!(pipeline.state(), LayoutState::Done);
    }
}
