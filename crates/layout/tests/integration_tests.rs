//! Integration tests for plotmap-layout.

use approx::assert_relative_eq;
use geo::Coord;
use plotmap_core::geom;
use plotmap_layout::{
    default_plot, find_overlaps, infer_width, median_block_length, CellSplitter, Error,
    GridIndex, InMemorySource, LayoutConfig, LayoutPipeline, LayoutResult, LayoutSession,
    LoadCoordinator, ObservationUnit, Polygon, RawObservationUnit, SplitCache, UnitGeometry,
    UnitPage, UnitSource,
};

fn field(width: f64, height: f64) -> Polygon {
    let (x0, y0) = (-76.4515, 42.4640);
    geom::polygon_from_ring(vec![
        Coord { x: x0, y: y0 },
        Coord { x: x0 + width, y: y0 },
        Coord {
            x: x0 + width,
            y: y0 + height,
        },
        Coord { x: x0, y: y0 + height },
    ])
}

fn tilted_field() -> Polygon {
    let straight = field(0.004, 0.0015);
    geom::rotate(&straight, 20.0, geom::center_of_mass(&straight))
}

/// A field shaped like a "U" open to the north.
fn notched_field() -> Polygon {
    let (x0, y0) = (-76.4515, 42.4640);
    geom::polygon_from_ring(vec![
        Coord { x: x0, y: y0 },
        Coord { x: x0 + 0.003, y: y0 },
        Coord { x: x0 + 0.003, y: y0 + 0.002 },
        Coord { x: x0 + 0.002, y: y0 + 0.002 },
        Coord { x: x0 + 0.002, y: y0 + 0.0007 },
        Coord { x: x0 + 0.001, y: y0 + 0.0007 },
        Coord { x: x0 + 0.001, y: y0 + 0.002 },
        Coord { x: x0, y: y0 + 0.002 },
    ])
}

fn unplaced(n: usize) -> Vec<ObservationUnit> {
    (0..n)
        .map(|i| ObservationUnit::new(format!("plot-{}", i)).with_plot_number(i as f64 + 1.0))
        .collect()
}

fn total_area_km2(result: &LayoutResult) -> f64 {
    result.iter().map(|(_, p)| geom::area_km2(p)).sum()
}

mod property_tests {
    use super::*;

    #[test]
    fn test_identity_preservation() {
        let boundary = field(0.004, 0.002);
        for n in [1, 2, 5, 10, 17, 30] {
            let mut pipeline = LayoutPipeline::default();
            let units = unplaced(n);
            let ids: Vec<String> = units.iter().map(|u| u.id.to_string()).collect();
            let result = pipeline.run(units, Some(&boundary)).unwrap();

            assert_eq!(result.len(), n, "n = {}", n);
            assert!(result.warnings.is_empty());
            for id in &ids {
                assert!(result.contains(&id.as_str().into()), "missing {}", id);
            }
        }
    }

    #[test]
    fn test_identity_preservation_with_repeats() {
        let mut units = unplaced(4);
        units.push(ObservationUnit::new("plot-0").with_plot_number(99.0));
        let mut pipeline = LayoutPipeline::default();
        let result = pipeline.run(units, Some(&field(0.004, 0.002))).unwrap();
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_synthetic_layouts_do_not_overlap() {
        let boundaries = [field(0.004, 0.002), tilted_field()];
        for boundary in &boundaries {
            let mut pipeline = LayoutPipeline::default();
            let result = pipeline.run(unplaced(12), Some(boundary)).unwrap();
            assert!(find_overlaps(&result, 1e-9).is_empty());
        }

        // Shared cells are split into non-overlapping parts.
        let units: Vec<ObservationUnit> = (0..6)
            .map(|i| ObservationUnit::new(format!("u{}", i)).with_grid(0, (i % 3) as u32))
            .collect();
        let mut pipeline = LayoutPipeline::default();
        let result = pipeline.run(units, Some(&field(0.003, 0.001))).unwrap();
        assert_eq!(result.len(), 6);
        assert!(find_overlaps(&result, 1e-9).is_empty());
    }

    #[test]
    fn test_synthetic_layouts_cover_boundary() {
        let boundaries = [field(0.004, 0.002), tilted_field()];
        for boundary in &boundaries {
            let mut pipeline = LayoutPipeline::default();
            let result = pipeline.run(unplaced(15), Some(boundary)).unwrap();
            assert_relative_eq!(
                total_area_km2(&result),
                geom::area_km2(boundary),
                max_relative = 0.01
            );
        }
    }

    #[test]
    fn test_concave_boundary_is_covered_without_overlap() {
        let boundary = notched_field();
        let units = vec![
            ObservationUnit::new("north").with_grid(0, 0),
            ObservationUnit::new("south").with_grid(1, 0),
        ];
        let mut pipeline = LayoutPipeline::default();
        let result = pipeline.run(units, Some(&boundary)).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.warnings.is_empty());
        assert!(find_overlaps(&result, 1e-9).is_empty());
        assert_relative_eq!(
            total_area_km2(&result),
            geom::area_km2(&boundary),
            max_relative = 0.01
        );
    }

    #[test]
    fn test_concave_boundary_with_inferred_grid() {
        let boundary = notched_field();
        for n in [3, 8, 14] {
            let mut pipeline = LayoutPipeline::default();
            let result = pipeline.run(unplaced(n), Some(&boundary)).unwrap();
            assert_eq!(result.len() + result.warnings.len(), n, "n = {}", n);
            assert!(find_overlaps(&result, 1e-9).is_empty(), "n = {}", n);
            assert_relative_eq!(
                total_area_km2(&result),
                geom::area_km2(&boundary),
                max_relative = 0.01
            );
        }
    }

    #[test]
    fn test_plot_scale_shrinks_coverage() {
        let boundary = field(0.004, 0.002);
        let config = LayoutConfig::default().with_plot_scale(0.85);
        let mut pipeline = LayoutPipeline::new(config);
        let result = pipeline.run(unplaced(8), Some(&boundary)).unwrap();
        assert_relative_eq!(
            total_area_km2(&result),
            geom::area_km2(&boundary) * 0.85 * 0.85,
            max_relative = 0.01
        );
        assert!(find_overlaps(&result, 1e-9).is_empty());
    }

    #[test]
    fn test_rotation_round_trip() {
        let boundary = tilted_field();
        for angle in [-44.0, -12.5, 0.3, 17.0, 45.0, 90.0] {
            let origin = geom::center_of_mass(&boundary);
            let back = geom::rotate(&geom::rotate(&boundary, angle, origin), -angle, origin);
            for (a, b) in boundary.exterior().coords().zip(back.exterior().coords()) {
                assert_relative_eq!(a.x, b.x, epsilon = 1e-6);
                assert_relative_eq!(a.y, b.y, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_split_determinism() {
        let cell = default_plot(LayoutConfig::default().origin, GridIndex::new(0, 0), 0.01, 0.02);
        let splitter = CellSplitter::default();
        let mut cache = SplitCache::new();

        for p in [2, 3, 6] {
            let first = splitter.split_all(&mut cache, &cell, p).unwrap();
            let second = splitter.split_all(&mut cache, &cell, p).unwrap();
            assert_eq!(first, second);
            for i in 0..p {
                let part = splitter.split(&mut cache, &cell, p, i).unwrap();
                assert_eq!(Some(&part), first[i].as_ref());
            }

            let area: f64 = first.iter().map(|x| geom::planar_area(x.as_ref().unwrap())).sum();
            assert_relative_eq!(area, geom::planar_area(&cell), max_relative = 1e-6);
        }
        assert_eq!(cache.len(), 3);
    }
}

mod scenario_tests {
    use super::*;

    #[test]
    fn test_explicit_grid_without_boundary() {
        // 3 rows x 4 columns numbered in snake order.
        let mut units = Vec::new();
        for row in 0..3u32 {
            for k in 0..4u32 {
                let col = if row % 2 == 0 { k } else { 3 - k };
                let n = row * 4 + k;
                units.push(
                    ObservationUnit::new(format!("plot-{}", n))
                        .with_plot_number(n as f64)
                        .with_grid(row, col),
                );
            }
        }
        let expected: Vec<(String, GridIndex)> = units
            .iter()
            .map(|u| (u.id.to_string(), u.grid.unwrap()))
            .collect();

        let config = LayoutConfig::default();
        let mut pipeline = LayoutPipeline::new(config.clone());
        let result = pipeline.run(units, None).unwrap();

        assert_eq!(result.len(), 12);
        assert!(!result.shaped);
        let size = config.fallback_plot_size_km;
        for ((id, polygon), (expected_id, cell)) in result.iter().zip(&expected) {
            assert_eq!(id.as_str(), expected_id);
            assert_eq!(polygon, &default_plot(config.origin, *cell, size, size));
            assert_eq!(polygon.exterior().0.len(), 5);
        }
        assert!(find_overlaps(&result, 1e-9).is_empty());
    }

    #[test]
    fn test_width_inference_from_blocks() {
        let units: Vec<ObservationUnit> = (0..10)
            .map(|i| {
                ObservationUnit::new(format!("plot-{}", i))
                    .with_plot_number(i as f64)
                    .with_block(if i < 5 { "1" } else { "2" })
            })
            .collect();
        let b = median_block_length(&units);
        assert_eq!(b, 5);
        // s = 3 < b = 5; up = 2 / 1 = 2, down = 1 / 2 = 0.5; down wins: round(2.5) = 3.
        assert_eq!(infer_width(units.len(), b), 3);

        let mut pipeline = LayoutPipeline::default();
        let result = pipeline.run(units, Some(&field(0.003, 0.004))).unwrap();
        assert_eq!(result.len(), 10);
        assert!(find_overlaps(&result, 1e-9).is_empty());

        // Snake order: plot 3 sits under plot 2, plot 5 under plot 0.
        let c = |id: &str| geom::centroid(result.get(&id.into()).unwrap());
        assert_relative_eq!(c("plot-3").x, c("plot-2").x, epsilon = 1e-7);
        assert_relative_eq!(c("plot-5").x, c("plot-0").x, epsilon = 1e-7);
        assert!(c("plot-3").y < c("plot-2").y);
    }

    #[test]
    fn test_shared_cell_split_four_ways() {
        let boundary = field(0.001, 0.001);
        let units: Vec<ObservationUnit> = (0..4)
            .map(|i| {
                ObservationUnit::new(format!("plot-{}", i))
                    .with_plot_number(i as f64)
                    .with_grid(2, 2)
            })
            .collect();
        let mut pipeline = LayoutPipeline::default();
        let result = pipeline.run(units, Some(&boundary)).unwrap();

        assert_eq!(result.len(), 4);
        assert_relative_eq!(
            total_area_km2(&result),
            geom::area_km2(&boundary),
            max_relative = 1e-4
        );
        let plots: Vec<&Polygon> = result.iter().map(|(_, p)| p).collect();
        for a in 0..4 {
            for b in (a + 1)..4 {
                let overlap = geom::intersect(plots[a], plots[b]).map_or(0.0, |p| geom::area_km2(&p));
                assert!(overlap < 1e-9);
            }
        }
    }

    /// Starts a load of another study while serving the second page.
    struct InterruptingSource {
        inner: InMemorySource,
        coordinator: LoadCoordinator,
        interrupted: bool,
    }

    impl UnitSource for InterruptingSource {
        fn fetch_page(
            &mut self,
            study: &str,
            page: usize,
            page_size: usize,
        ) -> plotmap_layout::Result<UnitPage> {
            if page == 1 && !self.interrupted {
                self.interrupted = true;
                let _ = self.coordinator.begin("S2");
            }
            self.inner.fetch_page(study, page, page_size)
        }
    }

    fn raw_units(n: u32) -> Vec<RawObservationUnit> {
        (0..n)
            .map(|i| RawObservationUnit {
                id: format!("plot-{}", i),
                plot_number: Some(i.to_string()),
                row: Some(i / 3),
                col: Some(i % 3),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_superseded_load_is_discarded() {
        let session = LayoutSession::new(LayoutConfig::default().with_page_size(2));
        let mut s1 = InterruptingSource {
            inner: InMemorySource::new(raw_units(6)),
            coordinator: session.coordinator().clone(),
            interrupted: false,
        };

        let err = session.load_and_layout("S1", &mut s1, None).unwrap_err();
        assert!(err.is_cancellation());
        assert!(matches!(err, Error::Superseded { ref study, .. } if study == "S1"));
        assert!(session.coordinator().committed().is_none());

        let mut s2 = InMemorySource::new(raw_units(4));
        let result = session.load_and_layout("S2", &mut s2, None).unwrap();
        assert_eq!(result.len(), 4);
        let (study, committed) = session.coordinator().committed().unwrap();
        assert_eq!(study, "S2");
        assert_eq!(committed.len(), 4);
    }

    #[test]
    fn test_stale_commit_is_refused() {
        let coordinator = LoadCoordinator::new();
        let s1 = coordinator.begin("S1");
        let s2 = coordinator.begin("S2");
        coordinator.commit(&s2, LayoutResult::new(false)).unwrap();
        assert!(coordinator.commit(&s1, LayoutResult::new(true)).unwrap_err().is_cancellation());
        let (study, result) = coordinator.committed().unwrap();
        assert_eq!(study, "S2");
        assert!(!result.shaped);
    }
}

mod existing_geometry_tests {
    use super::*;

    #[test]
    fn test_point_positions_become_plots() {
        let units: Vec<ObservationUnit> = (0..12)
            .map(|i| {
                let c = Coord {
                    x: -76.4515 + (i % 4) as f64 * 0.0001,
                    y: 42.4640 + (i / 4) as f64 * 0.0002,
                };
                ObservationUnit::new(format!("plot-{}", i))
                    .with_plot_number(i as f64)
                    .with_geometry(UnitGeometry::Point(c))
            })
            .collect();
        let mut pipeline = LayoutPipeline::default();
        let result = pipeline.run(units, None).unwrap();
        assert!(result.shaped);
        assert_eq!(result.len(), 12);
        assert_eq!(result.level_angle_deg, 0.0);
        assert!(find_overlaps(&result, 1e-9).is_empty());
    }

    #[test]
    fn test_shared_point_is_split() {
        let a = Coord { x: -76.4515, y: 42.4640 };
        let b = Coord { x: -76.4513, y: 42.4640 };
        let c = Coord { x: -76.4514, y: 42.4642 };
        let units = vec![
            ObservationUnit::new("a1").with_plot_number(1.0).with_geometry(UnitGeometry::Point(a)),
            ObservationUnit::new("a2").with_plot_number(2.0).with_geometry(UnitGeometry::Point(a)),
            ObservationUnit::new("b").with_plot_number(3.0).with_geometry(UnitGeometry::Point(b)),
            ObservationUnit::new("c").with_plot_number(4.0).with_geometry(UnitGeometry::Point(c)),
        ];
        let mut pipeline = LayoutPipeline::default();
        let result = pipeline.run(units, None).unwrap();
        assert_eq!(result.len(), 4);
        assert!(find_overlaps(&result, 1e-9).is_empty());
    }

    #[test]
    fn test_untessellable_point_is_skipped_with_siblings_kept() {
        let a = field(0.001, 0.001);
        let b = geom::translate(&a, 0.002, 0.0);
        let units = vec![
            ObservationUnit::new("a")
                .with_plot_number(1.0)
                .with_geometry(UnitGeometry::Polygon(a.clone())),
            ObservationUnit::new("b")
                .with_plot_number(2.0)
                .with_geometry(UnitGeometry::Polygon(b.clone())),
            ObservationUnit::new("c")
                .with_plot_number(3.0)
                .with_geometry(UnitGeometry::Point(Coord { x: -76.4490, y: 42.4650 })),
        ];
        let mut pipeline = LayoutPipeline::default();
        let result = pipeline.run(units, None).unwrap();

        let ids: Vec<&str> = result.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(result.get(&"a".into()), Some(&a));
        assert_eq!(result.get(&"b".into()), Some(&b));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].unit.as_str(), "c");
        assert!(!result.warnings[0].message.is_empty());
    }

    #[test]
    fn test_sole_untessellable_point_fails_the_run() {
        let units = vec![ObservationUnit::new("c")
            .with_geometry(UnitGeometry::Point(Coord { x: -76.4490, y: 42.4650 }))];
        let err = LayoutPipeline::default().run(units, None).unwrap_err();
        assert!(matches!(err, Error::DegenerateInference(_)));
    }

    #[test]
    fn test_raw_records_are_classified() {
        let raw = vec![
            RawObservationUnit {
                id: "lonlat".into(),
                x: Some("-76.4515".into()),
                x_type: Some("LONGITUDE".into()),
                y: Some("42.4640".into()),
                y_type: Some("LATITUDE".into()),
                ..Default::default()
            },
            RawObservationUnit {
                id: "lonlat2".into(),
                x: Some("-76.4512".into()),
                x_type: Some("LONGITUDE".into()),
                y: Some("42.4643".into()),
                y_type: Some("LATITUDE".into()),
                ..Default::default()
            },
        ];
        let units: Vec<ObservationUnit> = raw.iter().map(ObservationUnit::from_raw).collect();
        assert!(units.iter().all(|u| matches!(u.geometry, Some(UnitGeometry::Point(_)))));
        let result = LayoutPipeline::default().run(units, None).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.shaped);
    }
}
