//! Grid shape inference.
//!
//! When units carry no row/column data, the row width is guessed from the
//! total plot count and the typical block length, and units are laid out in
//! snake (boustrophedon) order so consecutive plot numbers stay adjacent.

use plotmap_core::{GridIndex, ObservationUnit};
use std::collections::HashMap;

/// Infers the row width for `n` plots given the median block length.
///
/// Starts from the square side `s = round(√n)` and snaps it toward the block
/// length `b`:
/// - `s == b`: `s`
/// - `s > b`: the nearest multiple of `b`
/// - `s < b`: `s` moved up by `(b mod s) / ⌊b/s⌋` or down by
///   `(s − b mod s) / ⌈b/s⌉`, whichever is smaller (ties go up), rounded
///
/// A zero block length means "no block information" and yields `s`. The
/// result is always at least 1.
pub fn infer_width(n: usize, block_len: usize) -> usize {
    if n == 0 {
        return 1;
    }
    let s = ((n as f64).sqrt().round() as usize).max(1);
    let b = block_len;

    let width = if b == 0 || s == b {
        s
    } else if s > b {
        ((s as f64 / b as f64).round() as usize) * b
    } else {
        let rem = (b % s) as f64;
        let closest_up = rem / (b / s) as f64;
        let closest_down = (s as f64 - rem) / b.div_ceil(s) as f64;
        let w = if closest_up <= closest_down {
            s as f64 + closest_up
        } else {
            s as f64 - closest_down
        };
        w.round() as usize
    };

    log::debug!(
        "Inferred grid width {} for {} plots (square side {}, block length {})",
        width,
        n,
        s,
        b
    );
    width.max(1)
}

/// Median number of units per block, in encounter order.
///
/// Units are grouped by block label; when no unit has a block, replicate
/// labels are used instead. Returns 0 when neither is present. Even counts
/// take the rounded mean of the two middle values.
pub fn median_block_length(units: &[ObservationUnit]) -> usize {
    let by_block = group_sizes(units, |u| u.group.block.as_deref());
    let sizes = if by_block.is_empty() {
        group_sizes(units, |u| u.group.replicate.as_deref())
    } else {
        by_block
    };
    median(sizes)
}

fn group_sizes<'a, F>(units: &'a [ObservationUnit], key: F) -> Vec<usize>
where
    F: Fn(&'a ObservationUnit) -> Option<&'a str>,
{
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for unit in units {
        if let Some(k) = key(unit) {
            let count = counts.entry(k).or_insert(0);
            if *count == 0 {
                order.push(k);
            }
            *count += 1;
        }
    }
    order.into_iter().map(|k| counts[k]).collect()
}

fn median(mut values: Vec<usize>) -> usize {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        ((values[mid - 1] + values[mid]) as f64 / 2.0).round() as usize
    }
}

/// Snake position of the `index`-th plot in rows of `width`.
pub fn snake_index(index: usize, width: usize) -> GridIndex {
    let width = width.max(1);
    let row = index / width;
    let mut col = index % width;
    if row % 2 == 1 {
        col = width - 1 - col;
    }
    GridIndex::new(row as u32, col as u32)
}

/// Assigns every unit its snake position, in slice order.
pub fn assign_grid(units: &mut [ObservationUnit], width: usize) {
    for (i, unit) in units.iter_mut().enumerate() {
        unit.grid = Some(snake_index(i, width));
    }
}

/// Extent of occupied grid positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub min_row: u32,
    pub min_col: u32,
    pub rows: u32,
    pub cols: u32,
}

impl GridShape {
    /// Extent of the given indices; an empty set degrades to a single cell at the origin.
    pub fn of<I>(indices: I) -> Self
    where
        I: IntoIterator<Item = GridIndex>,
    {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for g in indices {
            bounds = Some(match bounds {
                None => (g.row, g.col, g.row, g.col),
                Some((r0, c0, r1, c1)) => {
                    (r0.min(g.row), c0.min(g.col), r1.max(g.row), c1.max(g.col))
                }
            });
        }
        match bounds {
            Some((r0, c0, r1, c1)) => Self {
                min_row: r0,
                min_col: c0,
                rows: r1 - r0 + 1,
                cols: c1 - c0 + 1,
            },
            None => {
                log::warn!("No grid positions to measure; falling back to a 1x1 grid");
                Self {
                    min_row: 0,
                    min_col: 0,
                    rows: 1,
                    cols: 1,
                }
            }
        }
    }

    /// Position relative to the top-left occupied cell.
    pub fn relative(&self, g: GridIndex) -> GridIndex {
        GridIndex::new(
            g.row.saturating_sub(self.min_row),
            g.col.saturating_sub(self.min_col),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_width_square_matches_block() {
        // s = round(√16) = 4 = b
        assert_eq!(infer_width(16, 4), 4);
    }

    #[test]
    fn test_infer_width_square_above_block() {
        // s = round(√100) = 10, b = 3 -> round(10/3) * 3 = 9
        assert_eq!(infer_width(100, 3), 9);
        // s = 10, b = 4 -> round(2.5) * 4 = 12
        assert_eq!(infer_width(100, 4), 12);
    }

    #[test]
    fn test_infer_width_square_below_block_down_branch() {
        // s = round(√10) = 3, b = 5: b mod s = 2
        // closest_up = 2 / ⌊5/3⌋ = 2, closest_down = (3 - 2) / ⌈5/3⌉ = 0.5
        // down wins: round(3 - 0.5) = round(2.5) = 3
        assert_eq!(infer_width(10, 5), 3);
    }

    #[test]
    fn test_infer_width_square_below_block_up_branch() {
        // s = round(√20) = 4, b = 9: b mod s = 1
        // closest_up = 1 / 2 = 0.5, closest_down = 3 / 3 = 1
        // up wins: round(4.5) = 5
        assert_eq!(infer_width(20, 9), 5);
        // s = 3, b = 6: exact multiple, closest_up = 0
        assert_eq!(infer_width(9, 6), 3);
    }

    #[test]
    fn test_infer_width_degenerate() {
        assert_eq!(infer_width(0, 5), 1);
        assert_eq!(infer_width(1, 0), 1);
        assert_eq!(infer_width(10, 0), 3);
    }

    #[test]
    fn test_snake_index() {
        let cells: Vec<_> = (0..7).map(|i| snake_index(i, 3)).collect();
        assert_eq!(
            cells,
            vec![
                GridIndex::new(0, 0),
                GridIndex::new(0, 1),
                GridIndex::new(0, 2),
                GridIndex::new(1, 2),
                GridIndex::new(1, 1),
                GridIndex::new(1, 0),
                GridIndex::new(2, 0),
            ]
        );
    }

    #[test]
    fn test_median_block_length() {
        let units: Vec<ObservationUnit> = (0..11)
            .map(|i| {
                let block = if i < 5 {
                    "A"
                } else if i < 10 {
                    "B"
                } else {
                    "C"
                };
                ObservationUnit::new(format!("u{}", i)).with_block(block)
            })
            .collect();
        // sizes 5, 5, 1 -> median 5
        assert_eq!(median_block_length(&units), 5);
    }

    #[test]
    fn test_median_falls_back_to_replicate() {
        let units: Vec<ObservationUnit> = (0..6)
            .map(|i| ObservationUnit::new(format!("u{}", i)).with_replicate(if i < 2 { "1" } else { "2" }))
            .collect();
        // sizes 2, 4 -> mean 3
        assert_eq!(median_block_length(&units), 3);
        assert_eq!(median_block_length(&[]), 0);
    }

    #[test]
    fn test_grid_shape() {
        let shape = GridShape::of(vec![GridIndex::new(1, 1), GridIndex::new(3, 4)]);
        assert_eq!(shape.rows, 3);
        assert_eq!(shape.cols, 4);
        assert_eq!(shape.relative(GridIndex::new(3, 4)), GridIndex::new(2, 3));

        let empty = GridShape::of(Vec::new());
        assert_eq!((empty.rows, empty.cols), (1, 1));
    }

    #[test]
    fn test_assign_grid() {
        let mut units: Vec<ObservationUnit> =
            (0..4).map(|i| ObservationUnit::new(format!("u{}", i))).collect();
        assign_grid(&mut units, 2);
        assert_eq!(units[2].grid, Some(GridIndex::new(1, 1)));
        assert_eq!(units[3].grid, Some(GridIndex::new(1, 0)));
    }
}
