//! Memo cache for cell splits.
//!
//! Sibling units that share a grid cell all ask for a part of the same split,
//! so the split is computed once per `(parts, cell)` pair. The cache is owned
//! by a single layout run; independent runs never share entries.

use crate::geom::Polygon;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Parts of one split cell, in row-major order. `None` marks a part that could not be built.
pub type SplitParts = Arc<Vec<Option<Polygon>>>;

/// Structural cache key: partition count plus the exact bit patterns of the cell ring.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct SplitKey {
    parts: usize,
    ring: Vec<(u64, u64)>,
}

impl SplitKey {
    /// Builds the key for splitting `cell` into `parts` pieces.
    ///
    /// `-0.0` is folded into `0.0` so that equal coordinates always hash equally.
    pub fn new(cell: &Polygon, parts: usize) -> Self {
        let canon = |v: f64| (if v == 0.0 { 0.0f64 } else { v }).to_bits();
        Self {
            parts,
            ring: cell
                .exterior()
                .coords()
                .map(|c| (canon(c.x), canon(c.y)))
                .collect(),
        }
    }
}

/// Per-run split memo.
#[derive(Debug, Default)]
pub struct SplitCache {
    entries: HashMap<SplitKey, SplitParts>,
    hits: usize,
    misses: usize,
}

impl SplitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached split for `key` or computes and stores it.
    ///
    /// Failed computations are not cached.
    pub fn get_or_compute<F>(&mut self, key: SplitKey, compute: F) -> Result<SplitParts>
    where
        F: FnOnce() -> Result<Vec<Option<Polygon>>>,
    {
        if let Some(parts) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(Arc::clone(parts));
        }

        self.misses += 1;
        let parts = Arc::new(compute()?);
        self.entries.insert(key, Arc::clone(&parts));
        Ok(parts)
    }

    /// Returns the number of cached splits.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `(hits, misses)` since creation or the last clear.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}
