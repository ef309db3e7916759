//! Paged unit loading with supersession.
//!
//! Every load takes a [`LoadTicket`] stamped with a generation number.
//! Starting a new load bumps the shared generation, which makes every older
//! ticket stale: stale loads stop fetching between pages and their results
//! are refused at commit time with [`Error::Superseded`].

use crate::pipeline::LayoutPipeline;
use plotmap_core::{
    Error, LayoutConfig, LayoutResult, ObservationUnit, Polygon, RawObservationUnit, Result,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// One page of observation units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitPage {
    pub units: Vec<RawObservationUnit>,
    /// Zero-based page number.
    pub page: usize,
    pub total_pages: usize,
    /// Total number of units across all pages, for progress reporting.
    pub total_count: usize,
}

/// A paged supplier of observation units for a study.
pub trait UnitSource {
    /// Fetches page `page` (zero-based) of at most `page_size` units.
    fn fetch_page(&mut self, study: &str, page: usize, page_size: usize) -> Result<UnitPage>;
}

/// A fixed set of units served in pages.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    units: Vec<RawObservationUnit>,
}

impl InMemorySource {
    pub fn new(units: Vec<RawObservationUnit>) -> Self {
        Self { units }
    }
}

impl UnitSource for InMemorySource {
    fn fetch_page(&mut self, _study: &str, page: usize, page_size: usize) -> Result<UnitPage> {
        if page_size == 0 {
            return Err(Error::InvalidInput("page size must be positive".into()));
        }
        let total_count = self.units.len();
        let total_pages = total_count.div_ceil(page_size);
        if page > 0 && page >= total_pages {
            return Err(Error::Source(format!(
                "page {} requested but only {} page(s) exist",
                page, total_pages
            )));
        }
        let start = page * page_size;
        let end = (start + page_size).min(total_count);
        Ok(UnitPage {
            units: self.units[start..end].to_vec(),
            page,
            total_pages,
            total_count,
        })
    }
}

/// Proof that a load was started, stamped with its generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    study: String,
    generation: u64,
}

impl LoadTicket {
    pub fn study(&self) -> &str {
        &self.study
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn superseded(&self) -> Error {
        Error::Superseded {
            study: self.study.clone(),
            generation: self.generation,
        }
    }
}

/// Hands out load tickets and guards commits. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct LoadCoordinator {
    generation: Arc<AtomicU64>,
    committed: Arc<Mutex<Option<(String, LayoutResult)>>>,
}

impl LoadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a load for `study`, superseding any load in flight.
    pub fn begin(&self, study: impl Into<String>) -> LoadTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let ticket = LoadTicket {
            study: study.into(),
            generation,
        };
        log::debug!(
            "Started load of study '{}' (generation {})",
            ticket.study,
            generation
        );
        ticket
    }

    /// Returns true if no newer load has started since `ticket` was issued.
    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    /// Fails with [`Error::Superseded`] if `ticket` is stale.
    pub fn ensure_current(&self, ticket: &LoadTicket) -> Result<()> {
        if self.is_current(ticket) {
            Ok(())
        } else {
            Err(ticket.superseded())
        }
    }

    /// Fetches every page of the ticket's study.
    ///
    /// The ticket is checked before each page and once after the last, so a
    /// superseded load never returns units.
    pub fn load_all<S>(
        &self,
        ticket: &LoadTicket,
        source: &mut S,
        page_size: usize,
    ) -> Result<Vec<ObservationUnit>>
    where
        S: UnitSource + ?Sized,
    {
        let mut units = Vec::new();
        let mut page = 0;
        loop {
            self.ensure_current(ticket)?;
            let batch = source.fetch_page(&ticket.study, page, page_size)?;
            units.extend(batch.units.iter().map(ObservationUnit::from_raw));
            log::debug!(
                "Loaded page {}/{} of study '{}' ({}/{} units)",
                page + 1,
                batch.total_pages.max(1),
                ticket.study,
                units.len(),
                batch.total_count
            );
            page += 1;
            if page >= batch.total_pages {
                break;
            }
        }
        self.ensure_current(ticket)?;
        Ok(units)
    }

    /// Stores `result` as the committed layout if `ticket` is still current.
    pub fn commit(&self, ticket: &LoadTicket, result: LayoutResult) -> Result<()> {
        let mut committed = self
            .committed
            .lock()
            .map_err(|_| Error::Internal("committed layout lock poisoned".into()))?;
        // Checked under the lock so a stale commit can never overwrite a newer one.
        if !self.is_current(ticket) {
            log::debug!(
                "Discarding result of superseded load '{}' (generation {})",
                ticket.study,
                ticket.generation
            );
            return Err(ticket.superseded());
        }
        *committed = Some((ticket.study.clone(), result));
        Ok(())
    }

    /// The last committed study and layout.
    pub fn committed(&self) -> Option<(String, LayoutResult)> {
        self.committed.lock().ok().and_then(|guard| guard.clone())
    }
}

/// Loads studies and lays them out, committing only the newest result.
#[derive(Debug, Clone, Default)]
pub struct LayoutSession {
    config: LayoutConfig,
    coordinator: LoadCoordinator,
}

impl LayoutSession {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            coordinator: LoadCoordinator::new(),
        }
    }

    /// The coordinator shared by every load of this session.
    pub fn coordinator(&self) -> &LoadCoordinator {
        &self.coordinator
    }

    /// Loads every unit of `study`, lays them out and commits the result.
    ///
    /// Returns [`Error::Superseded`] if another load started before this one
    /// committed; the stale result is dropped.
    pub fn load_and_layout<S>(
        &self,
        study: &str,
        source: &mut S,
        boundary: Option<&Polygon>,
    ) -> Result<LayoutResult>
    where
        S: UnitSource + ?Sized,
    {
        let ticket = self.coordinator.begin(study);
        let mut pipeline = LayoutPipeline::new(self.config.clone());
        pipeline.begin_loading();

        let units = match self
            .coordinator
            .load_all(&ticket, source, self.config.page_size)
        {
            Ok(units) => units,
            Err(e) => {
                if e.is_cancellation() {
                    pipeline.supersede();
                }
                return Err(e);
            }
        };
        log::info!("Loaded {} units for study '{}'", units.len(), study);

        let result = pipeline.run(units, boundary)?;
        if let Err(e) = self.coordinator.commit(&ticket, result.clone()) {
            if e.is_cancellation() {
                pipeline.supersede();
            }
            return Err(e);
        }
        Ok(result)
    }
}
