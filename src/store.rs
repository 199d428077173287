use anyhow::Result;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};
use tracing::{info, warn};

use crate::{model::Records, normalize::load_records, source::RosterSource};

/// Identifies one load request. Only the most recently issued ticket may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The dataset was replaced; carries the new record count.
    Applied(usize),
    /// A newer load was requested meanwhile and this result was dropped.
    Superseded,
}

/// Holds the current dataset. Loads replace it wholesale, never partially.
#[derive(Debug, Default)]
pub struct RosterStore {
    generation: AtomicU64,
    records: Mutex<Arc<Records>>,
}

impl RosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> LoadTicket {
        LoadTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, ticket: LoadTicket) -> bool {
        self.generation() == ticket.0
    }

    /// Applies a finished load if `ticket` is still the latest one.
    /// A failed current load empties the dataset and returns the error.
    pub fn commit(&self, ticket: LoadTicket, loaded: Result<Records>) -> Result<LoadOutcome> {
        let mut current = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_current(ticket) {
            warn!(ticket = ticket.0, "discarding superseded roster load");
            return Ok(LoadOutcome::Superseded);
        }

        match loaded {
            Ok(records) => {
                let count = records.len();
                *current = Arc::new(records);
                info!(count, "roster loaded");
                Ok(LoadOutcome::Applied(count))
            }
            Err(err) => {
                *current = Arc::default();
                Err(err)
            }
        }
    }

    /// Fetches and normalizes `source`, then commits the result.
    pub async fn load(&self, source: &RosterSource) -> Result<LoadOutcome> {
        let ticket = self.begin();
        let loaded = source.fetch().await.map(|text| load_records(&text));
        self.commit(ticket, loaded)
    }

    pub fn snapshot(&self) -> Arc<Records> {
        Arc::clone(&self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
