use anyhow::Result;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(test)]
macro_rules! test_file {
    ($file_name:expr) => {
        include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/resources/test/",
            $file_name
        ))
    };
}

pub mod allocate;
pub mod config;
pub mod model;
pub mod normalize;
pub mod query;
pub mod source;
pub mod store;

pub use allocate::{allocate, AllocationPolicy, AllocationSummary, SlotCapacity};
pub use config::Config;
pub use model::{Bucket, QueryParameters, RawRow, Record, Records, SortDirection, SortKey};
pub use normalize::{load_records, Field};
pub use query::{duration_counts, export_csv, select, slot_counts};
pub use source::RosterSource;
pub use store::{LoadOutcome, LoadTicket, RosterStore};

#[derive(Debug, Error)]
pub enum RosterErrors {
    #[error("Roster source {0} could not be read: {1}")]
    SourceUnavailable(String, String),
    #[error("Roster source {0} answered with status {1}")]
    BadStatus(String, u16),
    #[error("No roster source configured")]
    MissingSource,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Slot and duration counts over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub slots: Vec<Bucket>,
    pub durations: Vec<Bucket>,
}

pub fn summarize(records: &[Record]) -> Summary {
    Summary {
        total: records.len(),
        slots: slot_counts(records),
        durations: duration_counts(records),
    }
}

/// Filters and sorts `records`, then writes the view as a dated CSV into `dir`.
pub fn export_view(
    records: &[Record],
    params: &QueryParameters,
    dir: &Path,
    date: NaiveDate,
) -> Result<PathBuf> {
    query::write_export(select(records, params), dir, date)
}
