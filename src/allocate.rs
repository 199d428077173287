use anyhow::{ensure, Result};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use derive_new::new;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

use crate::{
    normalize::{resolve_header, squash, Field},
    RosterErrors,
};

pub const ALLOCATED_SLOT: &str = "Allocated Slot";
pub const INVALID_EMAIL_DOMAIN: &str = "Invalid email domain";
pub const NO_SLOT_ALLOCATED: &str = "No slot allocated";
pub const PREFERENCE_PREFIX: &str = "SLOT PREFERENCE :";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, new)]
pub struct SlotCapacity {
    #[new(into)]
    pub label: String,
    pub capacity: u32,
}

/// Capacities and eligibility rules for one allocation round.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, new)]
pub struct AllocationPolicy {
    #[serde(default)]
    pub email_domain: Option<String>,
    #[serde(default = "AllocationPolicy::default_preference_columns")]
    pub preference_columns: usize,
    #[serde(default)]
    pub slots: Vec<SlotCapacity>,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            email_domain: None,
            preference_columns: Self::default_preference_columns(),
            slots: Vec::new(),
        }
    }
}

impl AllocationPolicy {
    fn default_preference_columns() -> usize {
        9
    }

    /// Rejects empty or duplicated slot labels.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for slot in &self.slots {
            let label = slot.label.trim();
            ensure!(
                !label.is_empty(),
                RosterErrors::InvalidConfig("slot label must not be empty".to_string())
            );
            ensure!(
                seen.insert(label),
                RosterErrors::InvalidConfig(format!("slot {label} is listed twice"))
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationSummary {
    pub allocated: usize,
    pub unallocated: usize,
    pub rejected: usize,
    /// Seats left per slot label after the round.
    pub remaining: BTreeMap<String, u32>,
}

/// Assigns applicants to slots by ranked preference, first come first served.
pub struct Allocator<'p> {
    policy: &'p AllocationPolicy,
    remaining: BTreeMap<String, u32>,
}

impl<'p> Allocator<'p> {
    pub fn new(policy: &'p AllocationPolicy) -> Result<Self> {
        policy.validate()?;
        let remaining = policy
            .slots
            .iter()
            .map(|slot| (slot.label.trim().to_string(), slot.capacity))
            .collect();
        Ok(Self { policy, remaining })
    }

    fn email_allowed(&self, email: &str) -> bool {
        match &self.policy.email_domain {
            Some(domain) => {
                let domain = domain.trim().trim_start_matches('@').to_lowercase();
                email
                    .trim()
                    .to_lowercase()
                    .ends_with(&format!("@{domain}"))
            }
            None => true,
        }
    }

    /// Takes a seat in the first preferred slot that still has one.
    fn take_seat<'a>(&mut self, preferences: impl Iterator<Item = &'a str>) -> Option<String> {
        preferences.map(str::trim).find_map(|preference| {
            let seats = self.remaining.get_mut(preference)?;
            if *seats == 0 {
                return None;
            }
            *seats -= 1;
            Some(preference.to_string())
        })
    }

    /// Runs one allocation round over `text` and returns the annotated CSV.
    pub fn allocate(mut self, text: &str) -> Result<(String, AllocationSummary)> {
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(text.as_bytes());
        let mut headers = rdr.headers()?.clone();

        let names: Vec<&str> = headers.iter().collect();
        let email_column = resolve_header(names.iter().copied(), Field::Email.candidates())
            .and_then(|email| names.iter().position(|header| *header == email));
        if email_column.is_none() && self.policy.email_domain.is_some() {
            warn!("no email column found, every applicant will be rejected");
        }

        let preference_columns: Vec<usize> = (1..=self.policy.preference_columns)
            .filter_map(|rank| {
                let wanted = squash(&format!("{PREFERENCE_PREFIX} {rank}"));
                names.iter().position(|header| squash(header) == wanted)
            })
            .collect();
        debug!(columns = preference_columns.len(), "preference columns found");

        let allocated_column = match headers.iter().position(|header| header == ALLOCATED_SLOT) {
            Some(idx) => idx,
            None => {
                headers.push_field(ALLOCATED_SLOT);
                headers.len() - 1
            }
        };

        let mut wtr = WriterBuilder::new().flexible(true).from_writer(Vec::new());
        wtr.write_record(&headers)?;

        let mut summary = AllocationSummary::default();
        for (idx, line) in rdr.records().enumerate() {
            let row = match line {
                Ok(row) => row,
                Err(err) => {
                    warn!(row = idx + 1, "skipping malformed application: {err}");
                    continue;
                }
            };
            let email = email_column.and_then(|col| row.get(col)).unwrap_or_default();

            let outcome = if !self.email_allowed(email) {
                summary.rejected += 1;
                INVALID_EMAIL_DOMAIN.to_string()
            } else {
                let preferences = preference_columns.iter().filter_map(|&col| row.get(col));
                match self.take_seat(preferences) {
                    Some(slot) => {
                        summary.allocated += 1;
                        slot
                    }
                    None => {
                        summary.unallocated += 1;
                        NO_SLOT_ALLOCATED.to_string()
                    }
                }
            };

            wtr.write_record(&with_cell(&row, allocated_column, &outcome))?;
        }

        let bytes = wtr.into_inner().map_err(|err| err.into_error())?;
        summary.remaining = self.remaining;
        info!(
            allocated = summary.allocated,
            unallocated = summary.unallocated,
            rejected = summary.rejected,
            "allocation round finished"
        );
        Ok((String::from_utf8(bytes)?, summary))
    }
}

/// Copy of `row` with `value` placed at `column`, padding short rows.
fn with_cell(row: &StringRecord, column: usize, value: &str) -> StringRecord {
    let mut out = StringRecord::new();
    for idx in 0..row.len().max(column + 1) {
        if idx == column {
            out.push_field(value);
        } else {
            out.push_field(row.get(idx).unwrap_or_default());
        }
    }
    out
}

pub fn allocate(text: &str, policy: &AllocationPolicy) -> Result<(String, AllocationSummary)> {
    Allocator::new(policy)?.allocate(text)
}
