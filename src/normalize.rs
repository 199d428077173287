use csv::{ReaderBuilder, Trim};
use tracing::{debug, warn};

use crate::model::{RawRow, Record, Records};

pub const NAME_HEADERS: &[&str] = &["FULLNAME", "Full Name", "Name", "Student Name"];
pub const ROLL_HEADERS: &[&str] = &[
    "ROLL",
    "Roll Number",
    "ROLLNUMBER",
    "Roll No",
    "Roll No.",
    "Registration Number",
    "Registration No",
    "Enrollment No",
    "Student ID",
];
pub const EMAIL_HEADERS: &[&str] = &["EMAIL", "Email Address", "E-mail", "Email ID", "Mail"];
pub const DURATION_HEADERS: &[&str] = &["DURATION", "Membership Duration", "Plan", "Months"];
pub const SLOT_HEADERS: &[&str] = &[
    "Allocated Slot",
    "SLOT",
    "Slot Allotted",
    "Time Slot",
    "Slot Timing",
];

/// The five canonical columns of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Roll,
    Email,
    Duration,
    Slot,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Name,
        Field::Roll,
        Field::Email,
        Field::Duration,
        Field::Slot,
    ];

    /// Column title used when exporting.
    pub fn header(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Roll => "Roll",
            Field::Email => "Email",
            Field::Duration => "Duration",
            Field::Slot => "Slot",
        }
    }

    /// Accepted header spellings, highest priority first.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Field::Name => NAME_HEADERS,
            Field::Roll => ROLL_HEADERS,
            Field::Email => EMAIL_HEADERS,
            Field::Duration => DURATION_HEADERS,
            Field::Slot => SLOT_HEADERS,
        }
    }
}

/// Lower-cased with all whitespace removed.
pub(crate) fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Lower-cased alphanumerics only.
fn alphanumeric(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Finds the column holding `candidates`: exact match first, then containment.
pub fn resolve_header<'a>(
    headers: impl Iterator<Item = &'a str> + Clone,
    candidates: &[&str],
) -> Option<&'a str> {
    let exact = candidates.iter().find_map(|candidate| {
        let candidate = squash(candidate);
        headers.clone().find(|header| squash(header) == candidate)
    });
    if exact.is_some() {
        return exact;
    }

    candidates.iter().find_map(|candidate| {
        let candidate = alphanumeric(candidate);
        if candidate.is_empty() {
            return None;
        }
        headers
            .clone()
            .find(|header| alphanumeric(header).contains(&candidate))
    })
}

/// Trimmed value of `field` in `row`, empty when no column matches.
pub fn resolve(row: &RawRow, field: Field) -> &str {
    resolve_header(row.cells().map(|(header, _)| header), field.candidates())
        .and_then(|header| row.get(header))
        .map(str::trim)
        .unwrap_or_default()
}

pub fn normalize_row(row: &RawRow) -> Option<Record> {
    let record = Record::new(
        resolve(row, Field::Name),
        resolve(row, Field::Roll),
        resolve(row, Field::Email),
        resolve(row, Field::Duration),
        resolve(row, Field::Slot),
    );
    record.is_identified().then_some(record)
}

/// Splits CSV text into header-keyed rows. Malformed rows are logged and skipped.
pub fn parse_rows(text: &str) -> Vec<RawRow> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = match rdr.headers() {
        Ok(headers) => headers.clone(),
        Err(err) => {
            warn!("unreadable header row: {err}");
            return Vec::new();
        }
    };

    rdr.records()
        .enumerate()
        .filter_map(|(idx, line)| match line {
            Ok(record) => {
                if record.len() != headers.len() {
                    warn!(
                        row = idx + 1,
                        "row has {} cells, header has {}",
                        record.len(),
                        headers.len()
                    );
                }
                Some(headers.iter().zip(record.iter()).collect::<RawRow>())
            }
            Err(err) => {
                warn!(row = idx + 1, "skipping malformed row: {err}");
                None
            }
        })
        .collect()
}

pub fn normalize<'a>(rows: impl IntoIterator<Item = &'a RawRow>) -> Records {
    rows.into_iter().filter_map(normalize_row).collect()
}

/// Parses and normalizes a full export, dropping rows without name, roll or email.
pub fn load_records(text: &str) -> Records {
    let rows = parse_rows(text);
    let records = normalize(&rows);
    debug!(
        rows = rows.len(),
        kept = records.len(),
        "normalized roster rows"
    );
    records
}
