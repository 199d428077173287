use anyhow::Result;
use chrono::NaiveDate;
use csv::WriterBuilder;
use regex::Regex;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};
use tracing::info;

use crate::{
    model::{Bucket, QueryParameters, Record, SortDirection, SortKey},
    normalize::Field,
};

/// Sort position of records whose slot carries no number.
pub const UNNUMBERED_SLOT: u32 = 999;
pub const UNKNOWN_DURATION: &str = "Unknown";

static LEADING_DIGITS: OnceLock<Regex> = OnceLock::new();
static SLOT_TOKEN: OnceLock<Regex> = OnceLock::new();
static NUMBER_TOKEN: OnceLock<Regex> = OnceLock::new();

fn leading_digits() -> &'static Regex {
    LEADING_DIGITS.get_or_init(|| Regex::new(r"[0-9]{1,2}").expect("static regex is valid"))
}

fn slot_token() -> &'static Regex {
    SLOT_TOKEN
        .get_or_init(|| Regex::new(r"(?i)\bslot\s*([0-9]{1,2})").expect("static regex is valid"))
}

fn number_token() -> &'static Regex {
    NUMBER_TOKEN.get_or_init(|| Regex::new(r"\b([0-9]{1,2})\b").expect("static regex is valid"))
}

/// First run of one or two digits in `slot`, or [`UNNUMBERED_SLOT`].
pub fn slot_sort_key(slot: &str) -> u32 {
    leading_digits()
        .find(slot)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(UNNUMBERED_SLOT)
}

/// Slot number used for bucketing: a `SLOT n` token wins over a bare number.
pub fn slot_number(slot: &str) -> Option<u32> {
    slot_token()
        .captures(slot)
        .or_else(|| number_token().captures(slot))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn matches(record: &Record, params: &QueryParameters) -> bool {
    let term = params.search_term.trim().to_lowercase();
    let found = term.is_empty()
        || [&record.name, &record.roll, &record.email]
            .iter()
            .any(|field| field.to_lowercase().contains(&term));

    let slot = params.slot_filter.trim().to_lowercase();
    let in_slot = slot.is_empty() || record.slot.to_lowercase().contains(&slot);

    let in_duration =
        params.duration_filter.is_empty() || record.duration == params.duration_filter;

    found && in_slot && in_duration
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Number(u32),
    Text(String),
}

fn sort_value(record: &Record, key: SortKey) -> SortValue {
    match key {
        SortKey::Name => SortValue::Text(record.name.to_lowercase()),
        SortKey::Roll => SortValue::Text(record.roll.to_lowercase()),
        SortKey::Duration => SortValue::Text(record.duration.to_lowercase()),
        SortKey::Slot => SortValue::Number(slot_sort_key(&record.slot)),
    }
}

/// The filtered and sorted view over `records`. Without a sort key, load order is kept.
pub fn select<'a>(records: &'a [Record], params: &QueryParameters) -> Vec<&'a Record> {
    let view = records.iter().filter(|record| matches(record, params));

    let Some(key) = params.sort_key else {
        return view.collect();
    };

    let mut keyed: Vec<_> = view.map(|record| (sort_value(record, key), record)).collect();
    keyed.sort_by(|(a, _), (b, _)| match params.sort_direction {
        SortDirection::Ascending => a.cmp(b),
        SortDirection::Descending => b.cmp(a),
    });
    keyed.into_iter().map(|(_, record)| record).collect()
}

/// Record count per `SLOT n`, in slot order. Records without a slot number are left out.
pub fn slot_counts<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<Bucket> {
    let mut counts = BTreeMap::<u32, usize>::new();
    for number in records
        .into_iter()
        .filter_map(|record| slot_number(&record.slot))
    {
        *counts.entry(number).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(number, count)| Bucket::new(format!("SLOT {number}"), count))
        .collect()
}

/// Record count per duration value; empty durations count as `Unknown`.
pub fn duration_counts<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<Bucket> {
    let mut counts = BTreeMap::<&str, usize>::new();
    for record in records {
        let label = match record.duration.as_str() {
            "" => UNKNOWN_DURATION,
            duration => duration,
        };
        *counts.entry(label).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(label, count)| Bucket::new(label, count))
        .collect()
}

/// Serializes `records` as CSV with the canonical column order.
pub fn export_csv<'a>(records: impl IntoIterator<Item = &'a Record>) -> Result<String> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(Field::ALL.map(Field::header))?;
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("roster-{}.csv", date.format("%Y-%m-%d"))
}

/// Writes the view into `dir` under the dated export name and returns the path.
pub fn write_export<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    dir: &Path,
    date: NaiveDate,
) -> Result<PathBuf> {
    let text = export_csv(records)?;
    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(date));
    fs::write(&path, text)?;
    info!("exported roster to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::load_records;

    fn names(view: &[&Record]) -> Vec<String> {
        view.iter().map(|r| r.name.clone()).collect()
    }

    fn sample() -> Vec<Record> {
        vec![
            Record::new("A Singh", "101", "a@iiitk.ac.in", "3 Months", "Slot 2"),
            Record::new("B Rao", "102", "b@iiitk.ac.in", "6 Months", "Slot 10"),
            Record::new("c kumar", "103", "c@gmail.com", "", "Slot 3 (4:00 PM - 5:30 PM)"),
            Record::new("D Das", "104", "d@iiitk.ac.in", "3 Months", "No slot allocated"),
        ]
    }

    #[test]
    fn test_empty_parameters_keep_everything_in_order() {
        let records = sample();
        let view = select(&records, &QueryParameters::default());
        assert_eq!(view, records.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_slot_sort_is_numeric() {
        let text = "FULLNAME,ROLL,Slot\nA Singh,101,Slot 2\nB Rao,102,Slot 10\n";
        let records = load_records(text);
        let mut params = QueryParameters::default();
        params.sort_by(SortKey::Slot);
        assert_eq!(names(&select(&records, &params)), ["A Singh", "B Rao"]);
    }

    #[test]
    fn test_slot_sort_descending_reverses() {
        let records = sample();
        let mut params = QueryParameters::default();
        params.sort_by(SortKey::Slot);
        let ascending = names(&select(&records, &params));
        params.sort_by(SortKey::Slot);
        let mut descending = names(&select(&records, &params));
        descending.reverse();
        assert_eq!(ascending, descending);
        assert_eq!(ascending, ["A Singh", "c kumar", "B Rao", "D Das"]);
    }

    #[test]
    fn test_name_sort_is_case_folded_and_stable() {
        let mut records = sample();
        records.push(Record::new("a singh", "999", "", "", ""));
        let params = QueryParameters::new("", "", "", Some(SortKey::Name));
        let view = select(&records, &params);
        assert_eq!(
            view.iter().map(|r| r.roll.as_str()).collect::<Vec<_>>(),
            ["101", "999", "102", "103", "104"]
        );
    }

    #[test]
    fn test_search_matches_name_roll_or_email() {
        let records = sample();
        let by_name = QueryParameters::new("  RAO ", "", "", None);
        assert_eq!(names(&select(&records, &by_name)), ["B Rao"]);

        let by_roll = QueryParameters::new("103", "", "", None);
        assert_eq!(names(&select(&records, &by_roll)), ["c kumar"]);

        let by_email = QueryParameters::new("GMAIL", "", "", None);
        assert_eq!(names(&select(&records, &by_email)), ["c kumar"]);

        let by_slot_text = QueryParameters::new("allocated", "", "", None);
        assert!(select(&records, &by_slot_text).is_empty());
    }

    #[test]
    fn test_slot_filter_is_substring() {
        let records = sample();
        let params = QueryParameters::new("", "SLOT 3", "", None);
        assert_eq!(names(&select(&records, &params)), ["c kumar"]);
    }

    #[test]
    fn test_blank_slot_filter_is_unset() {
        let records = sample();
        let params = QueryParameters::new("", "  ", "", None);
        assert_eq!(select(&records, &params).len(), records.len());

        let params = QueryParameters::new("", " slot 3 ", "", None);
        assert_eq!(names(&select(&records, &params)), ["c kumar"]);
    }

    #[test]
    fn test_duration_filter_is_exact() {
        let records = sample();
        let params = QueryParameters::new("", "", "3 Months", None);
        assert_eq!(names(&select(&records, &params)), ["A Singh", "D Das"]);

        let params = QueryParameters::new("", "", "3 months", None);
        assert!(select(&records, &params).is_empty());
    }

    #[test]
    fn test_filters_are_anded() {
        let records = sample();
        let params = QueryParameters::new("iiitk", "slot 1", "6 Months", None);
        assert_eq!(names(&select(&records, &params)), ["B Rao"]);
    }

    #[test]
    fn test_slot_number_extraction() {
        assert_eq!(slot_number("SLOT 3 (4:00PM TO 5:30PM)"), Some(3));
        assert_eq!(slot_number("slot10"), Some(10));
        assert_eq!(slot_number("Evening 7"), Some(7));
        assert_eq!(slot_number("No slot allocated"), None);
        assert_eq!(slot_sort_key("No slot allocated"), UNNUMBERED_SLOT);
        assert_eq!(slot_sort_key("Slot 12"), 12);
    }

    #[test]
    fn test_slot_counts() {
        let records = sample();
        assert_eq!(
            slot_counts(&records),
            vec![
                Bucket::new("SLOT 2", 1),
                Bucket::new("SLOT 3", 1),
                Bucket::new("SLOT 10", 1),
            ]
        );
    }

    #[test]
    fn test_duration_counts_have_unknown_bucket() {
        let records = sample();
        assert_eq!(
            duration_counts(&records),
            vec![
                Bucket::new("3 Months", 2),
                Bucket::new("6 Months", 1),
                Bucket::new("Unknown", 1),
            ]
        );
    }

    #[test]
    fn test_export_round_trip() {
        let records = load_records(test_file!("roster.csv"));
        let params = QueryParameters::new("", "", "3 Months", Some(SortKey::Slot));
        let view = select(&records, &params);

        let text = export_csv(view.iter().copied()).unwrap();
        assert!(text.starts_with("Name,Roll,Email,Duration,Slot\n"));

        let reloaded = load_records(&text);
        assert_eq!(reloaded.iter().collect::<Vec<_>>(), view);
    }

    #[test]
    fn test_export_empty_view_keeps_header() {
        let text = export_csv(std::iter::empty()).unwrap();
        assert_eq!(text, "Name,Roll,Email,Duration,Slot\n");
    }

    #[test]
    fn test_write_export_names_file_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let records = sample();
        let path = write_export(&records, dir.path(), date).unwrap();

        assert_eq!(path.file_name().unwrap(), "roster-2026-10-19.csv");
        let reloaded = load_records(&fs::read_to_string(path).unwrap());
        assert_eq!(reloaded, records);
    }
}
