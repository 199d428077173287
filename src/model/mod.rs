use clap::ValueEnum;
use derive_new::new;
use serde::Serialize;

pub type Records = Vec<Record>;

/// One normalized student entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, new)]
pub struct Record {
    #[new(into)]
    pub name: String,
    #[new(into)]
    pub roll: String,
    #[new(into)]
    pub email: String,
    #[new(into)]
    pub duration: String,
    #[new(into)]
    pub slot: String,
}

impl Record {
    /// A record is worth keeping when it carries at least one of name, roll or email.
    pub fn is_identified(&self) -> bool {
        [&self.name, &self.roll, &self.email]
            .iter()
            .any(|field| !field.trim().is_empty())
    }
}

/// A parsed data row: header/cell pairs in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str)> + Clone {
        self.cells
            .iter()
            .map(|(header, cell)| (header.as_str(), cell.as_str()))
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells()
            .find(|(column, _)| *column == header)
            .map(|(_, cell)| cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<H: Into<String>, C: Into<String>> FromIterator<(H, C)> for RawRow {
    fn from_iter<T: IntoIterator<Item = (H, C)>>(iter: T) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(header, cell)| (header.into(), cell.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    Name,
    Roll,
    Duration,
    Slot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Search, filter and sort settings for a roster view. Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, new)]
pub struct QueryParameters {
    #[new(into)]
    pub search_term: String,
    #[new(into)]
    pub slot_filter: String,
    #[new(into)]
    pub duration_filter: String,
    pub sort_key: Option<SortKey>,
    #[new(default)]
    pub sort_direction: SortDirection,
}

impl QueryParameters {
    /// Same key flips the direction, a new key starts ascending.
    pub fn sort_by(&mut self, key: SortKey) {
        if self.sort_key == Some(key) {
            self.sort_direction = self.sort_direction.flipped();
        } else {
            self.sort_key = Some(key);
            self.sort_direction = SortDirection::Ascending;
        }
    }
}

/// One row of an aggregation view.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Bucket {
    #[new(into)]
    pub label: String,
    pub count: usize,
}
