// Filter / sort / paginate engine - pure functions over borrowed rows

use crate::error::{Result, RosterError};
use crate::row::{FieldValue, Row};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::str::FromStr;

/// A side-effect free row test. Active predicates combine with logical AND.
pub type Predicate<'a, R> = Box<dyn Fn(&R) -> bool + 'a>;

/// Keep the rows for which every predicate holds. No predicates keeps everything.
pub fn apply_filters<'r, R: ?Sized>(
    rows: &[&'r R],
    predicates: &[Predicate<'_, R>],
) -> Vec<&'r R> {
    rows.iter()
        .copied()
        .filter(|row| predicates.iter().all(|p| p(*row)))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(RosterError::Validation(format!(
                "Unknown sort direction '{other}' (expected asc or desc)"
            ))),
        }
    }
}

/// A field extractor paired with a direction.
pub struct SortKey<'a, R: ?Sized> {
    extractor: Box<dyn Fn(&R) -> FieldValue + 'a>,
    direction: SortDirection,
}

impl<'a, R: ?Sized> SortKey<'a, R> {
    pub fn new(extractor: impl Fn(&R) -> FieldValue + 'a, direction: SortDirection) -> Self {
        SortKey {
            extractor: Box::new(extractor),
            direction,
        }
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }
}

impl<'a, R: Row + ?Sized> SortKey<'a, R> {
    /// Sort by a dotted field path on the row.
    pub fn field(path: &'a str, direction: SortDirection) -> Self {
        SortKey::new(move |row: &R| row.field(path), direction)
    }
}

/// Stable sort by the key. Rows with equal keys keep their relative order in
/// both directions. `None` leaves the order untouched.
pub fn apply_sort<'r, R: ?Sized>(
    rows: Vec<&'r R>,
    key: Option<&SortKey<'_, R>>,
) -> Vec<&'r R> {
    let Some(key) = key else {
        return rows;
    };

    // Extract each key once instead of on every comparison
    let mut keyed: Vec<(FieldValue, &'r R)> = rows
        .into_iter()
        .map(|row| ((key.extractor)(row), row))
        .collect();

    keyed.sort_by(|a, b| {
        let ord = a.0.compare(&b.0);
        match key.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });

    keyed.into_iter().map(|(_, row)| row).collect()
}

/// Rows per page. Always positive; zero is rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageSize(NonZeroUsize);

impl PageSize {
    pub const DEFAULT: usize = 10;

    pub fn new(size: usize) -> Result<Self> {
        NonZeroUsize::new(size)
            .map(PageSize)
            .ok_or_else(|| RosterError::Validation("Page size must be a positive integer".into()))
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize(NonZeroUsize::new(Self::DEFAULT).unwrap_or(NonZeroUsize::MIN))
    }
}

impl TryFrom<usize> for PageSize {
    type Error = RosterError;

    fn try_from(size: usize) -> Result<Self> {
        PageSize::new(size)
    }
}

/// One window of a filtered and sorted sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'s, T> {
    pub rows: &'s [T],
    /// 1-based index after clamping
    pub page_index: usize,
    pub total_pages: usize,
}

/// `max(1, ceil(len / page_size))`
pub fn total_pages(len: usize, page_size: PageSize) -> usize {
    len.div_ceil(page_size.get()).max(1)
}

/// Clamp a 1-based page index into `[1, total_pages]`.
pub fn clamp_page(page_index: usize, total_pages: usize) -> usize {
    page_index.clamp(1, total_pages.max(1))
}

/// Slice out page `page_index` (1-based, clamped) of `rows`.
pub fn paginate<T>(rows: &[T], page_size: PageSize, page_index: usize) -> Page<'_, T> {
    let total = total_pages(rows.len(), page_size);
    let page_index = clamp_page(page_index, total);
    let start = ((page_index - 1) * page_size.get()).min(rows.len());
    let end = (start + page_size.get()).min(rows.len());

    Page {
        rows: &rows[start..end],
        page_index,
        total_pages: total,
    }
}
