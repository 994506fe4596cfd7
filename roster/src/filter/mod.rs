// Named filter definitions and the values a view sets on them

use crate::engine::Predicate;
use crate::error::{Result, RosterError};
use crate::row::{contains_ignore_case, Row};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The current value of one filter control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterValue {
    /// The control is at its "All" position
    #[default]
    Any,
    Text(String),
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

impl FilterValue {
    /// Whether this value narrows the collection at all. Blank text and the
    /// literal `all` (any case) count as inactive, as select boxes send them.
    pub fn is_active(&self) -> bool {
        match self {
            FilterValue::Any => false,
            FilterValue::Text(s) => {
                let s = s.trim();
                !s.is_empty() && !s.eq_ignore_ascii_case("all")
            }
            FilterValue::DateRange { from, to } => from.is_some() || to.is_some(),
        }
    }

    /// Parse `FROM..TO` where either side may be empty, e.g. `2024-01-01..`.
    pub fn parse_range(s: &str) -> Result<Self> {
        let (from, to) = s.split_once("..").ok_or_else(|| {
            RosterError::Validation(format!("Invalid date range '{s}': expected FROM..TO"))
        })?;
        Ok(FilterValue::DateRange {
            from: parse_bound(from)?,
            to: parse_bound(to)?,
        })
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::Text(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::Text(s)
    }
}

fn parse_bound(s: &str) -> Result<Option<NaiveDate>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| RosterError::Validation(format!("Invalid date '{s}': {e}")))
}

pub type CustomFilter<R> = Arc<dyn Fn(&R, &FilterValue) -> bool + Send + Sync>;

/// How a named filter tests a row against its current value.
pub enum FilterDef<R> {
    /// Case-insensitive substring match against any of the listed fields
    Search(Vec<String>),
    /// Case-insensitive equality on one field
    Equals(String),
    /// Inclusive date range on one field; rows without a date are excluded
    DateRange(String),
    Custom(CustomFilter<R>),
}

impl<R> Clone for FilterDef<R> {
    fn clone(&self) -> Self {
        match self {
            FilterDef::Search(fields) => FilterDef::Search(fields.clone()),
            FilterDef::Equals(field) => FilterDef::Equals(field.clone()),
            FilterDef::DateRange(field) => FilterDef::DateRange(field.clone()),
            FilterDef::Custom(f) => FilterDef::Custom(Arc::clone(f)),
        }
    }
}

impl<R> fmt::Debug for FilterDef<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterDef::Search(fields) => f.debug_tuple("Search").field(fields).finish(),
            FilterDef::Equals(field) => f.debug_tuple("Equals").field(field).finish(),
            FilterDef::DateRange(field) => f.debug_tuple("DateRange").field(field).finish(),
            FilterDef::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<R: Row> FilterDef<R> {
    pub fn custom(f: impl Fn(&R, &FilterValue) -> bool + Send + Sync + 'static) -> Self {
        FilterDef::Custom(Arc::new(f))
    }

    /// Reject values this kind of filter cannot interpret.
    pub fn validate(&self, key: &str, value: &FilterValue) -> Result<()> {
        match (self, value) {
            (_, FilterValue::Any) | (FilterDef::Custom(_), _) => Ok(()),
            (FilterDef::Search(_) | FilterDef::Equals(_), FilterValue::Text(_)) => Ok(()),
            (FilterDef::DateRange(_), FilterValue::DateRange { from, to }) => match (from, to) {
                (Some(from), Some(to)) if from > to => Err(RosterError::Validation(format!(
                    "Filter '{key}': range start {from} is after end {to}"
                ))),
                _ => Ok(()),
            },
            (FilterDef::DateRange(_), FilterValue::Text(_)) => Err(RosterError::Validation(
                format!("Filter '{key}' expects a date range"),
            )),
            (_, FilterValue::DateRange { .. }) => Err(RosterError::Validation(format!(
                "Filter '{key}' does not accept a date range"
            ))),
        }
    }

    /// Build the engine predicate for the current value, or `None` if the value
    /// does not narrow anything.
    pub fn predicate<'a>(&'a self, value: &'a FilterValue) -> Option<Predicate<'a, R>> {
        if !value.is_active() {
            return None;
        }

        match (self, value) {
            (FilterDef::Search(fields), FilterValue::Text(needle)) => {
                let needle = needle.trim();
                Some(Box::new(move |row: &R| {
                    fields
                        .iter()
                        .any(|field| contains_ignore_case(&row.field(field).as_text(), needle))
                }))
            }
            (FilterDef::Equals(field), FilterValue::Text(expected)) => {
                let expected = expected.trim().to_lowercase();
                Some(Box::new(move |row: &R| {
                    row.field(field).as_text().to_lowercase() == expected
                }))
            }
            (FilterDef::DateRange(field), FilterValue::DateRange { from, to }) => {
                Some(Box::new(move |row: &R| {
                    let Some(date) = row.field(field).as_datetime().map(|d| d.date()) else {
                        return false;
                    };
                    from.map_or(true, |from| date >= from) && to.map_or(true, |to| date <= to)
                }))
            }
            (FilterDef::Custom(f), value) => Some(Box::new(move |row: &R| f(row, value))),
            // Mismatched kinds are rejected by `validate` before they get here
            _ => None,
        }
    }
}
