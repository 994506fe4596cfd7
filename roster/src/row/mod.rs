// Row access - stable ids and dotted field lookup for filter and sort keys

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::cmp::Ordering;

/// A record shown in a list view.
///
/// `id` must be stable and unique within a collection for as long as the
/// collection is held by a controller.
pub trait Row {
    fn id(&self) -> String;

    /// Look up a (possibly nested) field by a dotted path such as
    /// `school_class.id`. Missing fields are `FieldValue::Null`.
    fn field(&self, path: &str) -> FieldValue;
}

/// A scalar pulled out of a row for filtering or sorting.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Date(NaiveDateTime),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Render the value the way it would be shown in a table cell.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            FieldValue::Date(d) => {
                if d.time() == chrono::NaiveTime::MIN {
                    d.date().format("%Y-%m-%d").to_string()
                } else {
                    d.format("%Y-%m-%dT%H:%M:%S").to_string()
                }
            }
            FieldValue::Text(s) => s.clone(),
        }
    }

    /// Interpret the value as a point in time. Text is accepted as RFC 3339,
    /// `YYYY-MM-DD HH:MM:SS` or a bare `YYYY-MM-DD` date.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Text(s) => parse_datetime(s),
            _ => None,
        }
    }

    /// Total order used by sorting. Strings compare case-insensitively, numbers
    /// and dates by value. Text that parses as a date on both sides compares as
    /// a date. Mixed kinds order as null < bool < number < date < text.
    pub fn compare(&self, other: &FieldValue) -> Ordering {
        use FieldValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Number(a), Number(b)) => a.total_cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            (Date(a), Text(_)) => match other.as_datetime() {
                Some(b) => a.cmp(&b),
                None => self.rank().cmp(&other.rank()),
            },
            (Text(_), Date(b)) => match self.as_datetime() {
                Some(a) => a.cmp(b),
                None => self.rank().cmp(&other.rank()),
            },
            (Text(a), Text(b)) => match (parse_datetime(a), parse_datetime(b)) {
                (Some(da), Some(db)) => da.cmp(&db),
                _ => compare_text(a, b),
            },
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Number(_) => 2,
            FieldValue::Date(_) => 3,
            FieldValue::Text(_) => 4,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d.and_time(chrono::NaiveTime::MIN))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Case-insensitive string comparison.
pub fn compare_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Case-insensitive substring test, used by search filters.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
}

/// Walk a dotted path through nested JSON objects. Numeric segments index arrays.
pub fn lookup<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment)?,
            serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

impl Row for serde_json::Value {
    fn id(&self) -> String {
        match self.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    fn field(&self, path: &str) -> FieldValue {
        match lookup(self, path) {
            None | Some(serde_json::Value::Null) => FieldValue::Null,
            Some(serde_json::Value::Bool(b)) => FieldValue::Bool(*b),
            Some(serde_json::Value::Number(n)) => {
                n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Null)
            }
            Some(serde_json::Value::String(s)) => FieldValue::Text(s.clone()),
            Some(other) => FieldValue::Text(other.to_string()),
        }
    }
}
