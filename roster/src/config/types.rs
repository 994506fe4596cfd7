use crate::engine::{PageSize, SortDirection};
use crate::error::{Result, RosterError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level configuration parsed from roster.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub rest: Option<RestConfig>,
    #[serde(default)]
    pub views: BTreeMap<String, ViewConfig>,
}

impl RosterConfig {
    pub fn view(&self, name: &str) -> Result<&ViewConfig> {
        self.views
            .get(name)
            .ok_or_else(|| RosterError::Validation(format!("View '{name}' is not configured")))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, view) in &self.views {
            view.validate(name)?;
        }
        Ok(())
    }
}

/// Where the REST backend lives and how resource types map to paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    pub base_url: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
}

/// Declarative definition of one list view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    pub resource: String,
    /// Plural noun used in notifications ("routines", "fee records")
    #[serde(default)]
    pub noun: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub page_sizes: Vec<usize>,
    /// Fields matched by the free-text search box
    #[serde(default)]
    pub search: Vec<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterConfig>,
    #[serde(default)]
    pub sorts: BTreeMap<String, SortConfig>,
    #[serde(default)]
    pub default_sort: Option<DefaultSort>,
    #[serde(default)]
    pub cascade: Option<CascadeConfig>,
}

fn default_page_size() -> usize {
    PageSize::DEFAULT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    Equals { field: String },
    DateRange { field: String },
    Search { fields: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultSort {
    pub key: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// A chain of dependent selects fed by one option tree resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeConfig {
    pub tree: String,
    pub levels: Vec<String>,
}

impl ViewConfig {
    pub fn noun(&self) -> &str {
        self.noun.as_deref().unwrap_or("records")
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        let fail = |msg: String| Err(RosterError::Validation(format!("View '{name}': {msg}")));

        if self.resource.trim().is_empty() {
            return fail("resource must not be empty".into());
        }
        if self.page_size == 0 {
            return fail("page_size must be a positive integer".into());
        }
        if self.page_sizes.contains(&0) {
            return fail("page_sizes must all be positive".into());
        }
        if !self.page_sizes.is_empty() && !self.page_sizes.contains(&self.page_size) {
            return fail(format!(
                "page_size {} is not one of {:?}",
                self.page_size, self.page_sizes
            ));
        }
        if !self.search.is_empty() && self.filters.contains_key("search") {
            return fail("'search' is reserved for the search field list".into());
        }
        if let Some(default_sort) = &self.default_sort {
            if !self.sorts.contains_key(&default_sort.key) {
                return fail(format!(
                    "default_sort refers to unknown sort '{}'",
                    default_sort.key
                ));
            }
        }
        if let Some(cascade) = &self.cascade {
            if cascade.levels.is_empty() {
                return fail("cascade needs at least one level".into());
            }
        }
        Ok(())
    }
}
