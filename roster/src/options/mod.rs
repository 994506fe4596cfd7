// Dependent option lists for cascading selects (class -> section -> house)

use crate::error::{Result, RosterError};
use crate::row::Row;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One entry of a select box.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionItem {
    pub id: String,
    #[serde(alias = "name")]
    pub label: String,
}

impl OptionItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        OptionItem {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Parent id -> child options, fetched once and then consulted in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionTree {
    children: BTreeMap<String, Vec<OptionItem>>,
}

impl OptionTree {
    /// Key under which a fetched tree may list the first level's options.
    pub const ROOT: &'static str = "";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, parent_id: impl Into<String>, children: Vec<OptionItem>) {
        self.children.insert(parent_id.into(), children);
    }

    /// Children of `parent_id`; empty for an unknown or blank parent.
    pub fn children(&self, parent_id: &str) -> &[OptionItem] {
        self.children
            .get(parent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Derive a tree from rows that are already loaded, e.g. the sections that
    /// occur among the students of each class. Children are unique and sorted
    /// by label; rows with a blank parent or child are skipped.
    pub fn from_rows<R: Row>(
        rows: &[R],
        parent_field: &str,
        child_id_field: &str,
        child_label_field: &str,
    ) -> Self {
        let mut grouped: BTreeMap<String, BTreeSet<(String, String)>> = BTreeMap::new();
        for row in rows {
            let parent = row.field(parent_field).as_text();
            let child_id = row.field(child_id_field).as_text();
            if parent.is_empty() || child_id.is_empty() {
                continue;
            }
            let label = row.field(child_label_field).as_text();
            grouped.entry(parent).or_default().insert((label, child_id));
        }

        let children = grouped
            .into_iter()
            .map(|(parent, set)| {
                let items = set
                    .into_iter()
                    .map(|(label, id)| OptionItem { id, label })
                    .collect();
                (parent, items)
            })
            .collect();

        OptionTree { children }
    }
}

impl FromIterator<(String, Vec<OptionItem>)> for OptionTree {
    fn from_iter<I: IntoIterator<Item = (String, Vec<OptionItem>)>>(iter: I) -> Self {
        OptionTree {
            children: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct CascadeLevel {
    name: String,
    value: Option<String>,
    options: Vec<OptionItem>,
    /// Maps the previous level's value to this level's options. Unused on the
    /// first level.
    tree: OptionTree,
}

/// An ordered chain of dependent selects. Changing a level recomputes the next
/// level's options and clears every level after it.
#[derive(Debug, Clone)]
pub struct CascadeChain {
    levels: Vec<CascadeLevel>,
}

impl CascadeChain {
    pub fn new(root_name: impl Into<String>, root_options: Vec<OptionItem>) -> Self {
        CascadeChain {
            levels: vec![CascadeLevel {
                name: root_name.into(),
                value: None,
                options: root_options,
                tree: OptionTree::new(),
            }],
        }
    }

    /// Append a level whose options are looked up in `tree` by the value of the
    /// level before it.
    pub fn then(mut self, name: impl Into<String>, tree: OptionTree) -> Self {
        self.levels.push(CascadeLevel {
            name: name.into(),
            value: None,
            options: Vec::new(),
            tree,
        });
        self
    }

    /// Build a chain where every level shares one parent -> children tree.
    /// Root options come from the tree's `ROOT` entry when present, otherwise
    /// from the tree's parent ids.
    pub fn from_tree(level_names: &[&str], tree: &OptionTree) -> Result<Self> {
        let (root, rest) = level_names
            .split_first()
            .ok_or_else(|| RosterError::Validation("A cascade needs at least one level".into()))?;

        let roots = match tree.children(OptionTree::ROOT) {
            [] => tree
                .parents()
                .filter(|p| !p.is_empty())
                .map(|p| OptionItem::new(p, p))
                .collect(),
            items => items.to_vec(),
        };

        let mut chain = CascadeChain::new(*root, roots);
        for name in rest {
            chain = chain.then(*name, tree.clone());
        }
        Ok(chain)
    }

    fn index_of(&self, level: &str) -> Result<usize> {
        self.levels
            .iter()
            .position(|l| l.name == level)
            .ok_or_else(|| RosterError::Validation(format!("Unknown cascade level '{level}'")))
    }

    /// Set the value of `level`. `None` or a blank id clears it. The next level
    /// gets the children of the new value; all later levels are cleared.
    /// Re-selecting the current value leaves the chain unchanged.
    pub fn select(&mut self, level: &str, value: Option<&str>) -> Result<()> {
        let index = self.index_of(level)?;
        let value = value.map(str::trim).filter(|v| !v.is_empty());

        if let Some(v) = value {
            if !self.levels[index].options.iter().any(|o| o.id == v) {
                return Err(RosterError::Validation(format!(
                    "'{v}' is not an option of '{level}'"
                )));
            }
        }

        if self.levels[index].value.as_deref() == value {
            return Ok(());
        }

        log::debug!("cascade: {level} -> {value:?}");
        self.levels[index].value = value.map(str::to_string);
        self.reset_after(index);
        Ok(())
    }

    /// Replace the options of `level` (after a refetch). A current value that
    /// is no longer offered is cleared, and the clear cascades.
    pub fn replace_options(&mut self, level: &str, options: Vec<OptionItem>) -> Result<()> {
        let index = self.index_of(level)?;
        let current = &mut self.levels[index];
        current.options = options;

        let still_offered = current
            .value
            .as_deref()
            .map_or(true, |v| current.options.iter().any(|o| o.id == v));
        if !still_offered {
            current.value = None;
            self.reset_after(index);
        }
        Ok(())
    }

    fn reset_after(&mut self, index: usize) {
        let parent_value = self.levels[index].value.clone();
        for (offset, level) in self.levels.iter_mut().skip(index + 1).enumerate() {
            level.value = None;
            level.options = match (&parent_value, offset) {
                (Some(parent), 0) => level.tree.children(parent).to_vec(),
                _ => Vec::new(),
            };
        }
    }

    pub fn value(&self, level: &str) -> Option<&str> {
        self.levels
            .iter()
            .find(|l| l.name == level)
            .and_then(|l| l.value.as_deref())
    }

    pub fn options(&self, level: &str) -> &[OptionItem] {
        self.levels
            .iter()
            .find(|l| l.name == level)
            .map(|l| l.options.as_slice())
            .unwrap_or(&[])
    }

    pub fn level_names(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map(|l| l.name.as_str())
    }

    /// `(level, value)` for every level that has a value, in chain order.
    pub fn selected(&self) -> Vec<(&str, &str)> {
        self.levels
            .iter()
            .filter_map(|l| l.value.as_deref().map(|v| (l.name.as_str(), v)))
            .collect()
    }
}
