use std::collections::BTreeSet;

/// Row ids currently checked for a bulk action.
///
/// Select-all is scoped to the ids passed in (the visible page), never to the
/// whole filtered collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection with exactly `visible_ids`.
    pub fn select_all<I, S>(&mut self, visible_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = visible_ids.into_iter().map(Into::into).collect();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn toggle(&mut self, id: &str, checked: bool) {
        if checked {
            self.ids.insert(id.to_string());
        } else {
            self.ids.remove(id);
        }
    }

    /// True iff `visible_ids` is non-empty and every one of them is selected.
    /// Partial selection reads as `false`.
    pub fn is_all_selected<S: AsRef<str>>(&self, visible_ids: &[S]) -> bool {
        !visible_ids.is_empty() && visible_ids.iter().all(|id| self.ids.contains(id.as_ref()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    /// Drop every id not in `surviving`.
    pub fn retain_existing<'a>(&mut self, surviving: impl IntoIterator<Item = &'a str>) {
        let surviving: BTreeSet<&str> = surviving.into_iter().collect();
        self.ids.retain(|id| surviving.contains(id.as_str()));
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}
