// List view controller - filter/sort/page state, selection, and delete reconciliation

mod messages;

use crate::config::{FilterConfig, ViewConfig};
use crate::engine::{
    apply_filters, apply_sort, clamp_page, paginate, total_pages, PageSize, Predicate,
    SortDirection, SortKey,
};
use crate::error::{Result, RosterError};
use crate::filter::{FilterDef, FilterValue};
use crate::notify::{NotificationLevel, Notifier};
use crate::options::{CascadeChain, OptionItem};
use crate::persistence::{FilterParams, Persistence};
use crate::row::{FieldValue, Row};
use crate::selection::SelectionSet;
use futures::future::join_all;
use messages::Nouns;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Key of the free-text search filter registered by `with_search`.
pub const SEARCH_FILTER: &str = "search";

type Extractor<R> = Arc<dyn Fn(&R) -> FieldValue + Send + Sync>;

/// How a named sort pulls its key out of a row.
enum SortField<R> {
    Path(String),
    Extractor(Extractor<R>),
}

impl<R: Row> SortField<R> {
    fn extract(&self, row: &R) -> FieldValue {
        match self {
            SortField::Path(path) => row.field(path),
            SortField::Extractor(f) => f(row),
        }
    }
}

/// Everything a view needs to render the current state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot<'a, R> {
    pub rows: Vec<&'a R>,
    pub page_index: usize,
    pub total_pages: usize,
    pub total_filtered: usize,
    pub total_rows: usize,
    pub selected_ids: Vec<String>,
    pub selected_count: usize,
    pub all_visible_selected: bool,
}

/// Result of a delete intent that reached the persistence collaborator.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
    /// The collaborator error for a single delete, or `PartialBulkFailure`
    /// when any delete of a bulk request failed
    pub error: Option<RosterError>,
}

impl DeleteOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Row index plus row, so the engine's output can be mapped back to positions.
struct Slot<'r, R> {
    index: usize,
    row: &'r R,
}

/// Filter then sort the rows, returning positions into `rows` in display order.
fn derive_order<'r, R: Row>(
    rows: &'r [R],
    filters: &'r BTreeMap<String, FilterDef<R>>,
    values: &'r BTreeMap<String, FilterValue>,
    sort: Option<(&'r SortField<R>, SortDirection)>,
) -> Vec<usize> {
    let slots: Vec<Slot<'r, R>> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| Slot { index, row })
        .collect();
    let slot_refs: Vec<&Slot<'r, R>> = slots.iter().collect();

    let mut predicates: Vec<Predicate<'r, Slot<'r, R>>> = Vec::new();
    for (key, def) in filters {
        let Some(value) = values.get(key) else {
            continue;
        };
        if let Some(predicate) = def.predicate(value) {
            predicates.push(Box::new(move |slot: &Slot<'r, R>| predicate(slot.row)));
        }
    }

    let filtered = apply_filters(&slot_refs, &predicates);
    let key = sort.map(|(field, direction)| {
        SortKey::new(move |slot: &Slot<'r, R>| field.extract(slot.row), direction)
    });

    apply_sort(filtered, key.as_ref())
        .into_iter()
        .map(|slot| slot.index)
        .collect()
}

/// Owns one list view's rows and its filter, sort, page and selection state.
///
/// Any change to rows, filters, sort or page size re-derives the display
/// order once and caches it; reads only slice the cached order. Changing a
/// filter, the sort or the page size returns to page 1.
pub struct ListViewController<R, P, N> {
    resource: String,
    nouns: Nouns,
    rows: Vec<R>,
    filters: BTreeMap<String, FilterDef<R>>,
    filter_values: BTreeMap<String, FilterValue>,
    sorts: BTreeMap<String, SortField<R>>,
    active_sort: Option<(String, SortDirection)>,
    page_size: PageSize,
    page_sizes: Vec<usize>,
    page_index: usize,
    selection: SelectionSet,
    /// Filtered + sorted positions into `rows`
    order: Vec<usize>,
    delete_dialog: Option<String>,
    bulk_dialog_open: bool,
    cascade: Option<CascadeChain>,
    cascade_tree: Option<(String, Vec<String>)>,
    persistence: P,
    notifier: N,
}

impl<R, P, N> ListViewController<R, P, N>
where
    R: Row,
    P: Persistence,
    N: Notifier,
{
    pub fn new(resource: impl Into<String>, persistence: P, notifier: N) -> Self {
        ListViewController {
            resource: resource.into(),
            nouns: Nouns::default(),
            rows: Vec::new(),
            filters: BTreeMap::new(),
            filter_values: BTreeMap::new(),
            sorts: BTreeMap::new(),
            active_sort: None,
            page_size: PageSize::default(),
            page_sizes: Vec::new(),
            page_index: 1,
            selection: SelectionSet::new(),
            order: Vec::new(),
            delete_dialog: None,
            bulk_dialog_open: false,
            cascade: None,
            cascade_tree: None,
            persistence,
            notifier,
        }
    }

    // ── Builder ─────────────────────────────────────────────────────

    /// Singular and plural nouns for notifications ("routine", "routines").
    pub fn with_nouns(mut self, one: &str, many: &str) -> Self {
        self.nouns = Nouns::new(one, many);
        self
    }

    /// Plural noun for notifications; the singular is derived from it.
    pub fn with_noun(self, many: &str) -> Self {
        self.with_nouns(messages::singular(many), many)
    }

    pub fn with_filter(mut self, key: &str, def: FilterDef<R>) -> Self {
        self.filters.insert(key.to_string(), def);
        self
    }

    /// Register the free-text search box under `SEARCH_FILTER`.
    pub fn with_search<S: AsRef<str>>(self, fields: &[S]) -> Self {
        let fields = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self.with_filter(SEARCH_FILTER, FilterDef::Search(fields))
    }

    /// Register a sort on a dotted field path.
    pub fn with_sort(mut self, key: &str, field: &str) -> Self {
        self.sorts
            .insert(key.to_string(), SortField::Path(field.to_string()));
        self
    }

    /// Register a sort with a computed key.
    pub fn with_sort_by(
        mut self,
        key: &str,
        extractor: impl Fn(&R) -> FieldValue + Send + Sync + 'static,
    ) -> Self {
        self.sorts
            .insert(key.to_string(), SortField::Extractor(Arc::new(extractor)));
        self
    }

    pub fn with_page_size(mut self, size: usize) -> Result<Self> {
        self.page_size = PageSize::new(size)?;
        Ok(self)
    }

    /// Restrict `set_page_size` to these choices (the rows-per-page select).
    pub fn with_page_sizes(mut self, sizes: &[usize]) -> Result<Self> {
        if sizes.contains(&0) {
            return Err(RosterError::Validation(
                "Page size choices must be positive".into(),
            ));
        }
        self.page_sizes = sizes.to_vec();
        Ok(self)
    }

    pub fn with_cascade(mut self, chain: CascadeChain) -> Self {
        self.cascade = Some(chain);
        self
    }

    /// Fetch the cascade from `tree_resource` in `load_cascade`.
    pub fn with_cascade_source(mut self, tree_resource: &str, levels: &[String]) -> Self {
        self.cascade_tree = Some((tree_resource.to_string(), levels.to_vec()));
        self
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size.get()
    }

    pub fn filter_value(&self, key: &str) -> Option<&FilterValue> {
        self.filter_values.get(key)
    }

    pub fn active_sort(&self) -> Option<(&str, SortDirection)> {
        self.active_sort
            .as_ref()
            .map(|(key, direction)| (key.as_str(), *direction))
    }

    pub fn cascade(&self) -> Option<&CascadeChain> {
        self.cascade.as_ref()
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.delete_dialog.as_deref()
    }

    pub fn is_bulk_dialog_open(&self) -> bool {
        self.bulk_dialog_open
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    // ── Derived state ───────────────────────────────────────────────

    fn rebuild(&mut self) {
        let sort = self
            .active_sort
            .as_ref()
            .and_then(|(key, direction)| self.sorts.get(key).map(|field| (field, *direction)));
        let order = derive_order(&self.rows, &self.filters, &self.filter_values, sort);
        self.order = order;

        let total = total_pages(self.order.len(), self.page_size);
        self.page_index = clamp_page(self.page_index, total);

        // Rows filtered out or removed cannot stay selected
        let visible: BTreeSet<String> = self.order.iter().map(|&i| self.rows[i].id()).collect();
        self.selection
            .retain_existing(visible.iter().map(String::as_str));

        log::debug!(
            "{}: {} of {} rows after filters, page {}/{}",
            self.resource,
            self.order.len(),
            self.rows.len(),
            self.page_index,
            total
        );
    }

    fn visible_positions(&self) -> &[usize] {
        paginate(&self.order, self.page_size, self.page_index).rows
    }

    /// Rows on the current page, in display order.
    pub fn visible_rows(&self) -> Vec<&R> {
        self.visible_positions()
            .iter()
            .map(|&i| &self.rows[i])
            .collect()
    }

    pub fn visible_ids(&self) -> Vec<String> {
        self.visible_positions()
            .iter()
            .map(|&i| self.rows[i].id())
            .collect()
    }

    /// All rows that pass the filters, in display order.
    pub fn filtered_rows(&self) -> Vec<&R> {
        self.order.iter().map(|&i| &self.rows[i]).collect()
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.order.len(), self.page_size)
    }

    pub fn total_filtered(&self) -> usize {
        self.order.len()
    }

    pub fn snapshot(&self) -> ViewSnapshot<'_, R> {
        let visible_ids = self.visible_ids();
        ViewSnapshot {
            rows: self.visible_rows(),
            page_index: self.page_index,
            total_pages: self.total_pages(),
            total_filtered: self.order.len(),
            total_rows: self.rows.len(),
            selected_ids: self.selection.ids(),
            selected_count: self.selection.len(),
            all_visible_selected: self.selection.is_all_selected(&visible_ids),
        }
    }

    /// Count rows per distinct value of `field` over the whole collection,
    /// ignoring filters (status counters above a table).
    pub fn status_counts(&self, field: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.field(field).as_text()).or_insert(0) += 1;
        }
        counts
    }

    // ── Data ────────────────────────────────────────────────────────

    /// Replace the collection wholesale.
    pub fn set_rows(&mut self, rows: Vec<R>) {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                rows.iter().all(|row| seen.insert(row.id()))
            },
            "row ids must be unique within a collection"
        );
        self.rows = rows;
        self.rebuild();
    }

    // ── Filter / sort / page ────────────────────────────────────────

    pub fn set_filter(&mut self, key: &str, value: impl Into<FilterValue>) -> Result<()> {
        let value = value.into();
        let def = self
            .filters
            .get(key)
            .ok_or_else(|| RosterError::Validation(format!("Unknown filter '{key}'")))?;
        def.validate(key, &value)?;

        log::debug!("{}: filter {key} = {value:?}", self.resource);
        self.filter_values.insert(key.to_string(), value);
        self.page_index = 1;
        self.rebuild();
        Ok(())
    }

    pub fn clear_filter(&mut self, key: &str) -> Result<()> {
        self.set_filter(key, FilterValue::Any)
    }

    pub fn clear_filters(&mut self) {
        self.filter_values.clear();
        self.page_index = 1;
        self.rebuild();
    }

    pub fn set_sort(&mut self, key: &str, direction: SortDirection) -> Result<()> {
        if !self.sorts.contains_key(key) {
            return Err(RosterError::Validation(format!("Unknown sort key '{key}'")));
        }
        log::debug!("{}: sort {key} {direction:?}", self.resource);
        self.active_sort = Some((key.to_string(), direction));
        self.page_index = 1;
        self.rebuild();
        Ok(())
    }

    pub fn clear_sort(&mut self) {
        self.active_sort = None;
        self.page_index = 1;
        self.rebuild();
    }

    /// Move to a 1-based page, clamped into range. Selection is untouched.
    pub fn set_page(&mut self, index: usize) {
        self.page_index = clamp_page(index, self.total_pages());
    }

    pub fn next_page(&mut self) {
        self.set_page(self.page_index + 1);
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.page_index.saturating_sub(1));
    }

    pub fn set_page_size(&mut self, size: usize) -> Result<()> {
        let page_size = PageSize::new(size)?;
        if !self.page_sizes.is_empty() && !self.page_sizes.contains(&size) {
            return Err(RosterError::Validation(format!(
                "Page size {size} is not one of {:?}",
                self.page_sizes
            )));
        }
        self.page_size = page_size;
        self.page_index = 1;
        self.rebuild();
        Ok(())
    }

    // ── Selection ───────────────────────────────────────────────────

    /// Check or uncheck one row. Ids outside the filtered collection are ignored.
    pub fn toggle_select(&mut self, id: &str, checked: bool) {
        if checked && !self.order.iter().any(|&i| self.rows[i].id() == id) {
            log::debug!("{}: ignoring selection of unknown id {id}", self.resource);
            return;
        }
        self.selection.toggle(id, checked);
    }

    /// Header checkbox: select exactly the current page, or clear everything.
    pub fn select_all_visible(&mut self, checked: bool) {
        if checked {
            let ids = self.visible_ids();
            self.selection.select_all(ids);
        } else {
            self.selection.clear();
        }
    }

    // ── Cascading selects ───────────────────────────────────────────

    /// Set a cascade level. Levels that share a name with a registered filter
    /// drive that filter, so clearing a parent also clears its dependents'
    /// filters.
    pub fn select_option(&mut self, level: &str, value: Option<&str>) -> Result<()> {
        let chain = self.cascade.as_mut().ok_or_else(|| {
            RosterError::Validation(format!("{} has no cascading selects", self.resource))
        })?;
        chain.select(level, value)?;
        let chain: &CascadeChain = chain;

        let updates: Vec<(String, FilterValue)> = chain
            .level_names()
            .filter(|name| self.filters.contains_key(*name))
            .map(|name| {
                let value = chain
                    .value(name)
                    .map_or(FilterValue::Any, FilterValue::from);
                (name.to_string(), value)
            })
            .collect();

        for (key, value) in updates {
            self.filter_values.insert(key, value);
        }
        self.page_index = 1;
        self.rebuild();
        Ok(())
    }

    pub fn cascade_options(&self, level: &str) -> &[OptionItem] {
        self.cascade
            .as_ref()
            .map(|chain| chain.options(level))
            .unwrap_or(&[])
    }

    /// Fetch the option tree named by `with_cascade_source` once and build the
    /// chain from it. Later selections are in-memory lookups.
    pub async fn load_cascade(&mut self) -> Result<()> {
        let (tree_resource, levels) = self.cascade_tree.clone().ok_or_else(|| {
            RosterError::Validation(format!("{} has no cascade source", self.resource))
        })?;

        match self.persistence.fetch_option_tree(&tree_resource).await {
            Ok(tree) => {
                let names: Vec<&str> = levels.iter().map(String::as_str).collect();
                self.cascade = Some(CascadeChain::from_tree(&names, &tree)?);
                log::info!(
                    "{}: loaded option tree {tree_resource} ({} parents)",
                    self.resource,
                    tree.len()
                );
                Ok(())
            }
            Err(e) => {
                log_failure(&self.resource, "load options", &e);
                self.notifier
                    .notify(NotificationLevel::Error, &messages::load_options_failed());
                Err(e)
            }
        }
    }

    // ── Dialogs ─────────────────────────────────────────────────────

    pub fn open_delete_dialog(&mut self, id: &str) {
        self.delete_dialog = Some(id.to_string());
    }

    pub fn close_delete_dialog(&mut self) {
        self.delete_dialog = None;
    }

    pub fn open_bulk_delete_dialog(&mut self) {
        self.bulk_dialog_open = true;
    }

    pub fn close_bulk_delete_dialog(&mut self) {
        self.bulk_dialog_open = false;
    }

    /// Delete the row the single-delete dialog was opened for. `None` if no
    /// dialog is pending.
    pub async fn confirm_delete(&mut self) -> Result<Option<DeleteOutcome>> {
        let Some(id) = self.delete_dialog.clone() else {
            return Ok(None);
        };
        self.request_delete_one(&id).await.map(Some)
    }

    /// Delete the current selection. `None` if nothing is selected.
    pub async fn confirm_bulk_delete(&mut self) -> Result<Option<DeleteOutcome>> {
        let ids = self.selection.ids();
        if ids.is_empty() {
            return Ok(None);
        }
        self.request_delete_many(&ids).await.map(Some)
    }

    // ── Mutations ───────────────────────────────────────────────────

    fn ensure_known(&self, id: &str) -> Result<()> {
        if self.rows.iter().any(|row| row.id() == id) {
            Ok(())
        } else {
            Err(RosterError::Validation(format!(
                "No {} with id '{id}' in this view",
                self.nouns.one()
            )))
        }
    }

    fn remove_rows(&mut self, ids: &BTreeSet<&str>) {
        self.rows.retain(|row| !ids.contains(row.id().as_str()));
        for id in ids {
            self.selection.remove(id);
        }
        self.rebuild();
    }

    /// Delete one row through the collaborator.
    ///
    /// `Err` only for ids this view does not hold. Collaborator failures are
    /// notified and reported in the outcome; the collection is left untouched
    /// and the dialog stays open.
    pub async fn request_delete_one(&mut self, id: &str) -> Result<DeleteOutcome> {
        self.ensure_known(id)?;

        match self.persistence.delete_by_id(&self.resource, id).await {
            Ok(()) => {
                log::info!("{}: deleted {id}", self.resource);
                self.remove_rows(&BTreeSet::from([id]));
                if self.delete_dialog.as_deref() == Some(id) {
                    self.delete_dialog = None;
                }
                self.notifier
                    .notify(NotificationLevel::Success, &self.nouns.deleted_one());
                Ok(DeleteOutcome {
                    deleted: vec![id.to_string()],
                    failed: Vec::new(),
                    error: None,
                })
            }
            Err(e) => {
                log_failure(&self.resource, &format!("delete {id}"), &e);
                self.notifier
                    .notify(NotificationLevel::Error, &messages::generic_failure());
                Ok(DeleteOutcome {
                    deleted: Vec::new(),
                    failed: vec![id.to_string()],
                    error: Some(e),
                })
            }
        }
    }

    /// Delete several rows, issuing every call at once and waiting for all.
    ///
    /// Ids whose delete succeeded are removed from the collection and the
    /// selection even when others failed; failed ids stay. The bulk dialog
    /// closes only when every delete succeeded.
    pub async fn request_delete_many<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<DeleteOutcome> {
        let mut unique: Vec<&str> = Vec::new();
        for id in ids {
            let id = id.as_ref();
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        if unique.is_empty() {
            return Err(RosterError::Validation("Nothing to delete".into()));
        }
        for id in &unique {
            self.ensure_known(id)?;
        }

        let results = {
            let persistence = &self.persistence;
            let resource = self.resource.as_str();
            join_all(unique.iter().map(|id| persistence.delete_by_id(resource, id))).await
        };

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for (id, result) in unique.iter().zip(results) {
            match result {
                Ok(()) => deleted.push(id.to_string()),
                Err(e) => {
                    log_failure(&self.resource, &format!("delete {id}"), &e);
                    failed.push(id.to_string());
                }
            }
        }

        if !deleted.is_empty() {
            let removed: BTreeSet<&str> = deleted.iter().map(String::as_str).collect();
            self.remove_rows(&removed);
        }

        let total = unique.len();
        if failed.is_empty() {
            log::info!("{}: deleted {total} rows", self.resource);
            self.bulk_dialog_open = false;
            self.notifier.notify(
                NotificationLevel::Success,
                &self.nouns.deleted_many(deleted.len()),
            );
            return Ok(DeleteOutcome {
                deleted,
                failed,
                error: None,
            });
        }

        if deleted.is_empty() {
            self.notifier
                .notify(NotificationLevel::Error, &self.nouns.bulk_failure());
        } else {
            self.notifier.notify(
                NotificationLevel::Warning,
                &self.nouns.bulk_partial(deleted.len(), total),
            );
        }

        Ok(DeleteOutcome {
            error: Some(RosterError::PartialBulkFailure {
                deleted: deleted.clone(),
                failed: failed.clone(),
            }),
            deleted,
            failed,
        })
    }
}

impl<R, P, N> ListViewController<R, P, N>
where
    R: Row + DeserializeOwned + Send + 'static,
    P: Persistence,
    N: Notifier,
{
    /// Fetch the collection and replace the rows. On failure the previous rows
    /// stay, an error is notified, and the error is returned.
    pub async fn refresh(&mut self, params: &FilterParams) -> Result<usize> {
        match self.persistence.list::<R>(&self.resource, params).await {
            Ok(rows) => {
                let count = rows.len();
                log::info!("{}: fetched {count} rows", self.resource);
                self.set_rows(rows);
                Ok(count)
            }
            Err(e) => {
                log_failure(&self.resource, "fetch", &e);
                self.notifier
                    .notify(NotificationLevel::Error, &self.nouns.load_failure());
                Err(e)
            }
        }
    }
}

impl<P, N> ListViewController<serde_json::Value, P, N>
where
    P: Persistence,
    N: Notifier,
{
    /// Build a controller for dynamic JSON rows from a view definition.
    pub fn from_config(view: &ViewConfig, persistence: P, notifier: N) -> Result<Self> {
        view.validate(&view.resource)?;

        let mut controller = ListViewController::new(view.resource.clone(), persistence, notifier)
            .with_noun(view.noun())
            .with_page_size(view.page_size)?
            .with_page_sizes(&view.page_sizes)?;

        if !view.search.is_empty() {
            controller = controller.with_search(view.search.as_slice());
        }
        for (key, filter) in &view.filters {
            let def = match filter {
                FilterConfig::Equals { field } => FilterDef::Equals(field.clone()),
                FilterConfig::DateRange { field } => FilterDef::DateRange(field.clone()),
                FilterConfig::Search { fields } => FilterDef::Search(fields.clone()),
            };
            controller = controller.with_filter(key, def);
        }
        for (key, sort) in &view.sorts {
            controller = controller.with_sort(key, &sort.field);
        }
        if let Some(cascade) = &view.cascade {
            controller = controller.with_cascade_source(&cascade.tree, &cascade.levels);
        }
        if let Some(default_sort) = &view.default_sort {
            controller.set_sort(&default_sort.key, default_sort.direction)?;
        }
        Ok(controller)
    }
}

/// Log a collaborator failure with its kind. Users only see generic text.
fn log_failure(resource: &str, action: &str, error: &RosterError) {
    match error {
        RosterError::Network(msg) => log::warn!("{resource}: {action} failed (network): {msg}"),
        RosterError::Server { status, message } => {
            log::warn!("{resource}: {action} failed (server {status}): {message}")
        }
        other => log::warn!("{resource}: {action} failed: {other}"),
    }
}

#[cfg(test)]
mod tests;
