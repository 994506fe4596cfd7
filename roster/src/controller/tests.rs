use super::*;
use crate::config::parse_config_str;
use crate::notify::{Notification, RecordingNotifier};
use crate::options::OptionTree;
use crate::persistence::MemoryBackend;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

type Controller = ListViewController<Value, MemoryBackend, RecordingNotifier>;

fn routines() -> Vec<Value> {
    vec![
        json!({ "id": 1, "day": "Monday", "subject": { "name": "Math" }, "class": "1", "section": "A" }),
        json!({ "id": 2, "day": "Tuesday", "subject": { "name": "English" }, "class": "1", "section": "B" }),
        json!({ "id": 3, "day": "Monday", "subject": { "name": "Biology" }, "class": "2", "section": "A" }),
        json!({ "id": 4, "day": "Wednesday", "subject": { "name": "art" }, "class": "2", "section": "B" }),
        json!({ "id": 5, "day": "Monday", "subject": { "name": "Chemistry" }, "class": "3", "section": "A" }),
    ]
}

fn controller(rows: Vec<Value>) -> (Controller, MemoryBackend, RecordingNotifier) {
    let backend = MemoryBackend::new().with_rows("routine", rows.clone());
    let notifier = RecordingNotifier::new();
    let mut controller = ListViewController::new("routine", backend.clone(), notifier.clone())
        .with_noun("routines")
        .with_search(&["day", "subject.name"])
        .with_filter("day", FilterDef::Equals("day".into()))
        .with_filter("class", FilterDef::Equals("class".into()))
        .with_filter("section", FilterDef::Equals("section".into()))
        .with_sort("subject", "subject.name")
        .with_page_size(2)
        .unwrap();
    controller.set_rows(rows);
    (controller, backend, notifier)
}

fn ids(rows: &[&Value]) -> Vec<String> {
    rows.iter().map(|r| r.id()).collect()
}

fn strings(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_initial_snapshot() {
    let (c, _, _) = controller(routines());
    let snap = c.snapshot();
    assert_eq!(ids(&snap.rows), strings(&["1", "2"]));
    assert_eq!(snap.page_index, 1);
    assert_eq!(snap.total_pages, 3);
    assert_eq!(snap.total_filtered, 5);
    assert_eq!(snap.total_rows, 5);
    assert_eq!(snap.selected_count, 0);
    assert!(!snap.all_visible_selected);
}

#[test]
fn test_filter_sort_and_page_compose() {
    let (mut c, _, _) = controller(routines());
    c.set_filter("day", "monday").unwrap();
    c.set_sort("subject", SortDirection::Asc).unwrap();
    assert_eq!(ids(&c.filtered_rows()), strings(&["3", "5", "1"]));
    assert_eq!(ids(&c.visible_rows()), strings(&["3", "5"]));

    c.next_page();
    assert_eq!(ids(&c.visible_rows()), strings(&["1"]));
    c.next_page();
    assert_eq!(c.page_index(), 2);
}

#[test]
fn test_sort_is_case_insensitive_and_reversible() {
    let (mut c, _, _) = controller(routines());
    c.set_page_size(10).unwrap();
    c.set_sort("subject", SortDirection::Asc).unwrap();
    assert_eq!(ids(&c.visible_rows()), strings(&["4", "3", "5", "2", "1"]));
    c.set_sort("subject", SortDirection::Desc).unwrap();
    assert_eq!(ids(&c.visible_rows()), strings(&["1", "2", "5", "3", "4"]));
    c.clear_sort();
    assert_eq!(ids(&c.visible_rows()), strings(&["1", "2", "3", "4", "5"]));
}

#[test]
fn test_search_matches_any_field() {
    let (mut c, _, _) = controller(routines());
    c.set_filter(SEARCH_FILTER, "CHEM").unwrap();
    assert_eq!(ids(&c.filtered_rows()), strings(&["5"]));
    c.set_filter(SEARCH_FILTER, "day").unwrap();
    assert_eq!(c.total_filtered(), 5);
    c.clear_filters();
    assert_eq!(c.total_filtered(), 5);
}

#[test]
fn test_state_changes_reset_page() {
    let (mut c, _, _) = controller(routines());

    c.set_page(3);
    c.set_filter("class", "all").unwrap();
    assert_eq!(c.page_index(), 1);

    c.set_page(3);
    c.set_sort("subject", SortDirection::Desc).unwrap();
    assert_eq!(c.page_index(), 1);

    c.set_page(2);
    c.set_page_size(3).unwrap();
    assert_eq!(c.page_index(), 1);
}

#[test]
fn test_page_is_clamped() {
    let (mut c, _, _) = controller(routines());
    c.set_page(99);
    assert_eq!(c.page_index(), 3);
    c.set_page(0);
    assert_eq!(c.page_index(), 1);
    c.prev_page();
    assert_eq!(c.page_index(), 1);

    let (mut empty, _, _) = controller(Vec::new());
    empty.next_page();
    let snap = empty.snapshot();
    assert_eq!(snap.page_index, 1);
    assert_eq!(snap.total_pages, 1);
    assert!(snap.rows.is_empty());
}

#[test]
fn test_shrinking_collection_clamps_page() {
    let (mut c, _, _) = controller(routines());
    c.set_page(3);
    c.set_rows(routines().into_iter().take(2).collect());
    assert_eq!(c.page_index(), 1);
}

#[test]
fn test_rejects_bad_settings() {
    let (mut c, _, _) = controller(routines());
    assert!(matches!(c.set_page_size(0), Err(RosterError::Validation(_))));
    assert_eq!(c.page_size(), 2);
    assert!(matches!(
        c.set_sort("teacher", SortDirection::Asc),
        Err(RosterError::Validation(_))
    ));
    assert!(c.active_sort().is_none());
    assert!(matches!(
        c.set_filter("house", "red"),
        Err(RosterError::Validation(_))
    ));
    assert!(matches!(
        c.set_filter("day", FilterValue::parse_range("2024-01-01..").unwrap()),
        Err(RosterError::Validation(_))
    ));
}

#[test]
fn test_page_size_choices() {
    let (c, _, _) = controller(routines());
    let mut c = c.with_page_sizes(&[2, 5]).unwrap();
    assert!(c.set_page_size(5).is_ok());
    assert!(matches!(c.set_page_size(3), Err(RosterError::Validation(_))));
    assert_eq!(c.page_size(), 5);
}

#[test]
fn test_select_all_is_page_scoped() {
    let (mut c, _, _) = controller(routines());
    c.select_all_visible(true);
    assert_eq!(c.selection().ids(), strings(&["1", "2"]));
    assert!(c.snapshot().all_visible_selected);

    c.next_page();
    assert!(!c.snapshot().all_visible_selected);
    assert_eq!(c.selection().len(), 2);

    c.select_all_visible(true);
    assert_eq!(c.selection().ids(), strings(&["3", "4"]));

    c.select_all_visible(false);
    assert!(c.selection().is_empty());
}

#[test]
fn test_toggle_select_ignores_unknown_ids() {
    let (mut c, _, _) = controller(routines());
    c.toggle_select("4", true);
    c.toggle_select("42", true);
    assert_eq!(c.selection().ids(), strings(&["4"]));
    c.toggle_select("4", false);
    assert!(c.selection().is_empty());
}

#[test]
fn test_filter_prunes_selection() {
    let (mut c, _, _) = controller(routines());
    c.toggle_select("1", true);
    c.toggle_select("2", true);
    c.set_filter("day", "Monday").unwrap();
    assert_eq!(c.selection().ids(), strings(&["1"]));
}

#[test]
fn test_status_counts_ignore_filters() {
    let (mut c, _, _) = controller(routines());
    c.set_filter("day", "Tuesday").unwrap();
    let counts = c.status_counts("day");
    assert_eq!(counts["Monday"], 3);
    assert_eq!(counts["Tuesday"], 1);
    assert_eq!(counts["Wednesday"], 1);
}

#[tokio::test]
async fn test_bulk_delete_success() {
    let rows = routines().into_iter().take(3).collect::<Vec<_>>();
    let (mut c, backend, notifier) = controller(rows);
    c.toggle_select("1", true);
    c.toggle_select("3", true);
    c.open_bulk_delete_dialog();

    let outcome = c.confirm_bulk_delete().await.unwrap().unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.deleted, strings(&["1", "3"]));

    assert_eq!(ids(&c.rows().iter().collect::<Vec<_>>()), strings(&["2"]));
    assert!(c.selection().is_empty());
    assert!(!c.is_bulk_dialog_open());
    assert_eq!(backend.rows("routine").len(), 1);
    assert_eq!(
        notifier.take(),
        vec![Notification {
            level: NotificationLevel::Success,
            message: "2 routines deleted successfully".into(),
        }]
    );
}

#[tokio::test]
async fn test_bulk_delete_partial_failure_reconciles() {
    let rows = routines().into_iter().take(3).collect::<Vec<_>>();
    let (mut c, backend, notifier) = controller(rows);
    backend.fail_on("3");
    c.toggle_select("1", true);
    c.toggle_select("3", true);
    c.open_bulk_delete_dialog();

    let outcome = c.confirm_bulk_delete().await.unwrap().unwrap();
    assert_eq!(outcome.deleted, strings(&["1"]));
    assert_eq!(outcome.failed, strings(&["3"]));
    assert!(matches!(
        outcome.error,
        Some(RosterError::PartialBulkFailure { .. })
    ));

    assert_eq!(ids(&c.rows().iter().collect::<Vec<_>>()), strings(&["2", "3"]));
    assert_eq!(c.selection().ids(), strings(&["3"]));
    assert!(c.is_bulk_dialog_open());

    let last = notifier.last().unwrap();
    assert_eq!(last.level, NotificationLevel::Warning);
    assert_eq!(
        last.message,
        "Deleted 1 of 2 routines; 1 could not be deleted. Please try again."
    );
    assert_eq!(backend.delete_calls().len(), 2);
}

#[tokio::test]
async fn test_bulk_delete_total_failure() {
    let (mut c, backend, notifier) = controller(routines());
    backend.set_offline(true);
    let outcome = c.request_delete_many(&["1", "2"]).await.unwrap();
    assert!(outcome.deleted.is_empty());
    assert_eq!(c.rows().len(), 5);

    let last = notifier.last().unwrap();
    assert_eq!(last.level, NotificationLevel::Error);
    assert_eq!(
        last.message,
        "Failed to delete some or all routines. Please try again."
    );
}

#[tokio::test]
async fn test_bulk_delete_dedupes_and_validates() {
    let (mut c, backend, _) = controller(routines());
    let outcome = c.request_delete_many(&["2", "2"]).await.unwrap();
    assert_eq!(outcome.deleted, strings(&["2"]));
    assert_eq!(backend.delete_calls().len(), 1);

    let empty: [&str; 0] = [];
    assert!(matches!(
        c.request_delete_many(&empty).await,
        Err(RosterError::Validation(_))
    ));
    assert!(matches!(
        c.request_delete_many(&["1", "99"]).await,
        Err(RosterError::Validation(_))
    ));
    assert_eq!(backend.delete_calls().len(), 1);
    assert_eq!(c.confirm_bulk_delete().await.unwrap().map(|o| o.deleted), None);
}

#[tokio::test]
async fn test_single_delete_success() {
    let (mut c, backend, notifier) = controller(routines());
    c.toggle_select("2", true);
    c.open_delete_dialog("2");
    assert_eq!(c.pending_delete(), Some("2"));

    let outcome = c.confirm_delete().await.unwrap().unwrap();
    assert!(outcome.is_success());
    assert_eq!(c.rows().len(), 4);
    assert!(c.selection().is_empty());
    assert_eq!(c.pending_delete(), None);
    assert_eq!(backend.rows("routine").len(), 4);
    assert_eq!(notifier.last().unwrap().message, "Routine deleted successfully");
}

#[tokio::test]
async fn test_single_delete_failure_keeps_row() {
    let (mut c, backend, notifier) = controller(routines());
    backend.fail_on("2");
    c.open_delete_dialog("2");

    let outcome = c.confirm_delete().await.unwrap().unwrap();
    assert!(matches!(
        outcome.error,
        Some(RosterError::Server { status: 500, .. })
    ));
    assert_eq!(c.rows().len(), 5);
    assert_eq!(c.pending_delete(), Some("2"));
    assert_eq!(
        notifier.last(),
        Some(Notification {
            level: NotificationLevel::Error,
            message: "Something went wrong, please try again.".into(),
        })
    );

    c.close_delete_dialog();
    assert!(c.confirm_delete().await.unwrap().is_none());
}

#[tokio::test]
async fn test_single_delete_unknown_id() {
    let (mut c, backend, _) = controller(routines());
    assert!(matches!(
        c.request_delete_one("77").await,
        Err(RosterError::Validation(_))
    ));
    assert!(backend.delete_calls().is_empty());
}

#[tokio::test]
async fn test_refresh_replaces_rows() {
    let (mut c, _, _) = controller(routines());
    c.set_rows(Vec::new());
    let count = c.refresh(&FilterParams::new()).await.unwrap();
    assert_eq!(count, 5);

    let params = FilterParams::from([("day".to_string(), "Monday".to_string())]);
    assert_eq!(c.refresh(&params).await.unwrap(), 3);
    assert_eq!(c.snapshot().total_rows, 3);
}

#[tokio::test]
async fn test_refresh_failure_keeps_rows() {
    let (mut c, backend, notifier) = controller(routines());
    backend.set_offline(true);
    assert!(matches!(
        c.refresh(&FilterParams::new()).await,
        Err(RosterError::Network(_))
    ));
    assert_eq!(c.rows().len(), 5);
    assert_eq!(notifier.last().unwrap().message, "Failed to load routines");
}

fn class_tree() -> OptionTree {
    let mut tree = OptionTree::new();
    tree.insert(
        OptionTree::ROOT,
        vec![OptionItem::new("1", "Class 1"), OptionItem::new("2", "Class 2")],
    );
    tree.insert(
        "1",
        vec![OptionItem::new("A", "Section A"), OptionItem::new("B", "Section B")],
    );
    tree.insert("2", vec![OptionItem::new("A", "Section A")]);
    tree
}

#[tokio::test]
async fn test_cascade_drives_filters() {
    let (c, backend, _) = controller(routines());
    let _ = backend.with_tree("class-tree", class_tree());
    let mut c = c.with_cascade_source("class-tree", &strings(&["class", "section"]));
    c.load_cascade().await.unwrap();
    assert_eq!(c.cascade_options("class").len(), 2);
    assert!(c.cascade_options("section").is_empty());

    c.select_option("class", Some("1")).unwrap();
    assert_eq!(ids(&c.filtered_rows()), strings(&["1", "2"]));
    assert_eq!(c.cascade_options("section").len(), 2);

    c.select_option("section", Some("B")).unwrap();
    assert_eq!(ids(&c.filtered_rows()), strings(&["2"]));

    // Changing the parent clears the dependent level and its filter
    c.select_option("class", Some("2")).unwrap();
    assert_eq!(c.filter_value("section"), Some(&FilterValue::Any));
    assert_eq!(ids(&c.filtered_rows()), strings(&["3", "4"]));

    c.select_option("class", None).unwrap();
    assert_eq!(c.total_filtered(), 5);
    assert!(matches!(
        c.select_option("section", Some("Z")),
        Err(RosterError::Validation(_))
    ));
}

#[tokio::test]
async fn test_cascade_load_failure() {
    let (c, _, notifier) = controller(routines());
    let mut c = c.with_cascade_source("missing-tree", &strings(&["class"]));
    assert!(c.load_cascade().await.is_err());
    assert_eq!(notifier.last().unwrap().level, NotificationLevel::Error);
    assert!(c.cascade().is_none());
}

#[test]
fn test_from_config() {
    let config = parse_config_str(
        r#"
views:
  routines:
    resource: routine
    noun: routines
    page_size: 2
    page_sizes: [2, 10]
    search: [subject.name]
    filters:
      day: { kind: equals, field: day }
    sorts:
      subject: { field: subject.name }
    default_sort: { key: subject, direction: desc }
"#,
    )
    .unwrap();
    let view = config.view("routines").unwrap();

    let mut c = Controller::from_config(view, MemoryBackend::new(), RecordingNotifier::new())
        .unwrap();
    c.set_rows(routines());
    assert_eq!(c.resource(), "routine");
    assert_eq!(c.active_sort(), Some(("subject", SortDirection::Desc)));
    assert_eq!(ids(&c.visible_rows()), strings(&["1", "2"]));

    c.set_filter("day", "monday").unwrap();
    c.set_filter(SEARCH_FILTER, "i").unwrap();
    assert_eq!(ids(&c.filtered_rows()), strings(&["5", "3"]));
    assert!(c.set_page_size(5).is_err());
}

#[test]
fn test_custom_sort_and_filter() {
    let (c, _, _) = controller(routines());
    let mut c = c
        .with_sort_by("id_desc", |row: &Value| {
            FieldValue::Number(-(row.field("id").as_text().parse::<f64>().unwrap_or(0.0)))
        })
        .with_filter(
            "odd",
            FilterDef::custom(|row: &Value, value| {
                value.is_active() && row.id().parse::<u32>().map_or(false, |n| n % 2 == 1)
            }),
        );
    c.set_sort("id_desc", SortDirection::Asc).unwrap();
    c.set_filter("odd", "yes").unwrap();
    assert_eq!(ids(&c.filtered_rows()), strings(&["5", "3", "1"]));
}
