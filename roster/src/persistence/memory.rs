use super::{FilterParams, Persistence};
use crate::error::{Result, RosterError};
use crate::options::OptionTree;
use crate::row::Row;
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    resources: HashMap<String, Vec<serde_json::Value>>,
    trees: HashMap<String, OptionTree>,
    failing: BTreeSet<String>,
    offline: bool,
    delete_calls: Vec<(String, String)>,
}

/// In-process backend holding JSON rows per resource type.
///
/// Clones share state, so a test can keep a handle while a controller owns
/// another. Failures can be injected per id or for the whole backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn with_rows(self, resource: &str, rows: Vec<serde_json::Value>) -> Self {
        self.state().resources.insert(resource.to_string(), rows);
        self
    }

    pub fn with_tree(self, resource: &str, tree: OptionTree) -> Self {
        self.state().trees.insert(resource.to_string(), tree);
        self
    }

    /// Load a JSON array of rows from a file.
    pub fn from_json_file(resource: &str, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let rows: Vec<serde_json::Value> = serde_json::from_str(&content)?;
        log::debug!("loaded {} {resource} rows from {}", rows.len(), path.display());
        Ok(MemoryBackend::new().with_rows(resource, rows))
    }

    /// Make every later delete of `id` fail with a server error.
    pub fn fail_on(&self, id: &str) {
        self.state().failing.insert(id.to_string());
    }

    /// Simulate the transport being down.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    pub fn rows(&self, resource: &str) -> Vec<serde_json::Value> {
        self.state()
            .resources
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }

    /// `(resource, id)` of every delete attempted, in call order.
    pub fn delete_calls(&self) -> Vec<(String, String)> {
        self.state().delete_calls.clone()
    }

    pub fn save_json_file(&self, resource: &str, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.rows(resource))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn offline_error() -> RosterError {
    RosterError::Network("backend is offline".into())
}

impl Persistence for MemoryBackend {
    async fn list<R: DeserializeOwned + Send + 'static>(
        &self,
        resource: &str,
        params: &FilterParams,
    ) -> Result<Vec<R>> {
        let rows = {
            let state = self.state();
            if state.offline {
                return Err(offline_error());
            }
            let rows = state.resources.get(resource).ok_or_else(|| RosterError::Server {
                status: 404,
                message: format!("Unknown resource '{resource}'"),
            })?;
            rows.iter()
                .filter(|row| {
                    params
                        .iter()
                        .all(|(field, expected)| row.field(field).as_text() == *expected)
                })
                .cloned()
                .collect::<Vec<_>>()
        };

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(RosterError::from))
            .collect()
    }

    async fn delete_by_id(&self, resource: &str, id: &str) -> Result<()> {
        let mut state = self.state();
        state
            .delete_calls
            .push((resource.to_string(), id.to_string()));

        if state.offline {
            return Err(offline_error());
        }
        if state.failing.contains(id) {
            return Err(RosterError::Server {
                status: 500,
                message: format!("Failed to delete {resource}/{id}"),
            });
        }

        let rows = state
            .resources
            .get_mut(resource)
            .ok_or_else(|| RosterError::NotFound {
                resource: resource.to_string(),
                id: id.to_string(),
            })?;
        let before = rows.len();
        rows.retain(|row| row.id() != id);
        if rows.len() == before {
            return Err(RosterError::NotFound {
                resource: resource.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_option_tree(&self, resource: &str) -> Result<OptionTree> {
        let state = self.state();
        if state.offline {
            return Err(offline_error());
        }
        state
            .trees
            .get(resource)
            .cloned()
            .ok_or_else(|| RosterError::Server {
                status: 404,
                message: format!("Unknown option tree '{resource}'"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn backend() -> MemoryBackend {
        MemoryBackend::new().with_rows(
            "routine",
            vec![
                json!({ "id": "1", "school_class": { "id": "C1" } }),
                json!({ "id": "2", "school_class": { "id": "C2" } }),
            ],
        )
    }

    #[tokio::test]
    async fn test_list_applies_params() {
        let backend = backend();
        let mut params = FilterParams::new();
        params.insert("school_class.id".into(), "C2".into());
        let rows: Vec<Value> = backend.list("routine", &params).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id(), "2");
    }

    #[tokio::test]
    async fn test_delete_removes_row_and_records_call() {
        let backend = backend();
        backend.delete_by_id("routine", "1").await.unwrap();
        assert_eq!(backend.rows("routine").len(), 1);
        assert_eq!(
            backend.delete_calls(),
            vec![("routine".to_string(), "1".to_string())]
        );

        let missing = backend.delete_by_id("routine", "1").await;
        assert!(matches!(missing, Err(RosterError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let backend = backend();
        backend.fail_on("2");
        assert!(matches!(
            backend.delete_by_id("routine", "2").await,
            Err(RosterError::Server { status: 500, .. })
        ));

        backend.set_offline(true);
        let listed: Result<Vec<Value>> = backend.list("routine", &FilterParams::new()).await;
        assert!(matches!(listed, Err(RosterError::Network(_))));
        assert!(backend.fetch_option_tree("class-tree").await.is_err());
    }

    #[test]
    fn test_json_file_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("routine.json");
        backend().save_json_file("routine", &path).unwrap();

        let loaded = MemoryBackend::from_json_file("routine", &path).unwrap();
        assert_eq!(loaded.rows("routine"), backend().rows("routine"));
    }
}
