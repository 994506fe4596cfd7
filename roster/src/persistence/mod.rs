// Persistence collaborator - the contract list views read from and delete through

mod memory;

pub use memory::MemoryBackend;

use crate::error::Result;
use crate::options::OptionTree;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::future::Future;

/// Server-side narrowing passed along with a list request (query string for
/// the REST client, exact field matches for the memory backend).
pub type FilterParams = BTreeMap<String, String>;

/// Durable reads and deletes for list views. Implementations hold no session
/// state between calls.
pub trait Persistence: Send + Sync {
    fn list<R: DeserializeOwned + Send + 'static>(
        &self,
        resource: &str,
        params: &FilterParams,
    ) -> impl Future<Output = Result<Vec<R>>> + Send;

    fn delete_by_id(&self, resource: &str, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Parent id -> child options, for cascading selects.
    fn fetch_option_tree(&self, resource: &str) -> impl Future<Output = Result<OptionTree>> + Send;
}
