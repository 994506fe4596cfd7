// JSON-over-HTTP persistence collaborator

use crate::config::RestConfig;
use crate::error::{Result, RosterError};
use crate::options::OptionTree;
use crate::persistence::{FilterParams, Persistence};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;

/// REST client for a Django-style API: `GET {base}{path}` lists a resource,
/// `DELETE {base}{path}{id}/` removes one record.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    resources: BTreeMap<String, String>,
}

impl RestClient {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn new(base_url: &str) -> Result<Self> {
        Self::build(base_url, Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS))
    }

    pub fn from_config(config: &RestConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(Self::DEFAULT_TIMEOUT_SECS));
        let mut client = Self::build(&config.base_url, timeout)?;
        for (resource, path) in &config.resources {
            client = client.with_resource(resource, path);
        }
        Ok(client)
    }

    fn build(base_url: &str, timeout: Duration) -> Result<Self> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RosterError::Validation(format!(
                "Base URL must start with http:// or https://, got '{base_url}'"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RosterError::Other(format!("Failed to build HTTP client: {e}")))?;
        Ok(RestClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            resources: BTreeMap::new(),
        })
    }

    /// Map a resource type to its collection path, e.g.
    /// `routine` -> `/api/academic/routine/`.
    pub fn with_resource(mut self, resource: &str, path: &str) -> Self {
        self.resources.insert(resource.to_string(), path.to_string());
        self
    }

    /// Collection URL for `resource`, always ending in `/`. Unmapped resources
    /// default to `/api/{resource}/`.
    pub fn resource_url(&self, resource: &str) -> String {
        let path = self
            .resources
            .get(resource)
            .cloned()
            .unwrap_or_else(|| format!("/api/{resource}/"));
        let path = path.trim_matches('/');
        format!("{}/{}/", self.base_url, path)
    }

    pub fn record_url(&self, resource: &str, id: &str) -> String {
        format!("{}{}/", self.resource_url(resource), id)
    }
}

/// Turn a non-2xx response into `RosterError::Server`, keeping the body text.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(RosterError::Server {
        status: status.as_u16(),
        message,
    })
}

impl Persistence for RestClient {
    async fn list<R: DeserializeOwned + Send + 'static>(
        &self,
        resource: &str,
        params: &FilterParams,
    ) -> Result<Vec<R>> {
        let url = self.resource_url(resource);
        log::debug!("GET {url}");
        let response = self.client.get(&url).query(params).send().await?;
        let rows = check_status(response).await?.json::<Vec<R>>().await?;
        Ok(rows)
    }

    async fn delete_by_id(&self, resource: &str, id: &str) -> Result<()> {
        let url = self.record_url(resource, id);
        log::debug!("DELETE {url}");
        let response = self.client.delete(&url).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn fetch_option_tree(&self, resource: &str) -> Result<OptionTree> {
        let url = self.resource_url(resource);
        log::debug!("GET {url}");
        let response = self.client.get(&url).send().await?;
        let tree = check_status(response).await?.json::<OptionTree>().await?;
        Ok(tree)
    }
}
