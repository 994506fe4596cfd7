use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Bulk delete partially failed: {} deleted, {} failed", deleted.len(), failed.len())]
    PartialBulkFailure {
        deleted: Vec<String>,
        failed: Vec<String>,
    },

    #[error("Record not found: {resource}/{id}")]
    NotFound { resource: String, id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl RosterError {
    /// True for failures that came from the persistence collaborator
    /// (as opposed to caller misuse).
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            RosterError::Network(_) | RosterError::Server { .. } | RosterError::NotFound { .. }
        )
    }
}

impl From<reqwest::Error> for RosterError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RosterError::Server {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => RosterError::Network(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;
