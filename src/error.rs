use thiserror::Error;

/// Failures surfaced by any [`crate::service::DataService`] implementation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ServiceError {
    pub fn list_not_found(id: &str) -> Self {
        ServiceError::NotFound {
            entity: "list",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(error: reqwest::Error) -> Self {
        ServiceError::Transport(crate::unpack_error(&error))
    }
}
