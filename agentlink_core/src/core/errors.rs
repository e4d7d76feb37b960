use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{EndpointId, RegistryError};

/// Errors surfaced to callers of the supervisor, either as a `Result` or
/// inside a `Reply::Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum SupervisorError {
    #[error("no endpoint with id {endpoint_id}")]
    NotFound { endpoint_id: EndpointId },
    #[error("an endpoint named '{name}' already exists")]
    DuplicateName { name: String },
    #[error("endpoint storage failed: {message}")]
    Storage { message: String },
    #[error("reply channel is closed or full")]
    DeliveryFailure,
    #[error("supervisor is not running")]
    Unavailable,
    #[error("unexpected reply to {request}")]
    UnexpectedReply { request: String },
}

impl From<RegistryError> for SupervisorError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(endpoint_id) => SupervisorError::NotFound { endpoint_id },
            RegistryError::DuplicateName(name) => SupervisorError::DuplicateName { name },
            RegistryError::Storage(e) => SupervisorError::Storage {
                message: e.to_string(),
            },
        }
    }
}
