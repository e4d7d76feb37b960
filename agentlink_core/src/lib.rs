pub mod connections;
pub mod core;
pub mod storage;
pub mod utils;

// re‑export ergonomic entry points
pub use crate::core::client::SupervisorClient;
pub use crate::core::config::SupervisorConfig;
pub use crate::core::errors::SupervisorError;
pub use crate::core::events::{LogRecord, Notice};
pub use crate::core::protocol::{DetailedStatus, Reply, ReplyTo, Request, StatusSnapshot};
pub use crate::core::supervisor::{StartOutcome, StopOutcome, Supervisor};
pub use storage::{Endpoint, EndpointId, EndpointRegistry, JsonEndpointStore, NewEndpoint, Status};
