use log::Level;

use super::handle::Generation;
use crate::storage::{EndpointId, Status};

/// A log line produced by a connection handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
}

/// Reported by a connection handle to the supervisor's dispatch loop.
///
/// Every event carries the generation of the handle that sent it so events
/// from a handle that has since been stopped or replaced can be discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleEvent {
    StatusChanged {
        endpoint_id: EndpointId,
        generation: Generation,
        status: Status,
    },
    Log {
        endpoint_id: EndpointId,
        generation: Generation,
        record: LogRecord,
    },
}

impl HandleEvent {
    pub fn endpoint_id(&self) -> EndpointId {
        match self {
            HandleEvent::StatusChanged { endpoint_id, .. } | HandleEvent::Log { endpoint_id, .. } => {
                *endpoint_id
            }
        }
    }

    pub fn generation(&self) -> Generation {
        match self {
            HandleEvent::StatusChanged { generation, .. } | HandleEvent::Log { generation, .. } => {
                *generation
            }
        }
    }
}

/// Transient, human-facing side effects (toasts in a UI, lines in the CLI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Started {
        endpoint_id: EndpointId,
        connection: String,
    },
    Stopped {
        endpoint_id: EndpointId,
        connection: String,
    },
    Log {
        endpoint_id: EndpointId,
        record: LogRecord,
    },
}
