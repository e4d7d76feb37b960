//! The request/reply messages spoken between callers and the supervisor.
//!
//! Requests travel to the supervisor with a caller-supplied reply channel
//! (`ReplyTo`). Each request gets exactly one reply on that channel and on no
//! other. Bound subscribers also receive unsolicited `Reply::EndpointsStatus`
//! snapshots on the same kind of channel.
//!
//! Both enums are internally tagged, so a request encodes as
//! `{"kind":"start_endpoint","endpoint_id":1}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::errors::SupervisorError;
use crate::storage::{EndpointId, Status};

/// Where replies (and broadcast snapshots) for one caller go.
pub type ReplyTo = mpsc::Sender<Reply>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    GetDetailedEndpointStatus { endpoint_id: EndpointId },
    GetEndpointsStatus,
    GetSslFingerprint { endpoint_id: EndpointId },
    StartEndpoint { endpoint_id: EndpointId },
    StopEndpoint { endpoint_id: EndpointId },
}

impl Request {
    /// Numeric message code, stable across releases.
    pub const fn code(&self) -> u32 {
        match self {
            Request::GetDetailedEndpointStatus { .. } => 11,
            Request::GetEndpointsStatus => 12,
            Request::GetSslFingerprint { .. } => 13,
            Request::StartEndpoint { .. } => 14,
            Request::StopEndpoint { .. } => 15,
        }
    }

    pub fn endpoint_id(&self) -> Option<EndpointId> {
        match *self {
            Request::GetDetailedEndpointStatus { endpoint_id }
            | Request::GetSslFingerprint { endpoint_id }
            | Request::StartEndpoint { endpoint_id }
            | Request::StopEndpoint { endpoint_id } => Some(endpoint_id),
            Request::GetEndpointsStatus => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    DetailedEndpointStatus(DetailedStatus),
    EndpointsStatus { endpoints: StatusSnapshot },
    SslFingerprint {
        endpoint_id: EndpointId,
        fingerprint: String,
    },
    Failed {
        request: Request,
        error: SupervisorError,
    },
}

/// Reply to `GetDetailedEndpointStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedStatus {
    pub endpoint_id: EndpointId,
    pub enabled: bool,
    pub has_password: bool,
    pub is_ssl: bool,
    pub connected: bool,
    pub has_open_session: bool,
}

/// Status of every registered endpoint, keyed (and ordered) by id.
///
/// Encodes as a list of `{"endpoint_id":1,"status":"ACTIVE"}` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<EndpointStatus>", from = "Vec<EndpointStatus>")]
pub struct StatusSnapshot(BTreeMap<EndpointId, Status>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub endpoint_id: EndpointId,
    pub status: Status,
}

impl From<StatusSnapshot> for Vec<EndpointStatus> {
    fn from(snapshot: StatusSnapshot) -> Self {
        snapshot
            .iter()
            .map(|(endpoint_id, status)| EndpointStatus {
                endpoint_id,
                status,
            })
            .collect()
    }
}

impl From<Vec<EndpointStatus>> for StatusSnapshot {
    fn from(entries: Vec<EndpointStatus>) -> Self {
        entries
            .into_iter()
            .map(|e| (e.endpoint_id, e.status))
            .collect()
    }
}

impl StatusSnapshot {
    pub fn get(&self, id: EndpointId) -> Option<Status> {
        self.0.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EndpointId, Status)> + '_ {
        self.0.iter().map(|(id, status)| (*id, *status))
    }
}

impl FromIterator<(EndpointId, Status)> for StatusSnapshot {
    fn from_iter<I: IntoIterator<Item = (EndpointId, Status)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Hands a reply to its channel without waiting for room.
pub fn deliver(reply_to: &ReplyTo, reply: Reply) -> Result<(), SupervisorError> {
    reply_to
        .try_send(reply)
        .map_err(|_| SupervisorError::DeliveryFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_are_tagged_by_kind() {
        let request = Request::StartEndpoint { endpoint_id: 1 };
        assert_eq!(
            serde_json::to_value(request).unwrap(),
            json!({ "kind": "start_endpoint", "endpoint_id": 1 })
        );
        assert_eq!(request.code(), 14);

        let parsed: Request = serde_json::from_str(r#"{"kind":"get_endpoints_status"}"#).unwrap();
        assert_eq!(parsed, Request::GetEndpointsStatus);
        assert_eq!(parsed.endpoint_id(), None);
    }

    #[test]
    fn snapshot_encodes_as_ordered_entries() {
        let snapshot: StatusSnapshot =
            [(2, Status::Offline), (1, Status::Active)].into_iter().collect();
        let reply = Reply::EndpointsStatus {
            endpoints: snapshot,
        };
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "endpoints_status",
                "endpoints": [
                    { "endpoint_id": 1, "status": "ACTIVE" },
                    { "endpoint_id": 2, "status": "OFFLINE" },
                ],
            })
        );
        let back: Reply = serde_json::from_str(&value.to_string()).unwrap();
        assert_eq!(back, reply);
    }

    #[test]
    fn failures_carry_request_and_error() {
        let reply = Reply::Failed {
            request: Request::GetDetailedEndpointStatus { endpoint_id: 4 },
            error: SupervisorError::NotFound { endpoint_id: 4 },
        };
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["error"], json!({ "error": "not_found", "endpoint_id": 4 }));
        assert_eq!(value["request"]["kind"], "get_detailed_endpoint_status");
    }

    #[tokio::test]
    async fn deliver_fails_on_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = deliver(&tx, Reply::EndpointsStatus {
            endpoints: StatusSnapshot::default(),
        })
        .unwrap_err();
        assert_eq!(err, SupervisorError::DeliveryFailure);
    }
}
