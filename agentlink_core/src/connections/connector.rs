use async_trait::async_trait;

use super::errors::ConnectionError;
use crate::storage::Endpoint;

/// Something that happened on an established link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The peer opened a session over the link.
    SessionOpened,
    /// The open session ended; the link itself is still up.
    SessionClosed,
    /// The peer went away.
    Closed,
}

/// The transport behind a connection handle (plain TCP, TLS, a test fake, ...).
///
/// The handle owns the connector on its own task and drives it through
/// `connect` -> `next_event`* -> `disconnect`.
#[async_trait]
pub trait Connector: Send {
    async fn connect(&mut self) -> Result<(), ConnectionError>;

    /// Waits for the next link event. Must be cancel-safe: the handle races it
    /// against its stop signal.
    async fn next_event(&mut self) -> Result<LinkEvent, ConnectionError>;

    async fn disconnect(&mut self) -> Result<(), ConnectionError>;

    /// Hash of the peer certificate, once the link is secured.
    fn peer_certificate_fingerprint(&self) -> Option<String> {
        None
    }
}

/// Builds a fresh, not-yet-connected connector for an endpoint.
pub trait ConnectorFactory: Send + Sync {
    fn create(&self, endpoint: &Endpoint) -> Box<dyn Connector>;
}
