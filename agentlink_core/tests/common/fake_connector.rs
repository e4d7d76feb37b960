//! A deterministic **in‑process stand‑in** for a transport, implementing
//! `agentlink_core::connections::Connector`.
//!
//! *  **From the test’s perspective**
//!    * Every connector the supervisor asks for shows up on the factory's
//!      `remotes` channel as a [`FakeRemote`].
//!    * Drive that connector by sending [`Step`]s through the remote:
//!      `remote.send(Step::Connected(None)).await`.
//!
//! Nothing happens on a fake connection until the test says so, which makes
//! "stop before the handle reports ACTIVE" reproducible.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agentlink_core::connections::{ConnectionError, Connector, ConnectorFactory, LinkEvent};
use agentlink_core::{Endpoint, EndpointId};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// What the fake does next.
#[derive(Debug, Clone)]
pub enum Step {
    /// Finish `connect()`, optionally with a peer certificate fingerprint.
    Connected(Option<String>),
    /// Fail `connect()`.
    Refused(String),
    SessionOpened,
    SessionClosed,
    Hangup,
}

pub struct FakeConnector {
    steps: mpsc::Receiver<Step>,
    fingerprint: Option<String>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        match self.steps.recv().await {
            Some(Step::Connected(fingerprint)) => {
                self.fingerprint = fingerprint;
                Ok(())
            }
            Some(Step::Refused(reason)) => Err(ConnectionError::Other(reason)),
            Some(other) => Err(ConnectionError::Other(format!(
                "unexpected {other:?} before connect"
            ))),
            None => Err(ConnectionError::Other("test dropped the remote".into())),
        }
    }

    async fn next_event(&mut self) -> Result<LinkEvent, ConnectionError> {
        match self.steps.recv().await {
            Some(Step::SessionOpened) => Ok(LinkEvent::SessionOpened),
            Some(Step::SessionClosed) => Ok(LinkEvent::SessionClosed),
            Some(Step::Hangup) | None => Ok(LinkEvent::Closed),
            Some(other) => Err(ConnectionError::Other(format!(
                "unexpected {other:?} while connected"
            ))),
        }
    }

    async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        Ok(())
    }

    fn peer_certificate_fingerprint(&self) -> Option<String> {
        self.fingerprint.clone()
    }
}

/// The test's end of one fake connection.
pub struct FakeRemote {
    pub endpoint_id: EndpointId,
    steps: mpsc::Sender<Step>,
}

impl FakeRemote {
    /// Returns `false` once the connector has been dropped.
    pub async fn send(&self, step: Step) -> bool {
        self.steps.send(step).await.is_ok()
    }
}

pub struct FakeFactory {
    created: AtomicUsize,
    remotes: mpsc::UnboundedSender<FakeRemote>,
}

impl FakeFactory {
    /// The factory plus the channel every new connector's remote arrives on.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeRemote>) {
        let (remotes, remotes_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                created: AtomicUsize::new(0),
                remotes,
            }),
            remotes_rx,
        )
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ConnectorFactory for FakeFactory {
    fn create(&self, endpoint: &Endpoint) -> Box<dyn Connector> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let (steps_tx, steps_rx) = mpsc::channel(16);
        let _ = self.remotes.send(FakeRemote {
            endpoint_id: endpoint.id,
            steps: steps_tx,
        });
        Box::new(FakeConnector {
            steps: steps_rx,
            fingerprint: None,
        })
    }
}
