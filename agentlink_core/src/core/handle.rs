use std::sync::{Arc, Mutex};

use log::{debug, info, warn, Level};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::events::{HandleEvent, LogRecord};
use crate::connections::{Connector, LinkEvent};
use crate::storage::{EndpointId, Status};

/// Distinguishes successive handles for the same endpoint id.
pub type Generation = u64;

/// Where a handle task reports to. Sends are tagged with the owning
/// endpoint and the handle's generation.
#[derive(Clone)]
struct EventLink {
    endpoint_id: EndpointId,
    generation: Generation,
    sink: mpsc::Sender<HandleEvent>,
}

impl EventLink {
    async fn status(&self, status: Status) {
        let event = HandleEvent::StatusChanged {
            endpoint_id: self.endpoint_id,
            generation: self.generation,
            status,
        };
        if self.sink.send(event).await.is_err() {
            debug!(
                "Supervisor gone; dropping {} for endpoint {}",
                status, self.endpoint_id
            );
        }
    }

    async fn log(&self, level: Level, message: String) {
        let event = HandleEvent::Log {
            endpoint_id: self.endpoint_id,
            generation: self.generation,
            record: LogRecord { level, message },
        };
        let _ = self.sink.send(event).await;
    }
}

/// One live connection bound to an endpoint.
///
/// `start` spawns a task that owns the connector and reports every status
/// change back to the supervisor. `stop_connector` only signals that task;
/// teardown finishes on its own time. Dropping the handle also stops it.
pub struct ConnectionHandle {
    endpoint_id: EndpointId,
    generation: Generation,
    link: EventLink,
    connector: Option<Box<dyn Connector>>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    fingerprint: Arc<Mutex<Option<String>>>,
}

impl ConnectionHandle {
    pub fn new(
        endpoint_id: EndpointId,
        generation: Generation,
        connector: Box<dyn Connector>,
        sink: mpsc::Sender<HandleEvent>,
    ) -> Self {
        Self {
            endpoint_id,
            generation,
            link: EventLink {
                endpoint_id,
                generation,
                sink,
            },
            connector: Some(connector),
            stop_tx: None,
            task: None,
            fingerprint: Arc::new(Mutex::new(None)),
        }
    }

    pub fn endpoint_id(&self) -> EndpointId {
        self.endpoint_id
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Spawns the connection task. Returns immediately; progress arrives as events.
    pub fn start(&mut self) {
        let Some(mut connector) = self.connector.take() else {
            warn!(
                "Handle {} for endpoint {} was already started",
                self.generation, self.endpoint_id
            );
            return;
        };
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let link = self.link.clone();
        let fingerprint = Arc::clone(&self.fingerprint);
        let id = self.endpoint_id;

        let task = tokio::spawn(async move {
            info!("Connection task started for endpoint {}.", id);
            link.status(Status::Connecting).await;

            let connected = tokio::select! {
                _ = &mut stop_rx => None,
                result = connector.connect() => Some(result),
            };
            match connected {
                None => {
                    info!("Stop received for endpoint {} while connecting.", id);
                    link.status(Status::Offline).await;
                    return;
                }
                Some(Err(e)) => {
                    link.log(Level::Error, format!("Connect failed: {e}")).await;
                    link.status(Status::Offline).await;
                    return;
                }
                Some(Ok(())) => {}
            }

            if let Ok(mut slot) = fingerprint.lock() {
                *slot = connector.peer_certificate_fingerprint();
            }
            link.status(Status::Online).await;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        info!("Stop received for endpoint {}. Exiting task.", id);
                        break;
                    },
                    event = connector.next_event() => {
                        match event {
                            Ok(LinkEvent::SessionOpened) => link.status(Status::Active).await,
                            Ok(LinkEvent::SessionClosed) => link.status(Status::Online).await,
                            Ok(LinkEvent::Closed) => {
                                link.log(Level::Info, "Peer closed the connection".into()).await;
                                break;
                            },
                            Err(e) => {
                                link.log(Level::Error, format!("Connection lost: {e}")).await;
                                break;
                            },
                        }
                    }
                }
            }

            if let Err(e) = connector.disconnect().await {
                debug!("Disconnect error on endpoint {}: {}", id, e);
            }
            link.status(Status::Offline).await;
            info!("Connection task ended for endpoint {}.", id);
        });

        self.stop_tx = Some(stop_tx);
        self.task = Some(task);
    }

    /// Asks the connection task to shut down without waiting for it.
    pub fn stop_connector(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }

    /// `true` until the connection task has ended.
    pub fn is_running(&self) -> bool {
        match &self.task {
            Some(task) => !task.is_finished(),
            None => self.connector.is_some(),
        }
    }

    pub fn peer_certificate_fingerprint(&self) -> Option<String> {
        self.fingerprint.lock().ok().and_then(|slot| slot.clone())
    }
}
