use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info, log, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::broadcast::{SubscriberId, SubscriberSet};
use super::client::{Command, SupervisorClient};
use super::config::SupervisorConfig;
use super::errors::SupervisorError;
use super::events::{HandleEvent, Notice};
use super::handle::{ConnectionHandle, Generation};
use super::protocol::{self, DetailedStatus, Reply, ReplyTo, Request, StatusSnapshot};
use crate::connections::ConnectorFactory;
use crate::storage::{Endpoint, EndpointId, EndpointRegistry, NewEndpoint, Status};

/// Fingerprint reply when the endpoint has no live handle.
pub const NO_RUNNING_CLIENT: &str = "No running client.";
/// Fingerprint reply when the handle has not seen a peer certificate (yet).
pub const NO_PEER_CERTIFICATE: &str = "No peer certificate.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// Owns the endpoint registry and every live connection handle.
///
/// All methods take `&mut self`; concurrent callers go through
/// [`Supervisor::spawn`], whose single dispatch loop applies commands and
/// handle events one at a time. Handle events carry a generation and are only
/// applied while that generation is still the one in the map, so nothing a
/// stopped handle says after `stop_endpoint` can change the registry.
pub struct Supervisor {
    config: SupervisorConfig,
    registry: EndpointRegistry,
    handles: HashMap<EndpointId, ConnectionHandle>,
    connectors: Arc<dyn ConnectorFactory>,
    subscribers: SubscriberSet,
    notices: broadcast::Sender<Notice>,
    events_tx: mpsc::Sender<HandleEvent>,
    events_rx: mpsc::Receiver<HandleEvent>,
    next_generation: Generation,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        registry: EndpointRegistry,
        connectors: Arc<dyn ConnectorFactory>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity);
        let (notices, _) = broadcast::channel(config.notice_capacity);
        Self {
            config,
            registry,
            handles: HashMap::new(),
            connectors,
            subscribers: SubscriberSet::default(),
            notices,
            events_tx,
            events_rx,
            next_generation: 0,
        }
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn bind(&mut self, reply_to: ReplyTo) -> SubscriberId {
        self.subscribers.bind(reply_to)
    }

    pub fn unbind(&mut self, subscriber: SubscriberId) -> bool {
        self.subscribers.unbind(subscriber)
    }

    pub fn is_running(&self, id: EndpointId) -> bool {
        self.handles.get(&id).is_some_and(ConnectionHandle::is_running)
    }

    pub fn live_handles(&self) -> usize {
        self.handles.len()
    }

    /// Registers an endpoint and starts it right away. If the start fails
    /// the registration is undone, so a failed create leaves nothing behind.
    pub fn create_endpoint(&mut self, endpoint: NewEndpoint) -> Result<EndpointId, SupervisorError> {
        let id = self.registry.add(endpoint)?;
        if let Err(e) = self.start_endpoint(id) {
            warn!("Could not start new endpoint {}: {}. Removing it again.", id, e);
            if let Err(undo) = self.registry.remove(id) {
                error!("Could not remove endpoint {} after failed start: {}", id, undo);
            }
            return Err(e);
        }
        Ok(id)
    }

    pub fn start_endpoint(&mut self, id: EndpointId) -> Result<StartOutcome, SupervisorError> {
        if self.is_running(id) {
            debug!("Endpoint {} already has a running connection", id);
            return Ok(StartOutcome::AlreadyRunning);
        }

        self.registry.set_enabled(id, true)?;
        let endpoint = self.registry.get(id)?;
        let connection = endpoint.connection_string();
        let connector = self.connectors.create(endpoint);

        self.next_generation += 1;
        let mut handle =
            ConnectionHandle::new(id, self.next_generation, connector, self.events_tx.clone());
        handle.start();
        if let Some(mut previous) = self.handles.insert(id, handle) {
            debug!(
                "Replacing finished handle {} for endpoint {}",
                previous.generation(),
                id
            );
            previous.stop_connector();
        }

        info!("Endpoint {} started ({})", id, connection);
        let _ = self.notices.send(Notice::Started {
            endpoint_id: id,
            connection,
        });
        Ok(StartOutcome::Started)
    }

    /// Signals the handle to shut down and forgets it. Teardown finishes in
    /// the background; poll the status to observe it.
    pub fn stop_endpoint(&mut self, id: EndpointId) -> Result<StopOutcome, SupervisorError> {
        let Some(mut handle) = self.handles.remove(&id) else {
            return Ok(StopOutcome::NotRunning);
        };
        handle.stop_connector();

        let connection = match self.registry.get_mut(id) {
            Ok(endpoint) => {
                endpoint.status = Status::Offline;
                endpoint.connection_string()
            }
            Err(_) => {
                warn!("Stopped handle for endpoint {} which is no longer registered", id);
                return Ok(StopOutcome::Stopped);
            }
        };
        if let Err(e) = self.registry.set_enabled(id, false) {
            error!("Could not persist disabled endpoint {}: {}", id, e);
            if let Ok(endpoint) = self.registry.get_mut(id) {
                endpoint.enabled = false;
            }
        }

        info!("Endpoint {} stopped ({})", id, connection);
        let _ = self.notices.send(Notice::Stopped {
            endpoint_id: id,
            connection,
        });
        Ok(StopOutcome::Stopped)
    }

    /// Stops the endpoint if needed and drops it from the registry.
    pub fn remove_endpoint(&mut self, id: EndpointId) -> Result<Endpoint, SupervisorError> {
        self.registry.get(id)?;
        self.stop_endpoint(id)?;
        Ok(self.registry.remove(id)?)
    }

    /// Starts every endpoint whose persisted `enabled` flag is set.
    pub fn resume_enabled(&mut self) -> usize {
        let enabled: Vec<EndpointId> = self
            .registry
            .all()
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.id)
            .collect();
        let mut started = 0;
        for id in enabled {
            match self.start_endpoint(id) {
                Ok(StartOutcome::Started) => started += 1,
                Ok(StartOutcome::AlreadyRunning) => {}
                Err(e) => error!("Could not resume endpoint {}: {}", id, e),
            }
        }
        started
    }

    /// Stops every live handle.
    pub fn shutdown(&mut self) {
        let ids: Vec<EndpointId> = self.handles.keys().copied().collect();
        for id in ids {
            if let Err(e) = self.stop_endpoint(id) {
                error!("Error stopping endpoint {} during shutdown: {}", id, e);
            }
        }
    }

    fn effective_status(&self, endpoint: &Endpoint) -> Status {
        if self.handles.contains_key(&endpoint.id) {
            endpoint.status
        } else {
            Status::Offline
        }
    }

    pub fn endpoints_status(&self) -> StatusSnapshot {
        self.registry
            .all()
            .iter()
            .map(|e| (e.id, self.effective_status(e)))
            .collect()
    }

    pub fn endpoint_detailed_status(&self, id: EndpointId) -> Result<DetailedStatus, SupervisorError> {
        let endpoint = self.registry.get(id)?;
        let status = self.effective_status(endpoint);
        Ok(DetailedStatus {
            endpoint_id: endpoint.id,
            enabled: endpoint.enabled,
            has_password: endpoint.has_password(),
            is_ssl: endpoint.ssl,
            connected: status.is_connected(),
            has_open_session: status.has_open_session(),
        })
    }

    pub fn endpoint_fingerprint(&self, id: EndpointId) -> String {
        match self.handles.get(&id) {
            Some(handle) => handle
                .peer_certificate_fingerprint()
                .unwrap_or_else(|| NO_PEER_CERTIFICATE.to_string()),
            None => NO_RUNNING_CLIENT.to_string(),
        }
    }

    /// Runs one control request and sends its single reply to `reply_to`.
    pub fn handle_request(&mut self, request: Request, reply_to: &ReplyTo) {
        let reply = match request {
            Request::GetDetailedEndpointStatus { endpoint_id } => {
                match self.endpoint_detailed_status(endpoint_id) {
                    Ok(status) => Reply::DetailedEndpointStatus(status),
                    Err(error) => Reply::Failed { request, error },
                }
            }
            Request::GetEndpointsStatus => Reply::EndpointsStatus {
                endpoints: self.endpoints_status(),
            },
            Request::GetSslFingerprint { endpoint_id } => Reply::SslFingerprint {
                endpoint_id,
                fingerprint: self.endpoint_fingerprint(endpoint_id),
            },
            Request::StartEndpoint { endpoint_id } => match self.start_endpoint(endpoint_id) {
                Ok(_) => Reply::EndpointsStatus {
                    endpoints: self.endpoints_status(),
                },
                Err(error) => Reply::Failed { request, error },
            },
            Request::StopEndpoint { endpoint_id } => match self.stop_endpoint(endpoint_id) {
                Ok(_) => Reply::EndpointsStatus {
                    endpoints: self.endpoints_status(),
                },
                Err(error) => Reply::Failed { request, error },
            },
        };
        if let Err(e) = protocol::deliver(reply_to, reply) {
            error!("Dropping reply to request {}: {}", request.code(), e);
        }
    }

    fn is_current(&self, id: EndpointId, generation: Generation) -> bool {
        self.handles
            .get(&id)
            .is_some_and(|h| h.generation() == generation)
    }

    /// Mirrors a handle event into the registry and notifies subscribers.
    pub fn apply_event(&mut self, event: HandleEvent) {
        if !self.is_current(event.endpoint_id(), event.generation()) {
            debug!(
                "Discarding event from stale handle {} of endpoint {}: {:?}",
                event.generation(),
                event.endpoint_id(),
                event
            );
            return;
        }
        match event {
            HandleEvent::StatusChanged {
                endpoint_id,
                status,
                ..
            } => {
                match self.registry.get_mut(endpoint_id) {
                    Ok(endpoint) => endpoint.status = status,
                    Err(e) => {
                        warn!("Status {} for unknown endpoint: {}", status, e);
                        return;
                    }
                }
                debug!("Endpoint {} is now {}", endpoint_id, status);
                let snapshot = Reply::EndpointsStatus {
                    endpoints: self.endpoints_status(),
                };
                let delivered = self.subscribers.broadcast(&snapshot);
                debug!("Status snapshot delivered to {} subscriber(s)", delivered);
            }
            HandleEvent::Log {
                endpoint_id,
                record,
                ..
            } => {
                log!(
                    target: "agentlink::endpoint",
                    record.level,
                    "[endpoint {}] {}",
                    endpoint_id,
                    record.message
                );
                let _ = self.notices.send(Notice::Log {
                    endpoint_id,
                    record,
                });
            }
        }
    }

    /// Waits for the next handle event without applying it.
    pub async fn next_event(&mut self) -> Option<HandleEvent> {
        self.events_rx.recv().await
    }

    /// Applies one command. Returns `false` once the loop should exit.
    fn dispatch(&mut self, command: Command) -> bool {
        match command {
            Command::Control { request, reply_to } => self.handle_request(request, &reply_to),
            Command::CreateEndpoint {
                endpoint,
                respond_to,
            } => {
                let _ = respond_to.send(self.create_endpoint(endpoint));
            }
            Command::RemoveEndpoint {
                endpoint_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.remove_endpoint(endpoint_id));
            }
            Command::ListEndpoints { respond_to } => {
                let _ = respond_to.send(self.registry.all().to_vec());
            }
            Command::ResumeEnabled { respond_to } => {
                let _ = respond_to.send(self.resume_enabled());
            }
            Command::Bind {
                reply_to,
                respond_to,
            } => {
                let _ = respond_to.send(self.bind(reply_to));
            }
            Command::Unbind { subscriber } => {
                self.unbind(subscriber);
            }
            Command::Shutdown => return false,
        }
        true
    }

    /// The dispatch loop: commands and handle events, one at a time, until
    /// `Shutdown` or every client is gone. Live handles are stopped on exit.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!(
            "Supervisor running with {} registered endpoint(s).",
            self.registry.len()
        );
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.dispatch(command) {
                            break;
                        }
                    }
                    None => break,
                },
                Some(event) = self.events_rx.recv() => self.apply_event(event),
            }
        }
        self.shutdown();
        info!("Supervisor stopped.");
    }

    /// Moves the supervisor onto its own task and returns the client for it.
    pub fn spawn(self) -> (SupervisorClient, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(self.config.command_capacity);
        let client = SupervisorClient::new(commands_tx, self.notices.clone());
        let task = tokio::spawn(self.run(commands_rx));
        (client, task)
    }
}
