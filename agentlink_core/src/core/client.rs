use tokio::sync::{broadcast, mpsc, oneshot};

use super::broadcast::SubscriberId;
use super::errors::SupervisorError;
use super::events::Notice;
use super::protocol::{DetailedStatus, Reply, ReplyTo, Request, StatusSnapshot};
use crate::storage::{Endpoint, EndpointId, NewEndpoint};

/// What a [`SupervisorClient`] sends into the dispatch loop.
pub enum Command {
    Control {
        request: Request,
        reply_to: ReplyTo,
    },
    CreateEndpoint {
        endpoint: NewEndpoint,
        respond_to: oneshot::Sender<Result<EndpointId, SupervisorError>>,
    },
    RemoveEndpoint {
        endpoint_id: EndpointId,
        respond_to: oneshot::Sender<Result<Endpoint, SupervisorError>>,
    },
    ListEndpoints {
        respond_to: oneshot::Sender<Vec<Endpoint>>,
    },
    ResumeEnabled {
        respond_to: oneshot::Sender<usize>,
    },
    Bind {
        reply_to: ReplyTo,
        respond_to: oneshot::Sender<SubscriberId>,
    },
    Unbind {
        subscriber: SubscriberId,
    },
    Shutdown,
}

/// Cheap, cloneable access to a running supervisor.
#[derive(Clone)]
pub struct SupervisorClient {
    commands: mpsc::Sender<Command>,
    notices: broadcast::Sender<Notice>,
}

impl SupervisorClient {
    pub(crate) fn new(commands: mpsc::Sender<Command>, notices: broadcast::Sender<Notice>) -> Self {
        Self { commands, notices }
    }

    async fn submit(&self, command: Command) -> Result<(), SupervisorError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SupervisorError::Unavailable)
    }

    async fn ask<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SupervisorError> {
        let (respond_to, response) = oneshot::channel();
        self.submit(build(respond_to)).await?;
        response.await.map_err(|_| SupervisorError::Unavailable)
    }

    /// Sends a raw protocol request. The reply arrives on `reply_to`.
    pub async fn send(&self, request: Request, reply_to: ReplyTo) -> Result<(), SupervisorError> {
        self.submit(Command::Control { request, reply_to }).await
    }

    /// Sends a request on a private reply channel and waits for its reply.
    pub async fn call(&self, request: Request) -> Result<Reply, SupervisorError> {
        let (reply_to, mut replies) = mpsc::channel(1);
        self.send(request, reply_to).await?;
        replies.recv().await.ok_or(SupervisorError::Unavailable)
    }

    async fn snapshot_of(&self, request: Request) -> Result<StatusSnapshot, SupervisorError> {
        match self.call(request).await? {
            Reply::EndpointsStatus { endpoints } => Ok(endpoints),
            Reply::Failed { error, .. } => Err(error),
            _ => Err(unexpected(request)),
        }
    }

    pub async fn endpoints_status(&self) -> Result<StatusSnapshot, SupervisorError> {
        self.snapshot_of(Request::GetEndpointsStatus).await
    }

    /// Returns the post-start snapshot of every endpoint.
    pub async fn start_endpoint(&self, endpoint_id: EndpointId) -> Result<StatusSnapshot, SupervisorError> {
        self.snapshot_of(Request::StartEndpoint { endpoint_id }).await
    }

    /// Returns the post-stop snapshot. The connection may still be tearing down.
    pub async fn stop_endpoint(&self, endpoint_id: EndpointId) -> Result<StatusSnapshot, SupervisorError> {
        self.snapshot_of(Request::StopEndpoint { endpoint_id }).await
    }

    pub async fn detailed_status(&self, endpoint_id: EndpointId) -> Result<DetailedStatus, SupervisorError> {
        let request = Request::GetDetailedEndpointStatus { endpoint_id };
        match self.call(request).await? {
            Reply::DetailedEndpointStatus(status) => Ok(status),
            Reply::Failed { error, .. } => Err(error),
            _ => Err(unexpected(request)),
        }
    }

    pub async fn fingerprint(&self, endpoint_id: EndpointId) -> Result<String, SupervisorError> {
        let request = Request::GetSslFingerprint { endpoint_id };
        match self.call(request).await? {
            Reply::SslFingerprint { fingerprint, .. } => Ok(fingerprint),
            Reply::Failed { error, .. } => Err(error),
            _ => Err(unexpected(request)),
        }
    }

    /// Registers an endpoint and starts it.
    pub async fn create_endpoint(&self, endpoint: NewEndpoint) -> Result<EndpointId, SupervisorError> {
        self.ask(|respond_to| Command::CreateEndpoint {
            endpoint,
            respond_to,
        })
        .await?
    }

    pub async fn remove_endpoint(&self, endpoint_id: EndpointId) -> Result<Endpoint, SupervisorError> {
        self.ask(|respond_to| Command::RemoveEndpoint {
            endpoint_id,
            respond_to,
        })
        .await?
    }

    pub async fn list_endpoints(&self) -> Result<Vec<Endpoint>, SupervisorError> {
        self.ask(|respond_to| Command::ListEndpoints { respond_to })
            .await
    }

    /// Starts every endpoint persisted as enabled; returns how many started.
    pub async fn resume_enabled(&self) -> Result<usize, SupervisorError> {
        self.ask(|respond_to| Command::ResumeEnabled { respond_to })
            .await
    }

    /// Adds `reply_to` to the set receiving unsolicited status snapshots.
    pub async fn bind(&self, reply_to: ReplyTo) -> Result<SubscriberId, SupervisorError> {
        self.ask(|respond_to| Command::Bind {
            reply_to,
            respond_to,
        })
        .await
    }

    pub async fn unbind(&self, subscriber: SubscriberId) -> Result<(), SupervisorError> {
        self.submit(Command::Unbind { subscriber }).await
    }

    /// Started/stopped/log notices. Lagging receivers lose the oldest ones.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Stops every connection and ends the dispatch loop.
    pub async fn shutdown(&self) -> Result<(), SupervisorError> {
        self.submit(Command::Shutdown).await
    }
}

fn unexpected(request: Request) -> SupervisorError {
    SupervisorError::UnexpectedReply {
        request: format!("{request:?}"),
    }
}
