#![allow(dead_code)]

pub mod fake_connector;

use std::sync::Arc;

use agentlink_core::{
    DetailedStatus, EndpointId, EndpointRegistry, Supervisor, SupervisorClient, SupervisorConfig,
};
use log::LevelFilter;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};

use fake_connector::{FakeFactory, FakeRemote};

/// Logs will appear only when you run with `-- --nocapture`
/// or when the test fails.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// A running supervisor over an empty in-memory registry and fake connectors.
pub fn spawn_supervisor() -> (
    SupervisorClient,
    Arc<FakeFactory>,
    mpsc::UnboundedReceiver<FakeRemote>,
) {
    init_logging();
    let (factory, remotes) = FakeFactory::new();
    let supervisor = Supervisor::new(
        SupervisorConfig::default(),
        EndpointRegistry::in_memory(),
        factory.clone(),
    );
    let (client, _task) = supervisor.spawn();
    (client, factory, remotes)
}

/// Waits for the connector the supervisor built for the latest start.
pub async fn next_remote(remotes: &mut mpsc::UnboundedReceiver<FakeRemote>) -> FakeRemote {
    timeout(Duration::from_secs(1), remotes.recv())
        .await
        .expect("timed out waiting for a connector")
        .expect("factory dropped")
}

/// Polls the detailed status until `done` holds. Stop and status changes are
/// asynchronous, so tests never assume they have landed yet.
pub async fn wait_for_status(
    client: &SupervisorClient,
    id: EndpointId,
    done: impl Fn(&DetailedStatus) -> bool,
) -> DetailedStatus {
    timeout(Duration::from_secs(2), async {
        loop {
            let status = client
                .detailed_status(id)
                .await
                .expect("detailed status should succeed");
            if done(&status) {
                return status;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for endpoint status")
}
