use agentlink_core::core::supervisor::NO_RUNNING_CLIENT;
use agentlink_core::{NewEndpoint, Notice, Status, SupervisorError};
use tokio::time::{sleep, timeout, Duration};

mod common;
use common::fake_connector::Step;
use common::{next_remote, spawn_supervisor, wait_for_status};

#[tokio::test]
async fn registered_ssl_endpoint_becomes_active() {
    let (client, _factory, mut remotes) = spawn_supervisor();

    let id = client
        .create_endpoint(NewEndpoint::new("10.0.0.1", 443).with_ssl(true))
        .await
        .expect("create_endpoint should succeed");
    assert_eq!(id, 1, "the first endpoint gets id 1");

    let remote = next_remote(&mut remotes).await;
    assert_eq!(remote.endpoint_id, id);
    assert!(remote.send(Step::Connected(Some("3F:A2:99".into()))).await);
    assert!(remote.send(Step::SessionOpened).await);

    let status = wait_for_status(&client, id, |s| s.has_open_session).await;
    assert!(status.connected);
    assert!(status.enabled);
    assert!(status.is_ssl);
    assert!(!status.has_password);

    assert_eq!(client.fingerprint(id).await.unwrap(), "3F:A2:99");
}

#[tokio::test]
async fn starting_twice_creates_exactly_one_connection() {
    let (client, factory, mut remotes) = spawn_supervisor();
    let id = client
        .create_endpoint(NewEndpoint::new("10.0.0.1", 31415).named("lab"))
        .await
        .unwrap();
    let _remote = next_remote(&mut remotes).await;

    let snapshot = client
        .start_endpoint(id)
        .await
        .expect("second start is not an error");
    assert_eq!(snapshot.len(), 1);
    assert_eq!(factory.created(), 1, "no second connector may be built");
}

#[tokio::test]
async fn every_endpoint_is_listed_and_idle_ones_read_offline() {
    let (client, _factory, mut remotes) = spawn_supervisor();
    let running = client
        .create_endpoint(NewEndpoint::new("10.0.0.1", 1).named("a"))
        .await
        .unwrap();
    let remote = next_remote(&mut remotes).await;
    remote.send(Step::Connected(None)).await;
    wait_for_status(&client, running, |s| s.connected).await;

    // a second endpoint that is started and stopped again
    let idle = client
        .create_endpoint(NewEndpoint::new("10.0.0.2", 2).named("b"))
        .await
        .unwrap();
    next_remote(&mut remotes).await;
    client.stop_endpoint(idle).await.unwrap();

    let snapshot = client.endpoints_status().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.get(running), Some(Status::Online));
    assert_eq!(snapshot.get(idle), Some(Status::Offline));
}

#[tokio::test]
async fn stop_without_a_connection_is_a_no_op() {
    let (client, _factory, _remotes) = spawn_supervisor();
    let before = client.endpoints_status().await.unwrap();
    let after = client
        .stop_endpoint(7)
        .await
        .expect("stopping an idle id must succeed");
    assert_eq!(before, after);
}

#[tokio::test]
async fn fingerprint_without_a_connection_is_the_sentinel() {
    let (client, _factory, _remotes) = spawn_supervisor();
    assert_eq!(client.fingerprint(3).await.unwrap(), NO_RUNNING_CLIENT);
}

#[tokio::test]
async fn detailed_status_of_unknown_endpoint_is_not_found() {
    let (client, _factory, _remotes) = spawn_supervisor();
    let err = client
        .detailed_status(99)
        .await
        .expect_err("unknown id must fail");
    assert_eq!(err, SupervisorError::NotFound { endpoint_id: 99 });
}

#[tokio::test]
async fn late_events_after_stop_are_discarded() {
    let (client, _factory, mut remotes) = spawn_supervisor();
    let id = client
        .create_endpoint(NewEndpoint::new("10.0.0.1", 443).with_ssl(true))
        .await
        .unwrap();
    let remote = next_remote(&mut remotes).await;

    // stop before the connection reports anything useful
    client.stop_endpoint(id).await.unwrap();

    // whatever the old connection still manages to say must not count
    remote.send(Step::Connected(None)).await;
    remote.send(Step::SessionOpened).await;
    sleep(Duration::from_millis(50)).await;

    let status = wait_for_status(&client, id, |s| !s.connected).await;
    assert!(!status.enabled);
    assert!(!status.has_open_session);
    assert_eq!(
        client.endpoints_status().await.unwrap().get(id),
        Some(Status::Offline)
    );
}

#[tokio::test]
async fn refused_connection_can_be_retried() {
    let (client, factory, mut remotes) = spawn_supervisor();
    let id = client
        .create_endpoint(NewEndpoint::new("10.0.0.9", 443))
        .await
        .unwrap();
    next_remote(&mut remotes)
        .await
        .send(Step::Refused("connection refused".into()))
        .await;

    // the first connection task ends on its own; keep asking until a new one is built
    timeout(Duration::from_secs(2), async {
        while factory.created() < 2 {
            client.start_endpoint(id).await.unwrap();
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("a dead connection must not block a new start");

    let remote = next_remote(&mut remotes).await;
    remote.send(Step::Connected(None)).await;
    let status = wait_for_status(&client, id, |s| s.connected).await;
    assert!(!status.has_open_session);
}

#[tokio::test]
async fn start_and_stop_emit_notices_with_connection_string() {
    let (client, _factory, mut remotes) = spawn_supervisor();
    let mut notices = client.notices();

    let id = client
        .create_endpoint(NewEndpoint::new("192.168.0.7", 31415))
        .await
        .unwrap();
    next_remote(&mut remotes).await;
    client.stop_endpoint(id).await.unwrap();

    let mut seen = Vec::new();
    while seen.len() < 2 {
        match timeout(Duration::from_secs(1), notices.recv()).await {
            Ok(Ok(Notice::Log { .. })) => continue,
            Ok(Ok(notice)) => seen.push(notice),
            other => panic!("expected a notice, got {other:?}"),
        }
    }
    assert_eq!(
        seen,
        vec![
            Notice::Started {
                endpoint_id: id,
                connection: "192.168.0.7:31415".into()
            },
            Notice::Stopped {
                endpoint_id: id,
                connection: "192.168.0.7:31415".into()
            },
        ]
    );
}

#[tokio::test]
async fn duplicate_names_are_rejected_and_removal_works() {
    let (client, _factory, mut remotes) = spawn_supervisor();
    let id = client
        .create_endpoint(NewEndpoint::new("10.0.0.1", 1).named("lab"))
        .await
        .unwrap();
    next_remote(&mut remotes).await;

    let err = client
        .create_endpoint(NewEndpoint::new("10.0.0.2", 2).named("lab"))
        .await
        .expect_err("the name is taken");
    assert_eq!(
        err,
        SupervisorError::DuplicateName {
            name: "lab".into()
        }
    );

    let removed = client.remove_endpoint(id).await.unwrap();
    assert_eq!(removed.name, "lab");
    assert!(client.list_endpoints().await.unwrap().is_empty());
    assert!(client.endpoints_status().await.unwrap().is_empty());
}
