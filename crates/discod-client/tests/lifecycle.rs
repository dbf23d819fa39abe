//! Integration tests for the client session lifecycle: construction,
//! loop start/stop, state dispatch, release ordering and daemon loss.

use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use discod_client::binding::{FakeDaemon, ServiceBinding};
use discod_client::{Client, ClientError, ClientState, ErrorCode, Protocol, ANY_INTERFACE};

// ============================================================================
// Test helpers
// ============================================================================

fn fake_binding() -> (Arc<FakeDaemon>, Arc<dyn ServiceBinding>) {
    init_tracing();
    let daemon = Arc::new(FakeDaemon::new());
    let binding: Arc<dyn ServiceBinding> = daemon.clone();
    (daemon, binding)
}

/// Routes library logs through the test harness; `RUST_LOG` filters them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A callback that forwards events into a channel the test can drain.
fn channel_callback<T: Send + 'static>() -> (Box<dyn Fn(T) + Send + Sync>, Receiver<T>) {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    (
        Box::new(move |event| {
            let _ = tx.lock().unwrap().send(event);
        }),
        rx,
    )
}

fn next<T>(rx: &Receiver<T>) -> T {
    rx.recv_timeout(Duration::from_secs(2))
        .expect("event should arrive")
}

fn assert_no_event<T: std::fmt::Debug>(rx: &Receiver<T>) {
    if let Ok(event) = rx.recv_timeout(Duration::from_millis(100)) {
        panic!("unexpected event: {event:?}");
    }
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_construction_fails_when_daemon_absent() {
    let (daemon, binding) = fake_binding();
    daemon.refuse_sessions(true);

    let result = Client::new(binding);
    match result {
        Err(ClientError::Daemon(code)) => assert_eq!(code, ErrorCode::NoDaemon),
        Err(other) => panic!("expected daemon error, got {other}"),
        Ok(_) => panic!("construction should fail without a daemon"),
    }
}

#[test]
fn test_multiple_clients_share_a_binding() {
    let (_daemon, binding) = fake_binding();
    let first = Client::new(Arc::clone(&binding)).expect("first client");
    let second = Client::new(binding).expect("second client");
    first.release();
    second.release();
}

// ============================================================================
// Loop start/stop
// ============================================================================

#[test]
fn test_start_is_idempotent() {
    let (_daemon, binding) = fake_binding();
    let client = Client::new(binding).unwrap();

    assert_eq!(client.start(), Ok(()));
    assert!(client.is_running());
    // Starting an already-started client is a no-op.
    assert_eq!(client.start(), Ok(()));
    assert!(client.is_running());

    client.release();
}

#[test]
fn test_stop_without_start_is_bad_state() {
    let (_daemon, binding) = fake_binding();
    let client = Client::new(binding).unwrap();

    assert_eq!(client.stop(), Err(ErrorCode::BadState));

    client.start().unwrap();
    assert_eq!(client.stop(), Ok(()));
    assert!(!client.is_running());
    assert_eq!(client.stop(), Err(ErrorCode::BadState));

    client.release();
}

#[test]
fn test_state_callback_order() {
    let (_daemon, binding) = fake_binding();
    let (callback, states) = channel_callback::<ClientState>();
    let client = Client::with_callback(binding, callback).unwrap();

    client.start().unwrap();
    assert_eq!(next(&states), ClientState::Registering);
    assert_eq!(next(&states), ClientState::Running);

    // Stop flushes queued events before returning, so nothing is pending.
    client.stop().unwrap();
    assert_no_event(&states);

    client.release();
}

#[test]
fn test_restart_delivers_events_again() {
    let (_daemon, binding) = fake_binding();
    let (callback, states) = channel_callback::<ClientState>();
    let client = Client::with_callback(binding, callback).unwrap();

    client.start().unwrap();
    assert_eq!(next(&states), ClientState::Registering);
    assert_eq!(next(&states), ClientState::Running);
    client.stop().unwrap();

    client.start().unwrap();
    assert_eq!(next(&states), ClientState::Registering);
    assert_eq!(next(&states), ClientState::Running);

    client.release();
}

// ============================================================================
// Synchronous queries
// ============================================================================

#[test]
fn test_name_queries_work_without_loop() {
    let (_daemon, binding) = fake_binding();
    let client = Client::new(binding).unwrap();

    assert_eq!(client.host_name().unwrap(), "fakehost");
    assert_eq!(client.domain_name().unwrap(), "local");
    assert_eq!(client.fqdn().unwrap(), "fakehost.local");
    assert_eq!(client.state().unwrap(), ClientState::Connecting);

    client.set_host_name("renamed").unwrap();
    assert_eq!(client.fqdn().unwrap(), "renamed.local");

    client.start().unwrap();
    assert_eq!(client.state().unwrap(), ClientState::Running);

    client.release();
}

// ============================================================================
// Release ordering
// ============================================================================

#[test]
fn test_client_release_forces_children() {
    let (daemon, binding) = fake_binding();
    let client = Client::new(binding).unwrap();
    client.start().unwrap();

    let group = client.create_entry_group(None).unwrap();
    group
        .add_service(ANY_INTERFACE, Protocol::Any, "svc", "_test._tcp", None, None, 80, &[])
        .unwrap();
    group.commit().unwrap();
    assert_eq!(daemon.published_count(), 1);

    let (callback, _events) = channel_callback();
    let browser = client
        .create_service_browser(callback, ANY_INTERFACE, Protocol::Any, "_test._tcp", None, Default::default())
        .unwrap();

    // Releasing the client first is a usage error the library absorbs:
    // children are force-released and the published services withdrawn.
    client.release();
    assert_eq!(daemon.published_count(), 0);

    // The force-released children now refuse operations, and their own
    // release stays a no-op.
    assert_eq!(group.commit(), Err(ErrorCode::InvalidObject));
    group.release();
    browser.release();
}

#[test]
fn test_drop_releases_like_release() {
    let (daemon, binding) = fake_binding();
    {
        let client = Client::new(binding).unwrap();
        client.start().unwrap();
        let group = client.create_entry_group(None).unwrap();
        group
            .add_service(ANY_INTERFACE, Protocol::Any, "svc", "_test._tcp", None, None, 80, &[])
            .unwrap();
        group.commit().unwrap();
        assert_eq!(daemon.published_count(), 1);
        // Both dropped here, children first.
    }
    assert_eq!(daemon.published_count(), 0);
}

// ============================================================================
// Daemon loss
// ============================================================================

#[test]
fn test_daemon_shutdown_surfaces_failure() {
    let (daemon, binding) = fake_binding();
    let (callback, states) = channel_callback::<ClientState>();
    let client = Client::with_callback(binding, callback).unwrap();
    client.start().unwrap();

    assert_eq!(next(&states), ClientState::Registering);
    assert_eq!(next(&states), ClientState::Running);

    daemon.shut_down();

    // The failure is dispatched, then the channel closes and dispatch ends.
    assert_eq!(next(&states), ClientState::Failure);
    assert_no_event(&states);

    // The session handle is dead; stopping reports it, but the loop is
    // down regardless and release is safe.
    assert!(client.stop().is_err());
    assert!(!client.is_running());
    client.release();
}
