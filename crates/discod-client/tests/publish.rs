//! Integration tests for the publish side: entry-group state machine,
//! collisions, TXT updates and the publish → resolve round trip.

use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use discod_client::binding::{FakeDaemon, ServiceBinding};
use discod_client::{
    Client, EntryGroup, ErrorCode, GroupState, LookupFlags, Protocol, ResolverEvent,
    ServiceIdentity, ANY_INTERFACE,
};

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

fn identity(name: &str) -> ServiceIdentity {
    ServiceIdentity::new(ANY_INTERFACE, Protocol::Any, name, "_test._tcp", "local")
}

// ============================================================================
// Commit lifecycle
// ============================================================================

#[test]
fn test_commit_reports_registering_then_established() {
    let (_daemon, binding) = fake_binding();
    let client = Client::new(binding).unwrap();
    client.start().unwrap();

    let (callback, states) = channel_callback::<GroupState>();
    let group = client.create_entry_group(Some(callback)).unwrap();
    assert_eq!(group.state().unwrap(), GroupState::Uncommitted);
    assert!(group.is_empty().unwrap());

    group
        .add_service(ANY_INTERFACE, Protocol::Any, "svc", "_test._tcp", None, None, 8080, &[])
        .unwrap();
    assert!(!group.is_empty().unwrap());

    group.commit().unwrap();
    assert_eq!(next(&states), GroupState::Registering);
    assert_eq!(next(&states), GroupState::Established);
    assert_eq!(group.state().unwrap(), GroupState::Established);

    group.release();
    client.release();
}

#[test]
fn test_commit_empty_group_is_rejected() {
    let (_daemon, binding) = fake_binding();
    let client = Client::new(binding).unwrap();
    client.start().unwrap();

    let group = client.create_entry_group(None).unwrap();
    assert_eq!(group.commit(), Err(ErrorCode::IsEmpty));

    group.release();
    client.release();
}

// ============================================================================
// TXT round trip
// ============================================================================

#[test]
fn test_txt_records_round_trip_through_resolution() {
    let (_daemon, binding) = fake_binding();
    let client = Client::new(Arc::clone(&binding)).unwrap();
    client.start().unwrap();

    let (callback, states) = channel_callback::<GroupState>();
    let group = client.create_entry_group(Some(callback)).unwrap();
    let txt = vec!["k1=v1".to_string(), "k2=v2".to_string()];
    group
        .add_service(ANY_INTERFACE, Protocol::Any, "TxtService", "_test._tcp", None, None, 9090, &txt)
        .unwrap();
    group.commit().unwrap();
    assert_eq!(next(&states), GroupState::Registering);
    assert_eq!(next(&states), GroupState::Established);

    let resolved = Client::resolve_service(
        Arc::clone(&binding),
        &identity("TxtService"),
        Protocol::Inet,
        LookupFlags::NONE,
        Some(Duration::from_secs(2)),
    )
    .expect("service should resolve");

    assert_eq!(resolved.txt_records, txt);
    assert_eq!(resolved.port, 9090);
    assert_eq!(resolved.service_type, "_test._tcp");
    assert_eq!(resolved.host_name, "fakehost.local");
    let address = resolved.address.expect("address should be present");
    assert_eq!(address.family(), Protocol::Inet);

    group.release();
    client.release();
}

#[test]
fn test_lookup_flags_suppress_txt_and_address() {
    let (_daemon, binding) = fake_binding();
    let client = Client::new(Arc::clone(&binding)).unwrap();
    client.start().unwrap();

    let group = client.create_entry_group(None).unwrap();
    group
        .add_service(
            ANY_INTERFACE,
            Protocol::Any,
            "Flagged",
            "_test._tcp",
            None,
            None,
            9091,
            &["k=v".to_string()],
        )
        .unwrap();
    group.commit().unwrap();

    let resolved = Client::resolve_service(
        Arc::clone(&binding),
        &identity("Flagged"),
        Protocol::Any,
        LookupFlags::NO_TXT | LookupFlags::NO_ADDRESS,
        Some(Duration::from_secs(2)),
    )
    .expect("service should resolve");

    assert!(resolved.txt_records.is_empty());
    assert!(resolved.address.is_none());

    group.release();
    client.release();
}

// ============================================================================
// Collisions
// ============================================================================

#[test]
fn test_commit_collision_and_rename_recovery() {
    let (_daemon, binding) = fake_binding();
    let client = Client::new(Arc::clone(&binding)).unwrap();
    client.start().unwrap();

    let first = client.create_entry_group(None).unwrap();
    first
        .add_service(ANY_INTERFACE, Protocol::Any, "Shared", "_test._tcp", None, None, 80, &[])
        .unwrap();
    first.commit().unwrap();

    let (callback, states) = channel_callback::<GroupState>();
    let second = client.create_entry_group(Some(callback)).unwrap();
    second
        .add_service(ANY_INTERFACE, Protocol::Any, "Shared", "_test._tcp", None, None, 81, &[])
        .unwrap();
    // The commit call itself succeeds; the clash arrives asynchronously.
    second.commit().unwrap();
    assert_eq!(next(&states), GroupState::Registering);
    assert_eq!(next(&states), GroupState::Collision);
    assert_eq!(second.state().unwrap(), GroupState::Collision);

    // Recover: pick an alternative name and republish.
    let renamed = EntryGroup::find_alternative_service_name("Shared");
    assert_ne!(renamed, "Shared");
    second.reset().unwrap();
    assert_eq!(next(&states), GroupState::Uncommitted);
    second
        .add_service(ANY_INTERFACE, Protocol::Any, &renamed, "_test._tcp", None, None, 81, &[])
        .unwrap();
    second.commit().unwrap();
    assert_eq!(next(&states), GroupState::Registering);
    assert_eq!(next(&states), GroupState::Established);

    second.release();
    first.release();
    client.release();
}

#[test]
fn test_duplicate_within_one_group_is_synchronous_collision() {
    let (_daemon, binding) = fake_binding();
    let client = Client::new(binding).unwrap();
    client.start().unwrap();

    let group = client.create_entry_group(None).unwrap();
    group
        .add_service(ANY_INTERFACE, Protocol::Any, "Twice", "_test._tcp", None, None, 80, &[])
        .unwrap();
    assert_eq!(
        group.add_service(ANY_INTERFACE, Protocol::Any, "Twice", "_test._tcp", None, None, 81, &[]),
        Err(ErrorCode::Collision)
    );

    group.release();
    client.release();
}

// ============================================================================
// Updates and withdrawal
// ============================================================================

#[test]
fn test_update_service_reaches_live_resolver() {
    let (_daemon, binding) = fake_binding();
    let client = Client::new(binding).unwrap();
    client.start().unwrap();

    let group = client.create_entry_group(None).unwrap();
    group
        .add_service(
            ANY_INTERFACE,
            Protocol::Any,
            "Mutable",
            "_test._tcp",
            None,
            None,
            7000,
            &["rev=1".to_string()],
        )
        .unwrap();
    group.commit().unwrap();

    let (callback, events) = channel_callback::<ResolverEvent>();
    let resolver = client
        .create_service_resolver(callback, &identity("Mutable"), Protocol::Any, LookupFlags::NONE)
        .unwrap();

    match next(&events) {
        ResolverEvent::Resolved(resolved) => assert_eq!(resolved.txt_records, vec!["rev=1"]),
        other => panic!("expected initial resolution, got {other:?}"),
    }

    // No commit needed: the update takes effect immediately.
    group
        .update_service(
            ANY_INTERFACE,
            Protocol::Any,
            "Mutable",
            "_test._tcp",
            None,
            &["rev=2".to_string()],
        )
        .unwrap();

    match next(&events) {
        ResolverEvent::Resolved(resolved) => assert_eq!(resolved.txt_records, vec!["rev=2"]),
        other => panic!("expected updated resolution, got {other:?}"),
    }

    resolver.release();
    group.release();
    client.release();
}

#[test]
fn test_update_unknown_service_is_not_found() {
    let (_daemon, binding) = fake_binding();
    let client = Client::new(binding).unwrap();
    client.start().unwrap();

    let group = client.create_entry_group(None).unwrap();
    assert_eq!(
        group.update_service(ANY_INTERFACE, Protocol::Any, "Ghost", "_test._tcp", None, &[]),
        Err(ErrorCode::NotFound)
    );

    group.release();
    client.release();
}

#[test]
fn test_reset_withdraws_and_signals_resolvers() {
    let (daemon, binding) = fake_binding();
    let client = Client::new(binding).unwrap();
    client.start().unwrap();

    let group = client.create_entry_group(None).unwrap();
    group
        .add_service(ANY_INTERFACE, Protocol::Any, "Ephemeral", "_test._tcp", None, None, 7100, &[])
        .unwrap();
    group.commit().unwrap();
    assert_eq!(daemon.published_count(), 1);

    let (callback, events) = channel_callback::<ResolverEvent>();
    let resolver = client
        .create_service_resolver(callback, &identity("Ephemeral"), Protocol::Any, LookupFlags::NONE)
        .unwrap();
    assert!(matches!(next(&events), ResolverEvent::Resolved(_)));

    group.reset().unwrap();
    assert_eq!(daemon.published_count(), 0);
    assert!(group.is_empty().unwrap());
    assert_eq!(group.state().unwrap(), GroupState::Uncommitted);

    // The wire-level "empty FOUND" arrives as the explicit removal event.
    assert_eq!(next(&events), ResolverEvent::Removed);

    resolver.release();
    group.release();
    client.release();
}
