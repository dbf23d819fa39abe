//! The daemon session: connection, event-loop thread and child registry.
//!
//! A [`Client`] owns one daemon session and, once started, exactly one
//! background event-loop thread. That thread is the only place callbacks
//! run: it drains the session's event channel and dispatches each event to
//! the object it targets. Application threads may call any public operation
//! concurrently; every object serializes its own state-mutating operations
//! internally.
//!
//! # Lifecycle
//!
//! Children (entry groups, browsers, resolvers) must be released before the
//! client. The client keeps a registry of its live children and enforces
//! the rule: releasing a client force-releases anything still alive, with a
//! warning. `Client::release` consumes the client, and `Drop` performs the
//! same teardown for clients that go out of scope unreleased.
//!
//! Callbacks must not call `stop` or `release` on their own client; those
//! operations join the event-loop thread and would self-deadlock (release
//! of the watch object that fired the callback is fine).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use discod_core::{
    BrowserEvent, ClientState, DnsClass, ErrorCode, GroupState, LookupFlags, Protocol,
    RecordEvent, RecordType, ResolvedService, ResolverEvent, ServiceIdentity,
};

use crate::binding::{
    DaemonEvent, RawResolverEvent, ServiceBinding, SessionHandle,
};
use crate::browser::ServiceBrowser;
use crate::entry_group::{EntryGroup, GroupCore};
use crate::error::ClientError;
use crate::record_browser::RecordBrowser;
use crate::resolver::ServiceResolver;
use crate::sync::lock;
use crate::watch::{WatchCore, WatchHandle};

// ============================================================================
// Callback types
// ============================================================================

/// Receives client state changes. Invoked on the event-loop thread.
pub type StateCallback = Box<dyn Fn(ClientState) + Send + Sync>;
/// Receives entry-group state changes. Invoked on the event-loop thread.
pub type GroupCallback = Box<dyn Fn(GroupState) + Send + Sync>;
/// Receives service-browser events. Invoked on the event-loop thread.
pub type BrowserCallback = Box<dyn Fn(BrowserEvent) + Send + Sync>;
/// Receives service-resolver events. Invoked on the event-loop thread.
pub type ResolverCallback = Box<dyn Fn(ResolverEvent) + Send + Sync>;
/// Receives record-browser events. Invoked on the event-loop thread.
pub type RecordCallback = Box<dyn Fn(RecordEvent) + Send + Sync>;

// ============================================================================
// Client core
// ============================================================================

/// Registry of the client's live children, keyed by daemon handle.
/// Holds weak references so a dropped child does not linger.
#[derive(Default)]
struct Registry {
    groups: HashMap<crate::binding::GroupHandle, Weak<GroupCore>>,
    browsers: HashMap<crate::binding::BrowserHandle, Weak<WatchCore<BrowserEvent>>>,
    resolvers: HashMap<crate::binding::ResolverHandle, Weak<WatchCore<ResolverEvent>>>,
    records: HashMap<crate::binding::RecordHandle, Weak<WatchCore<RecordEvent>>>,
}

struct LoopCtl {
    running: bool,
    thread: Option<JoinHandle<()>>,
}

/// Shared state behind a [`Client`] and all of its children.
pub(crate) struct ClientCore {
    pub(crate) binding: Arc<dyn ServiceBinding>,
    pub(crate) session: SessionHandle,
    callback: Option<StateCallback>,
    released: AtomicBool,
    loop_ctl: Mutex<LoopCtl>,
    /// The event receiver between runs of the loop. Taken by `start`,
    /// handed back by the loop thread when it exits.
    parked_events: Mutex<Option<Receiver<DaemonEvent>>>,
    registry: Mutex<Registry>,
}

impl ClientCore {
    fn ensure_live(&self) -> Result<(), ErrorCode> {
        if self.released.load(Ordering::SeqCst) {
            Err(ErrorCode::InvalidObject)
        } else {
            Ok(())
        }
    }

    // ---- registry ---------------------------------------------------------

    pub(crate) fn register_group(
        &self,
        handle: crate::binding::GroupHandle,
        core: &Arc<GroupCore>,
    ) {
        lock(&self.registry).groups.insert(handle, Arc::downgrade(core));
    }

    pub(crate) fn forget_group(&self, handle: crate::binding::GroupHandle) {
        lock(&self.registry).groups.remove(&handle);
    }

    pub(crate) fn register_browser(
        &self,
        handle: crate::binding::BrowserHandle,
        core: &Arc<WatchCore<BrowserEvent>>,
    ) {
        lock(&self.registry).browsers.insert(handle, Arc::downgrade(core));
    }

    pub(crate) fn register_resolver(
        &self,
        handle: crate::binding::ResolverHandle,
        core: &Arc<WatchCore<ResolverEvent>>,
    ) {
        lock(&self.registry).resolvers.insert(handle, Arc::downgrade(core));
    }

    pub(crate) fn register_record_browser(
        &self,
        handle: crate::binding::RecordHandle,
        core: &Arc<WatchCore<RecordEvent>>,
    ) {
        lock(&self.registry).records.insert(handle, Arc::downgrade(core));
    }

    pub(crate) fn forget_watch(&self, handle: WatchHandle) {
        let mut registry = lock(&self.registry);
        match handle {
            WatchHandle::Browser(h) => {
                registry.browsers.remove(&h);
            }
            WatchHandle::Resolver(h) => {
                registry.resolvers.remove(&h);
            }
            WatchHandle::Record(h) => {
                registry.records.remove(&h);
            }
        }
    }

    pub(crate) fn close_watch(&self, handle: WatchHandle) -> Result<(), ErrorCode> {
        match handle {
            WatchHandle::Browser(h) => self.binding.close_service_browser(h),
            WatchHandle::Resolver(h) => self.binding.close_service_resolver(h),
            WatchHandle::Record(h) => self.binding.close_record_browser(h),
        }
    }

    // ---- loop control -----------------------------------------------------

    fn stop(&self) -> Result<(), ErrorCode> {
        let mut ctl = lock(&self.loop_ctl);
        if !ctl.running {
            return Err(ErrorCode::BadState);
        }
        let result = self.binding.stop_loop(self.session);
        ctl.running = false;
        let joiner = ctl.thread.take();
        drop(ctl);

        if let Some(handle) = joiner {
            if handle.thread().id() == thread::current().id() {
                warn!("stop called from the event-loop thread; not joining");
            } else if handle.join().is_err() {
                warn!("event-loop thread panicked");
            }
        }
        debug!("event loop stopped");
        result
    }

    /// Full teardown. Idempotent; shared by `release` and `Drop`.
    fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        // Children first, while the session is still valid.
        let (groups, browsers, resolvers, records) = {
            let mut registry = lock(&self.registry);
            (
                registry
                    .groups
                    .drain()
                    .filter_map(|(_, weak)| weak.upgrade())
                    .collect::<Vec<_>>(),
                registry
                    .browsers
                    .drain()
                    .filter_map(|(_, weak)| weak.upgrade())
                    .collect::<Vec<_>>(),
                registry
                    .resolvers
                    .drain()
                    .filter_map(|(_, weak)| weak.upgrade())
                    .collect::<Vec<_>>(),
                registry
                    .records
                    .drain()
                    .filter_map(|(_, weak)| weak.upgrade())
                    .collect::<Vec<_>>(),
            )
        };
        let leftovers = groups.len() + browsers.len() + resolvers.len() + records.len();
        if leftovers > 0 {
            warn!(
                count = leftovers,
                "client released with live children; force-releasing them"
            );
        }
        for group in groups {
            group.release();
        }
        for browser in browsers {
            browser.release();
        }
        for resolver in resolvers {
            resolver.release();
        }
        for record in records {
            record.release();
        }

        match self.stop() {
            Ok(()) | Err(ErrorCode::BadState) => {}
            Err(code) => debug!(code = %code, "stop during client release"),
        }
        self.binding.close_session(self.session);
        info!("daemon session released");
    }

    // ---- dispatch ---------------------------------------------------------

    /// Routes one daemon event to its target. Runs on the event-loop thread.
    fn dispatch_event(&self, event: DaemonEvent) {
        match event {
            DaemonEvent::ClientState { session, state } => {
                if session != self.session {
                    trace!("state event for a foreign session");
                    return;
                }
                debug!(state = %state, "client state changed");
                if let Some(callback) = &self.callback {
                    callback(state);
                }
            }
            DaemonEvent::GroupState { group, state } => {
                let target = lock(&self.registry).groups.get(&group).and_then(Weak::upgrade);
                match target {
                    Some(core) => core.dispatch(state),
                    None => trace!(group = ?group, "group event with no live target"),
                }
            }
            DaemonEvent::ServiceBrowser { browser, event } => {
                let target = lock(&self.registry)
                    .browsers
                    .get(&browser)
                    .and_then(Weak::upgrade);
                match target {
                    Some(core) => core.dispatch(event),
                    None => trace!(browser = ?browser, "browser event with no live target"),
                }
            }
            DaemonEvent::ServiceResolver { resolver, event } => {
                let target = lock(&self.registry)
                    .resolvers
                    .get(&resolver)
                    .and_then(Weak::upgrade);
                match target {
                    Some(core) => {
                        core.dispatch(translate_resolver_event(self.binding.as_ref(), event));
                    }
                    None => trace!(resolver = ?resolver, "resolver event with no live target"),
                }
            }
            DaemonEvent::RecordBrowser { browser, event } => {
                let target = lock(&self.registry)
                    .records
                    .get(&browser)
                    .and_then(Weak::upgrade);
                match target {
                    Some(core) => core.dispatch(event),
                    None => trace!(browser = ?browser, "record event with no live target"),
                }
            }
            // Consumed by the loop itself before dispatch.
            DaemonEvent::LoopStopped => {}
        }
    }
}

/// Converts a wire-level resolver event into the API event.
///
/// The daemon signals "the watched service is gone" as a FOUND whose name,
/// type and host name are all empty; that combination becomes the explicit
/// `Removed` variant so callers never mistake it for a resolved record.
fn translate_resolver_event(
    binding: &dyn ServiceBinding,
    raw: RawResolverEvent,
) -> ResolverEvent {
    match raw {
        RawResolverEvent::Failure => ResolverEvent::Failed,
        RawResolverEvent::Found {
            ref name,
            ref service_type,
            ref host_name,
            ..
        } if name.is_empty() && service_type.is_empty() && host_name.is_empty() => {
            ResolverEvent::Removed
        }
        RawResolverEvent::Found {
            interface,
            protocol,
            name,
            service_type,
            domain,
            host_name,
            address,
            port,
            txt_records,
            flags,
        } => {
            let address = address.and_then(|payload| match binding.parse_address(&payload) {
                Ok(value) => Some(value),
                Err(code) => {
                    debug!(code = %code, "discarding undecodable address payload");
                    None
                }
            });
            ResolverEvent::Resolved(ResolvedService {
                interface,
                protocol,
                name,
                service_type,
                domain,
                host_name,
                address,
                port,
                txt_records,
                flags,
            })
        }
    }
}

/// Body of the per-client event-loop thread.
fn run_event_loop(core: Arc<ClientCore>, events: Receiver<DaemonEvent>) {
    debug!("event loop running");
    loop {
        match events.recv() {
            Ok(DaemonEvent::LoopStopped) => {
                debug!("event loop stop marker received");
                break;
            }
            Ok(event) => core.dispatch_event(event),
            Err(_) => {
                warn!("event channel closed; daemon is gone");
                break;
            }
        }
    }
    // Park the receiver so a later start() can resume consuming.
    *lock(&core.parked_events) = Some(events);
    debug!("event loop exited");
}

// ============================================================================
// Client
// ============================================================================

/// A session with the discod daemon; the root of the object graph.
///
/// Construct with [`Client::new`] (or [`Client::with_callback`] to observe
/// state changes), call [`Client::start`] to begin receiving events, create
/// children through the factory methods, and release everything — children
/// first — when done.
pub struct Client {
    core: Arc<ClientCore>,
}

impl Client {
    /// Opens a daemon session without a state-change callback.
    ///
    /// # Errors
    ///
    /// [`ClientError::Daemon`] if the binding cannot be initialized or the
    /// daemon refuses the session (not running, version mismatch, resource
    /// exhaustion). No partial client is returned.
    pub fn new(binding: Arc<dyn ServiceBinding>) -> Result<Client, ClientError> {
        Client::build(binding, None)
    }

    /// Opens a daemon session; `callback` observes client state changes on
    /// the event-loop thread.
    pub fn with_callback(
        binding: Arc<dyn ServiceBinding>,
        callback: StateCallback,
    ) -> Result<Client, ClientError> {
        Client::build(binding, Some(callback))
    }

    fn build(
        binding: Arc<dyn ServiceBinding>,
        callback: Option<StateCallback>,
    ) -> Result<Client, ClientError> {
        binding.initialize().map_err(ClientError::Daemon)?;
        let (events, receiver) = mpsc::channel();
        let session = binding.open_session(events).map_err(ClientError::Daemon)?;
        info!(session = ?session, "daemon session opened");
        Ok(Client {
            core: Arc::new(ClientCore {
                binding,
                session,
                callback,
                released: AtomicBool::new(false),
                loop_ctl: Mutex::new(LoopCtl {
                    running: false,
                    thread: None,
                }),
                parked_events: Mutex::new(Some(receiver)),
                registry: Mutex::new(Registry::default()),
            }),
        })
    }

    /// Starts the background event loop. Starting an already-started client
    /// is a no-op returning `Ok`.
    ///
    /// # Errors
    ///
    /// `ErrorCode::InvalidObject` after release, or whatever the daemon
    /// reports for the start request.
    pub fn start(&self) -> Result<(), ErrorCode> {
        let core = &self.core;
        let mut ctl = lock(&core.loop_ctl);
        core.ensure_live()?;
        if ctl.running {
            return Ok(());
        }
        core.binding.start_loop(core.session)?;
        let receiver = lock(&core.parked_events).take();
        let Some(receiver) = receiver else {
            let _ = core.binding.stop_loop(core.session);
            return Err(ErrorCode::BadState);
        };
        let loop_core = Arc::clone(core);
        match thread::Builder::new()
            .name("discod-client-events".to_string())
            .spawn(move || run_event_loop(loop_core, receiver))
        {
            Ok(handle) => {
                ctl.running = true;
                ctl.thread = Some(handle);
                info!("event loop started");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to spawn event-loop thread");
                let _ = core.binding.stop_loop(core.session);
                Err(ErrorCode::Os)
            }
        }
    }

    /// Stops the event loop; no callbacks run after this returns.
    ///
    /// # Errors
    ///
    /// `ErrorCode::BadState` if the loop is not running.
    pub fn stop(&self) -> Result<(), ErrorCode> {
        self.core.stop()
    }

    /// Whether the event loop is currently running.
    pub fn is_running(&self) -> bool {
        lock(&self.core.loop_ctl).running
    }

    /// Stops the loop and closes the daemon session, force-releasing any
    /// children still alive. Consumes the client, so it cannot be released
    /// twice.
    pub fn release(self) {
        self.core.release();
    }

    // ---- synchronous queries ----------------------------------------------

    /// This host's name, e.g. `"ganymede"`. Callable whether or not the
    /// loop is started.
    pub fn host_name(&self) -> Result<String, ErrorCode> {
        self.core.ensure_live()?;
        self.core.binding.host_name(self.core.session)
    }

    /// This host's domain, e.g. `"local"`.
    pub fn domain_name(&self) -> Result<String, ErrorCode> {
        self.core.ensure_live()?;
        self.core.binding.domain_name(self.core.session)
    }

    /// This host's fully-qualified domain name.
    pub fn fqdn(&self) -> Result<String, ErrorCode> {
        self.core.ensure_live()?;
        self.core.binding.fqdn(self.core.session)
    }

    /// Asks the daemon to adopt a new host name.
    pub fn set_host_name(&self, name: &str) -> Result<(), ErrorCode> {
        self.core.ensure_live()?;
        self.core.binding.set_host_name(self.core.session, name)
    }

    /// The session's current state as the daemon reports it.
    pub fn state(&self) -> Result<ClientState, ErrorCode> {
        self.core.ensure_live()?;
        self.core.binding.client_state(self.core.session)
    }

    // ---- factories --------------------------------------------------------

    /// Creates an empty entry group for publishing services.
    pub fn create_entry_group(
        &self,
        callback: Option<GroupCallback>,
    ) -> Result<EntryGroup, ClientError> {
        self.core.ensure_live().map_err(ClientError::Daemon)?;
        EntryGroup::create(Arc::clone(&self.core), callback)
    }

    /// Creates a browser watching for services of `service_type`.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidArgument`] (before the daemon is contacted) if
    /// `service_type` is empty.
    pub fn create_service_browser(
        &self,
        callback: BrowserCallback,
        interface: i32,
        protocol: Protocol,
        service_type: &str,
        domain: Option<&str>,
        flags: LookupFlags,
    ) -> Result<ServiceBrowser, ClientError> {
        if service_type.is_empty() {
            return Err(ClientError::InvalidArgument(
                "service type must not be empty".to_string(),
            ));
        }
        self.core.ensure_live().map_err(ClientError::Daemon)?;
        ServiceBrowser::create(
            Arc::clone(&self.core),
            callback,
            interface,
            protocol,
            service_type,
            domain,
            flags,
        )
    }

    /// Creates a resolver for a service a browser reported. Pass the
    /// identity tuple exactly as the browser delivered it. The resolver
    /// keeps reporting record changes and removal until released.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidArgument`] (before the daemon is contacted) if
    /// the identity's name or type is empty.
    pub fn create_service_resolver(
        &self,
        callback: ResolverCallback,
        service: &ServiceIdentity,
        address_protocol: Protocol,
        flags: LookupFlags,
    ) -> Result<ServiceResolver, ClientError> {
        if service.name.is_empty() || service.service_type.is_empty() {
            return Err(ClientError::InvalidArgument(
                "service name and type must not be empty".to_string(),
            ));
        }
        self.core.ensure_live().map_err(ClientError::Daemon)?;
        ServiceResolver::create(
            Arc::clone(&self.core),
            callback,
            service,
            address_protocol,
            flags,
        )
    }

    /// Creates a browser querying one DNS record of a host.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidArgument`] (before the daemon is contacted) if
    /// `name` is empty.
    #[allow(clippy::too_many_arguments)]
    pub fn create_record_browser(
        &self,
        callback: RecordCallback,
        interface: i32,
        protocol: Protocol,
        name: &str,
        class: DnsClass,
        record_type: RecordType,
        flags: LookupFlags,
    ) -> Result<RecordBrowser, ClientError> {
        if name.is_empty() {
            return Err(ClientError::InvalidArgument(
                "record name must not be empty".to_string(),
            ));
        }
        self.core.ensure_live().map_err(ClientError::Daemon)?;
        RecordBrowser::create(
            Arc::clone(&self.core),
            callback,
            interface,
            protocol,
            name,
            class,
            record_type,
            flags,
        )
    }

    // ---- derived capability -----------------------------------------------

    /// Resolves one service and blocks until the first answer arrives.
    ///
    /// Spins up a single-use client with its own event loop, waits on a
    /// condition variable the resolver callback signals, then tears
    /// everything down again. With `timeout` set, gives up after the given
    /// duration with `ErrorCode::Timeout`.
    pub fn resolve_service(
        binding: Arc<dyn ServiceBinding>,
        service: &ServiceIdentity,
        address_protocol: Protocol,
        flags: LookupFlags,
        timeout: Option<Duration>,
    ) -> Result<ResolvedService, ClientError> {
        let client = Client::new(binding)?;
        client.start().map_err(ClientError::Daemon)?;

        // The callback can fire before this thread starts waiting; the
        // slot behind the mutex makes that ordering irrelevant.
        type Slot = (Mutex<Option<ResolverEvent>>, Condvar);
        let slot: Arc<Slot> = Arc::new((Mutex::new(None), Condvar::new()));
        let writer = Arc::clone(&slot);
        let resolver = client.create_service_resolver(
            Box::new(move |event| {
                let (result, ready) = &*writer;
                let mut guard = lock(result);
                if guard.is_none() {
                    *guard = Some(event);
                    ready.notify_all();
                }
            }),
            service,
            address_protocol,
            flags,
        )?;

        let outcome = {
            let (result, ready) = &*slot;
            let guard = lock(result);
            match timeout {
                Some(limit) => {
                    let (mut guard, _) = ready
                        .wait_timeout_while(guard, limit, |slot| slot.is_none())
                        .unwrap_or_else(PoisonError::into_inner);
                    guard.take()
                }
                None => {
                    let mut guard = ready
                        .wait_while(guard, |slot| slot.is_none())
                        .unwrap_or_else(PoisonError::into_inner);
                    guard.take()
                }
            }
        };

        resolver.release();
        client.release();

        match outcome {
            Some(ResolverEvent::Resolved(resolved)) => Ok(resolved),
            Some(ResolverEvent::Removed) => Err(ClientError::Daemon(ErrorCode::NotFound)),
            Some(ResolverEvent::Failed) => Err(ClientError::Daemon(ErrorCode::Failure)),
            None => Err(ClientError::Daemon(ErrorCode::Timeout)),
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.core.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{AddressPayload, FakeDaemon};
    use discod_core::LookupResultFlags;

    fn found(
        name: &str,
        service_type: &str,
        host_name: &str,
        address: Option<AddressPayload>,
    ) -> RawResolverEvent {
        RawResolverEvent::Found {
            interface: 1,
            protocol: Protocol::Inet,
            name: name.to_string(),
            service_type: service_type.to_string(),
            domain: "local".to_string(),
            host_name: host_name.to_string(),
            address,
            port: 9000,
            txt_records: vec!["k=v".to_string()],
            flags: LookupResultFlags::MULTICAST,
        }
    }

    #[test]
    fn test_empty_found_translates_to_removed() {
        let daemon = FakeDaemon::new();
        let event = RawResolverEvent::Found {
            interface: -1,
            protocol: Protocol::Any,
            name: String::new(),
            service_type: String::new(),
            domain: String::new(),
            host_name: String::new(),
            address: None,
            port: 0,
            txt_records: Vec::new(),
            flags: LookupResultFlags::NONE,
        };
        assert_eq!(
            translate_resolver_event(&daemon, event),
            ResolverEvent::Removed
        );
    }

    #[test]
    fn test_failure_translates_to_failed() {
        let daemon = FakeDaemon::new();
        assert_eq!(
            translate_resolver_event(&daemon, RawResolverEvent::Failure),
            ResolverEvent::Failed
        );
    }

    #[test]
    fn test_found_with_fields_stays_resolved() {
        let daemon = FakeDaemon::new();
        let event = found("svc", "_test._tcp", "box.local", None);
        match translate_resolver_event(&daemon, event) {
            ResolverEvent::Resolved(resolved) => {
                assert_eq!(resolved.name, "svc");
                assert_eq!(resolved.host_name, "box.local");
                assert_eq!(resolved.address, None);
            }
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    #[test]
    fn test_undecodable_address_becomes_none() {
        let daemon = FakeDaemon::new();
        let event = found(
            "svc",
            "_test._tcp",
            "box.local",
            Some(AddressPayload::new(vec![0xFF])),
        );
        match translate_resolver_event(&daemon, event) {
            ResolverEvent::Resolved(resolved) => assert_eq!(resolved.address, None),
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    #[test]
    fn test_decodable_address_is_parsed() {
        let daemon = FakeDaemon::new();
        let event = found(
            "svc",
            "_test._tcp",
            "box.local",
            Some(AddressPayload::new(vec![4, 192, 0, 2, 17])),
        );
        match translate_resolver_event(&daemon, event) {
            ResolverEvent::Resolved(resolved) => {
                let address = resolved.address.expect("address should decode");
                assert_eq!(address.to_string(), "192.0.2.17");
                assert_eq!(address.family(), Protocol::Inet);
            }
            other => panic!("expected Resolved, got {other:?}"),
        }
    }
}
