//! The opaque binding contract between this library and the daemon.
//!
//! This module defines the `ServiceBinding` trait: the minimal set of
//! primitive operations the session layer requires from whatever actually
//! talks to the daemon. The session layer never interprets handles, never
//! encodes DNS records and never touches the network; it calls these
//! operations and consumes the event stream they feed.
//!
//! # Handles
//!
//! Every daemon-side object is identified by a typed, generation-checked
//! handle. The binding allocates handles and checks index + generation on
//! every call, so a stale handle (one whose object was closed) is rejected
//! with `ErrorCode::InvalidObject` instead of touching freed state.
//!
//! # Event delivery
//!
//! `open_session` is given the sending half of an event channel. The
//! binding must:
//!
//! - deliver events for one session in the order the daemon produced them;
//! - send [`DaemonEvent::LoopStopped`] after a `stop_loop` call and produce
//!   nothing further until the loop is started again;
//! - send a `ClientState` event with [`ClientState::Failure`] and then drop
//!   the sender if the daemon connection is lost.
//!
//! The session layer drains the receiving half on the client's event-loop
//! thread; the binding never runs callbacks itself.

use std::marker::PhantomData;
use std::sync::mpsc;

use discod_core::{
    AddressValue, BrowserEvent, ClientState, DnsClass, ErrorCode, GroupState, LookupFlags,
    LookupResultFlags, Protocol, RecordEvent, RecordType, ServiceIdentity,
};

mod fake;

pub use fake::FakeDaemon;

// ============================================================================
// Typed handles
// ============================================================================

/// Marker types distinguishing the handle kinds.
pub mod kind {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Session;
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Group;
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Browser;
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Resolver;
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Record;
}

/// An index + generation pair identifying one daemon-side object of kind
/// `K`. Opaque to the session layer; only the binding gives it meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle<K> {
    index: u32,
    generation: u32,
    _kind: PhantomData<K>,
}

impl<K> Handle<K> {
    /// Builds a handle from its parts. Intended for binding implementations.
    pub fn new(index: u32, generation: u32) -> Self {
        Handle {
            index,
            generation,
            _kind: PhantomData,
        }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

pub type SessionHandle = Handle<kind::Session>;
pub type GroupHandle = Handle<kind::Group>;
pub type BrowserHandle = Handle<kind::Browser>;
pub type ResolverHandle = Handle<kind::Resolver>;
pub type RecordHandle = Handle<kind::Record>;

// ============================================================================
// Events (binding → session layer)
// ============================================================================

/// Sending half of a session's event channel, owned by the binding.
pub type EventSender = mpsc::Sender<DaemonEvent>;

/// An undecoded address as delivered by the daemon. Only
/// [`ServiceBinding::parse_address`] can interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPayload(Vec<u8>);

impl AddressPayload {
    pub fn new(bytes: Vec<u8>) -> Self {
        AddressPayload(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A resolver event exactly as it appears on the daemon protocol.
///
/// The daemon signals removal of a watched service as a `Found` event whose
/// `name`, `service_type` and `host_name` are all empty. That wire contract
/// is preserved here; the session layer translates it into the explicit
/// `ResolverEvent::Removed` before it reaches application callbacks.
#[derive(Debug, Clone)]
pub enum RawResolverEvent {
    Found {
        interface: i32,
        protocol: Protocol,
        name: String,
        service_type: String,
        domain: String,
        host_name: String,
        address: Option<AddressPayload>,
        port: u16,
        txt_records: Vec<String>,
        flags: LookupResultFlags,
    },
    Failure,
}

/// One asynchronous notification from the daemon, tagged with the handle of
/// the object it concerns.
#[derive(Debug, Clone)]
pub enum DaemonEvent {
    ClientState {
        session: SessionHandle,
        state: ClientState,
    },
    GroupState {
        group: GroupHandle,
        state: GroupState,
    },
    ServiceBrowser {
        browser: BrowserHandle,
        event: BrowserEvent,
    },
    ServiceResolver {
        resolver: ResolverHandle,
        event: RawResolverEvent,
    },
    RecordBrowser {
        browser: RecordHandle,
        event: RecordEvent,
    },
    /// Marker terminating dispatch after a `stop_loop` call.
    LoopStopped,
}

// ============================================================================
// Service description (publish side)
// ============================================================================

/// A fully-validated service registration, as handed to the binding.
///
/// The session layer validates name length, type and port before building
/// one of these; the binding may assume the fields are well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub interface: i32,
    pub protocol: Protocol,
    pub name: String,
    pub service_type: String,
    /// `None` means "the domain this host belongs to".
    pub domain: Option<String>,
    /// `None` means "the local host".
    pub host: Option<String>,
    pub port: u16,
    pub txt_records: Vec<String>,
}

// ============================================================================
// The binding contract
// ============================================================================

/// Primitive daemon operations the session layer is built on.
///
/// All methods are synchronous and must be callable from any thread.
/// Fallible operations report failure through the closed
/// [`ErrorCode`] catalog; success is `Ok`.
pub trait ServiceBinding: Send + Sync {
    /// Prepares the binding for use. Called before every session is opened
    /// and therefore must be idempotent: the first call does the work, later
    /// calls return the stored outcome.
    fn initialize(&self) -> Result<(), ErrorCode>;

    // ---- session ----------------------------------------------------------

    /// Opens a daemon session. Events for the session and all objects
    /// created under it are delivered through `events`.
    fn open_session(&self, events: EventSender) -> Result<SessionHandle, ErrorCode>;

    /// Closes a session and invalidates every handle created under it.
    fn close_session(&self, session: SessionHandle);

    /// Tells the daemon to begin delivering events for this session.
    fn start_loop(&self, session: SessionHandle) -> Result<(), ErrorCode>;

    /// Tells the daemon to stop delivering events; the binding terminates
    /// the stream with [`DaemonEvent::LoopStopped`].
    fn stop_loop(&self, session: SessionHandle) -> Result<(), ErrorCode>;

    fn host_name(&self, session: SessionHandle) -> Result<String, ErrorCode>;
    fn domain_name(&self, session: SessionHandle) -> Result<String, ErrorCode>;
    fn fqdn(&self, session: SessionHandle) -> Result<String, ErrorCode>;
    fn set_host_name(&self, session: SessionHandle, name: &str) -> Result<(), ErrorCode>;
    fn client_state(&self, session: SessionHandle) -> Result<ClientState, ErrorCode>;

    // ---- entry groups -----------------------------------------------------

    fn open_group(&self, session: SessionHandle) -> Result<GroupHandle, ErrorCode>;

    /// Closes a group, unpublishing everything it holds.
    fn close_group(&self, group: GroupHandle) -> Result<(), ErrorCode>;

    /// Stages a service in the group; no network effect until commit.
    fn add_service(&self, group: GroupHandle, service: &ServiceSpec) -> Result<(), ErrorCode>;

    /// Registers an additional subtype for a previously staged service.
    #[allow(clippy::too_many_arguments)]
    fn add_service_subtype(
        &self,
        group: GroupHandle,
        interface: i32,
        protocol: Protocol,
        name: &str,
        service_type: &str,
        domain: Option<&str>,
        subtype: &str,
    ) -> Result<(), ErrorCode>;

    /// Replaces the TXT records of an already-committed service, effective
    /// immediately.
    #[allow(clippy::too_many_arguments)]
    fn update_service(
        &self,
        group: GroupHandle,
        interface: i32,
        protocol: Protocol,
        name: &str,
        service_type: &str,
        domain: Option<&str>,
        txt_records: &[String],
    ) -> Result<(), ErrorCode>;

    fn commit_group(&self, group: GroupHandle) -> Result<(), ErrorCode>;
    fn reset_group(&self, group: GroupHandle) -> Result<(), ErrorCode>;
    fn group_state(&self, group: GroupHandle) -> Result<GroupState, ErrorCode>;
    fn group_is_empty(&self, group: GroupHandle) -> Result<bool, ErrorCode>;

    // ---- watches ----------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn open_service_browser(
        &self,
        session: SessionHandle,
        interface: i32,
        protocol: Protocol,
        service_type: &str,
        domain: Option<&str>,
        flags: LookupFlags,
    ) -> Result<BrowserHandle, ErrorCode>;

    fn close_service_browser(&self, browser: BrowserHandle) -> Result<(), ErrorCode>;

    fn open_service_resolver(
        &self,
        session: SessionHandle,
        service: &ServiceIdentity,
        address_protocol: Protocol,
        flags: LookupFlags,
    ) -> Result<ResolverHandle, ErrorCode>;

    fn close_service_resolver(&self, resolver: ResolverHandle) -> Result<(), ErrorCode>;

    #[allow(clippy::too_many_arguments)]
    fn open_record_browser(
        &self,
        session: SessionHandle,
        interface: i32,
        protocol: Protocol,
        name: &str,
        class: DnsClass,
        record_type: RecordType,
        flags: LookupFlags,
    ) -> Result<RecordHandle, ErrorCode>;

    fn close_record_browser(&self, browser: RecordHandle) -> Result<(), ErrorCode>;

    // ---- misc -------------------------------------------------------------

    /// Decodes a raw address payload into an address value.
    fn parse_address(&self, payload: &AddressPayload) -> Result<AddressValue, ErrorCode>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_kind_distinct() {
        // Same parts, different kinds: these are different types, so this
        // only checks equality within one kind.
        let a = SessionHandle::new(1, 0);
        let b = SessionHandle::new(1, 0);
        let c = SessionHandle::new(1, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.index(), 1);
        assert_eq!(c.generation(), 1);
    }

    #[test]
    fn test_address_payload_is_opaque_bytes() {
        let payload = AddressPayload::new(vec![4, 192, 0, 2, 17]);
        assert_eq!(payload.as_bytes(), &[4, 192, 0, 2, 17]);
    }
}
