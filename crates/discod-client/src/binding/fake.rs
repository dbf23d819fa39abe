//! An in-process daemon implementing the binding contract.
//!
//! `FakeDaemon` gives the session layer a complete, hermetic backend: it
//! keeps a table of published services shared across sessions, replays
//! cached answers to new browsers, answers resolvers (honoring lookup
//! flags), and emits the same event sequences a real daemon would —
//! including the wire-level "empty FOUND" removal signal. The test suite is
//! built on it, and consumers can use it for their own hermetic tests.
//!
//! It is not a network implementation: nothing leaves the process.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Mutex;

use tracing::debug;

use discod_core::{
    AddressValue, BrowserEvent, ClientState, DnsClass, ErrorCode, GroupState, LookupFlags,
    LookupResultFlags, Protocol, RecordData, RecordEvent, RecordType, ServiceIdentity,
    ANY_INTERFACE,
};

use super::{
    AddressPayload, BrowserHandle, DaemonEvent, EventSender, GroupHandle, Handle,
    RawResolverEvent, RecordHandle, ResolverHandle, ServiceBinding, ServiceSpec, SessionHandle,
};
use crate::sync::lock;

/// IPv4 address the fake daemon reports for every published service.
const FAKE_V4: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 17);
/// IPv6 address the fake daemon reports for every published service.
const FAKE_V6: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x17);

// ============================================================================
// Arena
// ============================================================================

/// Slot storage with generation counters. Removing an entry bumps the
/// slot's generation, so handles to removed objects stop resolving.
struct Arena<T> {
    slots: Vec<Slot<T>>,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Arena { slots: Vec::new() }
    }

    fn insert(&mut self, value: T) -> (u32, u32) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.is_none() {
                slot.value = Some(value);
                return (index as u32, slot.generation);
            }
        }
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        ((self.slots.len() - 1) as u32, 0)
    }

    fn get(&self, index: u32, generation: u32) -> Option<&T> {
        self.slots
            .get(index as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_ref())
    }

    fn get_mut(&mut self, index: u32, generation: u32) -> Option<&mut T> {
        self.slots
            .get_mut(index as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_mut())
    }

    fn remove(&mut self, index: u32, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation || slot.value.is_none() {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        slot.value.take()
    }

    /// Iterates live entries as `(index, generation, value)`.
    fn entries(&self) -> impl Iterator<Item = (u32, u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.value.as_ref().map(|v| (index as u32, slot.generation, v)))
    }
}

// ============================================================================
// Daemon state
// ============================================================================

struct SessionEntry {
    events: EventSender,
    state: ClientState,
    loop_started: bool,
}

#[derive(Clone)]
struct StagedService {
    interface: i32,
    protocol: Protocol,
    name: String,
    service_type: String,
    domain: String,
    host: String,
    port: u16,
    txt_records: Vec<String>,
    subtypes: Vec<String>,
}

struct GroupEntry {
    session: SessionHandle,
    state: GroupState,
    staged: Vec<StagedService>,
}

struct PublishedService {
    group: GroupHandle,
    session: SessionHandle,
    service: StagedService,
}

struct BrowserEntry {
    session: SessionHandle,
    interface: i32,
    protocol: Protocol,
    service_type: String,
    domain: String,
}

struct ResolverEntry {
    session: SessionHandle,
    target: ServiceIdentity,
    address_protocol: Protocol,
    flags: LookupFlags,
}

struct RecordBrowserEntry {
    session: SessionHandle,
}

struct StoredRecord {
    name: String,
    class: DnsClass,
    record_type: RecordType,
    rdata: Vec<u8>,
}

struct DaemonState {
    sessions: Arena<SessionEntry>,
    groups: Arena<GroupEntry>,
    browsers: Arena<BrowserEntry>,
    resolvers: Arena<ResolverEntry>,
    record_browsers: Arena<RecordBrowserEntry>,
    published: Vec<PublishedService>,
    records: Vec<StoredRecord>,
    host_name: String,
    domain_name: String,
    refuse_sessions: bool,
    service_add_attempts: u32,
}

fn protocols_overlap(a: Protocol, b: Protocol) -> bool {
    a == Protocol::Any || b == Protocol::Any || a == b
}

fn interfaces_overlap(a: i32, b: i32) -> bool {
    a == ANY_INTERFACE || b == ANY_INTERFACE || a == b
}

impl DaemonState {
    fn session(&self, handle: SessionHandle) -> Result<&SessionEntry, ErrorCode> {
        self.sessions
            .get(handle.index(), handle.generation())
            .ok_or(ErrorCode::InvalidObject)
    }

    fn session_mut(&mut self, handle: SessionHandle) -> Result<&mut SessionEntry, ErrorCode> {
        self.sessions
            .get_mut(handle.index(), handle.generation())
            .ok_or(ErrorCode::InvalidObject)
    }

    fn group(&self, handle: GroupHandle) -> Result<&GroupEntry, ErrorCode> {
        self.groups
            .get(handle.index(), handle.generation())
            .ok_or(ErrorCode::InvalidObject)
    }

    fn group_mut(&mut self, handle: GroupHandle) -> Result<&mut GroupEntry, ErrorCode> {
        self.groups
            .get_mut(handle.index(), handle.generation())
            .ok_or(ErrorCode::InvalidObject)
    }

    /// Queues an event on a session's channel. Events sent while the loop is
    /// stopped sit in the channel until the loop is started again; a closed
    /// receiver is ignored.
    fn emit(&self, session: SessionHandle, event: DaemonEvent) {
        if let Some(entry) = self.sessions.get(session.index(), session.generation()) {
            let _ = entry.events.send(event);
        }
    }

    fn set_group_state(&mut self, group: GroupHandle, new_state: GroupState) {
        let session = match self.groups.get_mut(group.index(), group.generation()) {
            Some(entry) => {
                entry.state = new_state;
                entry.session
            }
            None => return,
        };
        self.emit(
            session,
            DaemonEvent::GroupState {
                group,
                state: new_state,
            },
        );
    }

    fn identity_of(service: &StagedService) -> ServiceIdentity {
        ServiceIdentity::new(
            service.interface,
            service.protocol,
            service.name.clone(),
            service.service_type.clone(),
            service.domain.clone(),
        )
    }

    fn browser_matches(browser: &BrowserEntry, service: &StagedService) -> bool {
        browser.service_type == service.service_type
            && browser.domain == service.domain
            && interfaces_overlap(browser.interface, service.interface)
            && protocols_overlap(browser.protocol, service.protocol)
    }

    fn resolver_matches(resolver: &ResolverEntry, service: &StagedService) -> bool {
        resolver.target.name == service.name
            && resolver.target.service_type == service.service_type
            && resolver.target.domain == service.domain
            && interfaces_overlap(resolver.target.interface, service.interface)
            && protocols_overlap(resolver.target.protocol, service.protocol)
    }

    fn encode_address(&self, address_protocol: Protocol) -> AddressPayload {
        match address_protocol {
            Protocol::Inet6 => {
                let mut bytes = vec![6];
                bytes.extend_from_slice(&FAKE_V6.octets());
                AddressPayload::new(bytes)
            }
            // Any resolves to the v4 address.
            Protocol::Inet | Protocol::Any => {
                let mut bytes = vec![4];
                bytes.extend_from_slice(&FAKE_V4.octets());
                AddressPayload::new(bytes)
            }
        }
    }

    /// Builds the `Found` answer a resolver receives for a published service.
    fn resolved_answer(
        &self,
        resolver: &ResolverEntry,
        publisher: SessionHandle,
        service: &StagedService,
    ) -> RawResolverEvent {
        let mut flags = LookupResultFlags::MULTICAST | LookupResultFlags::LOCAL;
        if resolver.session == publisher {
            flags |= LookupResultFlags::OUR_OWN;
        }
        let address = if resolver.flags.contains(LookupFlags::NO_ADDRESS) {
            None
        } else {
            Some(self.encode_address(resolver.address_protocol))
        };
        let txt_records = if resolver.flags.contains(LookupFlags::NO_TXT) {
            Vec::new()
        } else {
            service.txt_records.clone()
        };
        RawResolverEvent::Found {
            interface: service.interface,
            protocol: service.protocol,
            name: service.name.clone(),
            service_type: service.service_type.clone(),
            domain: service.domain.clone(),
            host_name: service.host.clone(),
            address,
            port: service.port,
            txt_records,
            flags,
        }
    }

    /// The wire-level removal signal: a `Found` with empty name, type and
    /// host name.
    fn removal_answer() -> RawResolverEvent {
        RawResolverEvent::Found {
            interface: ANY_INTERFACE,
            protocol: Protocol::Any,
            name: String::new(),
            service_type: String::new(),
            domain: String::new(),
            host_name: String::new(),
            address: None,
            port: 0,
            txt_records: Vec::new(),
            flags: LookupResultFlags::NONE,
        }
    }

    /// Publishes one service: records it and notifies matching browsers and
    /// resolvers.
    fn publish(&mut self, group: GroupHandle, publisher: SessionHandle, service: StagedService) {
        let mut notifications = Vec::new();
        for (index, generation, browser) in self.browsers.entries() {
            if Self::browser_matches(browser, &service) {
                let mut flags = LookupResultFlags::MULTICAST | LookupResultFlags::LOCAL;
                if browser.session == publisher {
                    flags |= LookupResultFlags::OUR_OWN;
                }
                notifications.push((
                    browser.session,
                    DaemonEvent::ServiceBrowser {
                        browser: Handle::new(index, generation),
                        event: BrowserEvent::Added {
                            service: Self::identity_of(&service),
                            flags,
                        },
                    },
                ));
            }
        }
        for (index, generation, resolver) in self.resolvers.entries() {
            if Self::resolver_matches(resolver, &service) {
                notifications.push((
                    resolver.session,
                    DaemonEvent::ServiceResolver {
                        resolver: Handle::new(index, generation),
                        event: self.resolved_answer(resolver, publisher, &service),
                    },
                ));
            }
        }
        self.published.push(PublishedService {
            group,
            session: publisher,
            service,
        });
        for (session, event) in notifications {
            self.emit(session, event);
        }
    }

    /// Withdraws every service the group published and notifies watchers.
    fn unpublish_group(&mut self, group: GroupHandle) {
        let mut removed = Vec::new();
        let mut kept = Vec::new();
        for p in std::mem::take(&mut self.published) {
            if p.group == group {
                removed.push(p.service);
            } else {
                kept.push(p);
            }
        }
        self.published = kept;

        let mut notifications = Vec::new();
        for service in &removed {
            for (index, generation, browser) in self.browsers.entries() {
                if Self::browser_matches(browser, service) {
                    notifications.push((
                        browser.session,
                        DaemonEvent::ServiceBrowser {
                            browser: Handle::new(index, generation),
                            event: BrowserEvent::Removed {
                                service: Self::identity_of(service),
                                flags: LookupResultFlags::MULTICAST,
                            },
                        },
                    ));
                }
            }
            for (index, generation, resolver) in self.resolvers.entries() {
                if Self::resolver_matches(resolver, service) {
                    notifications.push((
                        resolver.session,
                        DaemonEvent::ServiceResolver {
                            resolver: Handle::new(index, generation),
                            event: Self::removal_answer(),
                        },
                    ));
                }
            }
        }
        for (session, event) in notifications {
            self.emit(session, event);
        }
    }
}

// ============================================================================
// FakeDaemon
// ============================================================================

/// An in-process implementation of [`ServiceBinding`]; see the module docs.
pub struct FakeDaemon {
    state: Mutex<DaemonState>,
}

impl FakeDaemon {
    pub fn new() -> Self {
        FakeDaemon {
            state: Mutex::new(DaemonState {
                sessions: Arena::new(),
                groups: Arena::new(),
                browsers: Arena::new(),
                resolvers: Arena::new(),
                record_browsers: Arena::new(),
                published: Vec::new(),
                records: Vec::new(),
                host_name: "fakehost".to_string(),
                domain_name: "local".to_string(),
                refuse_sessions: false,
                service_add_attempts: 0,
            }),
        }
    }

    /// Makes every subsequent `open_session` fail with
    /// `ErrorCode::NoDaemon`, as if the daemon were not running.
    pub fn refuse_sessions(&self, refuse: bool) {
        lock(&self.state).refuse_sessions = refuse;
    }

    /// Adds a record served to record browsers querying `name`.
    pub fn add_record(&self, name: &str, class: DnsClass, record_type: RecordType, rdata: Vec<u8>) {
        lock(&self.state).records.push(StoredRecord {
            name: name.to_string(),
            class,
            record_type,
            rdata,
        });
    }

    /// Simulates the daemon dying: every session sees a `Failure` state
    /// change and then its event channel closes.
    pub fn shut_down(&self) {
        let mut state = lock(&self.state);
        for (index, generation, entry) in state.sessions.entries() {
            let session = Handle::new(index, generation);
            let _ = entry.events.send(DaemonEvent::ClientState {
                session,
                state: ClientState::Failure,
            });
        }
        // Dropping the senders disconnects every event channel.
        state.sessions = Arena::new();
        state.groups = Arena::new();
        state.browsers = Arena::new();
        state.resolvers = Arena::new();
        state.record_browsers = Arena::new();
        state.published.clear();
    }

    /// How often `add_service` reached the binding. Lets tests assert that
    /// locally rejected registrations never touch the daemon.
    pub fn service_add_attempts(&self) -> u32 {
        lock(&self.state).service_add_attempts
    }

    /// Number of currently published services, across all sessions.
    pub fn published_count(&self) -> usize {
        lock(&self.state).published.len()
    }
}

impl Default for FakeDaemon {
    fn default() -> Self {
        FakeDaemon::new()
    }
}

impl ServiceBinding for FakeDaemon {
    fn initialize(&self) -> Result<(), ErrorCode> {
        // Nothing to load; redundant calls are the common case.
        Ok(())
    }

    fn open_session(&self, events: EventSender) -> Result<SessionHandle, ErrorCode> {
        let mut state = lock(&self.state);
        if state.refuse_sessions {
            return Err(ErrorCode::NoDaemon);
        }
        let (index, generation) = state.sessions.insert(SessionEntry {
            events,
            state: ClientState::Connecting,
            loop_started: false,
        });
        let handle = Handle::new(index, generation);
        debug!(session = ?handle, "fake daemon: session opened");
        Ok(handle)
    }

    fn close_session(&self, session: SessionHandle) {
        let mut state = lock(&self.state);

        let group_handles: Vec<GroupHandle> = state
            .groups
            .entries()
            .filter(|(_, _, g)| g.session == session)
            .map(|(index, generation, _)| Handle::new(index, generation))
            .collect();
        for group in group_handles {
            state.unpublish_group(group);
            state.groups.remove(group.index(), group.generation());
        }

        let browser_handles: Vec<BrowserHandle> = state
            .browsers
            .entries()
            .filter(|(_, _, b)| b.session == session)
            .map(|(index, generation, _)| Handle::new(index, generation))
            .collect();
        for browser in browser_handles {
            state.browsers.remove(browser.index(), browser.generation());
        }

        let resolver_handles: Vec<ResolverHandle> = state
            .resolvers
            .entries()
            .filter(|(_, _, r)| r.session == session)
            .map(|(index, generation, _)| Handle::new(index, generation))
            .collect();
        for resolver in resolver_handles {
            state.resolvers.remove(resolver.index(), resolver.generation());
        }

        let record_handles: Vec<RecordHandle> = state
            .record_browsers
            .entries()
            .filter(|(_, _, r)| r.session == session)
            .map(|(index, generation, _)| Handle::new(index, generation))
            .collect();
        for record in record_handles {
            state
                .record_browsers
                .remove(record.index(), record.generation());
        }

        state.sessions.remove(session.index(), session.generation());
        debug!(session = ?session, "fake daemon: session closed");
    }

    fn start_loop(&self, session: SessionHandle) -> Result<(), ErrorCode> {
        let mut state = lock(&self.state);
        let entry = state.session_mut(session)?;
        if entry.loop_started {
            return Err(ErrorCode::BadState);
        }
        entry.loop_started = true;
        entry.state = ClientState::Registering;
        state.emit(
            session,
            DaemonEvent::ClientState {
                session,
                state: ClientState::Registering,
            },
        );
        if let Ok(entry) = state.session_mut(session) {
            entry.state = ClientState::Running;
        }
        state.emit(
            session,
            DaemonEvent::ClientState {
                session,
                state: ClientState::Running,
            },
        );
        Ok(())
    }

    fn stop_loop(&self, session: SessionHandle) -> Result<(), ErrorCode> {
        let mut state = lock(&self.state);
        let entry = state.session_mut(session)?;
        if !entry.loop_started {
            return Err(ErrorCode::BadState);
        }
        entry.loop_started = false;
        state.emit(session, DaemonEvent::LoopStopped);
        Ok(())
    }

    fn host_name(&self, session: SessionHandle) -> Result<String, ErrorCode> {
        let state = lock(&self.state);
        state.session(session)?;
        Ok(state.host_name.clone())
    }

    fn domain_name(&self, session: SessionHandle) -> Result<String, ErrorCode> {
        let state = lock(&self.state);
        state.session(session)?;
        Ok(state.domain_name.clone())
    }

    fn fqdn(&self, session: SessionHandle) -> Result<String, ErrorCode> {
        let state = lock(&self.state);
        state.session(session)?;
        Ok(format!("{}.{}", state.host_name, state.domain_name))
    }

    fn set_host_name(&self, session: SessionHandle, name: &str) -> Result<(), ErrorCode> {
        let mut state = lock(&self.state);
        state.session(session)?;
        if name.is_empty() {
            return Err(ErrorCode::InvalidHostName);
        }
        state.host_name = name.to_string();
        Ok(())
    }

    fn client_state(&self, session: SessionHandle) -> Result<ClientState, ErrorCode> {
        Ok(lock(&self.state).session(session)?.state)
    }

    fn open_group(&self, session: SessionHandle) -> Result<GroupHandle, ErrorCode> {
        let mut state = lock(&self.state);
        state.session(session)?;
        let (index, generation) = state.groups.insert(GroupEntry {
            session,
            state: GroupState::Uncommitted,
            staged: Vec::new(),
        });
        Ok(Handle::new(index, generation))
    }

    fn close_group(&self, group: GroupHandle) -> Result<(), ErrorCode> {
        let mut state = lock(&self.state);
        state.group(group)?;
        state.unpublish_group(group);
        state.groups.remove(group.index(), group.generation());
        Ok(())
    }

    fn add_service(&self, group: GroupHandle, service: &ServiceSpec) -> Result<(), ErrorCode> {
        let mut state = lock(&self.state);
        state.service_add_attempts += 1;
        let default_domain = state.domain_name.clone();
        let default_host = format!("{}.{}", state.host_name, state.domain_name);
        let entry = state.group_mut(group)?;
        let domain = service
            .domain
            .clone()
            .unwrap_or(default_domain);
        let duplicate = entry.staged.iter().any(|staged| {
            staged.name == service.name
                && staged.service_type == service.service_type
                && staged.domain == domain
        });
        if duplicate {
            return Err(ErrorCode::Collision);
        }
        entry.staged.push(StagedService {
            interface: service.interface,
            protocol: service.protocol,
            name: service.name.clone(),
            service_type: service.service_type.clone(),
            domain,
            host: service.host.clone().unwrap_or(default_host),
            port: service.port,
            txt_records: service.txt_records.clone(),
            subtypes: Vec::new(),
        });
        Ok(())
    }

    fn add_service_subtype(
        &self,
        group: GroupHandle,
        interface: i32,
        protocol: Protocol,
        name: &str,
        service_type: &str,
        domain: Option<&str>,
        subtype: &str,
    ) -> Result<(), ErrorCode> {
        let mut state = lock(&self.state);
        let default_domain = state.domain_name.clone();
        let entry = state.group_mut(group)?;
        let domain = domain.unwrap_or(&default_domain);
        let staged = entry.staged.iter_mut().find(|staged| {
            staged.name == name
                && staged.service_type == service_type
                && staged.domain == domain
                && interfaces_overlap(staged.interface, interface)
                && protocols_overlap(staged.protocol, protocol)
        });
        match staged {
            Some(service) => {
                service.subtypes.push(subtype.to_string());
                Ok(())
            }
            None => Err(ErrorCode::NotFound),
        }
    }

    fn update_service(
        &self,
        group: GroupHandle,
        interface: i32,
        protocol: Protocol,
        name: &str,
        service_type: &str,
        domain: Option<&str>,
        txt_records: &[String],
    ) -> Result<(), ErrorCode> {
        let mut state = lock(&self.state);
        state.group(group)?;
        let domain = domain.unwrap_or(&state.domain_name).to_string();

        let mut updated: Option<(SessionHandle, StagedService)> = None;
        for p in state.published.iter_mut() {
            if p.group == group
                && p.service.name == name
                && p.service.service_type == service_type
                && p.service.domain == domain
                && interfaces_overlap(p.service.interface, interface)
                && protocols_overlap(p.service.protocol, protocol)
            {
                p.service.txt_records = txt_records.to_vec();
                updated = Some((p.session, p.service.clone()));
                break;
            }
        }
        let (publisher, service) = updated.ok_or(ErrorCode::NotFound)?;

        // Keep the staged copy in step so a reset/commit cycle republishes
        // the current records.
        if let Ok(entry) = state.group_mut(group) {
            for staged in entry.staged.iter_mut() {
                if staged.name == name && staged.service_type == service_type {
                    staged.txt_records = txt_records.to_vec();
                }
            }
        }

        let mut notifications = Vec::new();
        for (index, generation, resolver) in state.resolvers.entries() {
            if DaemonState::resolver_matches(resolver, &service) {
                notifications.push((
                    resolver.session,
                    DaemonEvent::ServiceResolver {
                        resolver: Handle::new(index, generation),
                        event: state.resolved_answer(resolver, publisher, &service),
                    },
                ));
            }
        }
        for (session, event) in notifications {
            state.emit(session, event);
        }
        Ok(())
    }

    fn commit_group(&self, group: GroupHandle) -> Result<(), ErrorCode> {
        let mut state = lock(&self.state);
        let (session, group_state, staged) = {
            let entry = state.group(group)?;
            (entry.session, entry.state, entry.staged.clone())
        };
        if group_state != GroupState::Uncommitted {
            return Err(ErrorCode::BadState);
        }
        if staged.is_empty() {
            return Err(ErrorCode::IsEmpty);
        }

        state.set_group_state(group, GroupState::Registering);

        let collision = staged.iter().any(|service| {
            state.published.iter().any(|p| {
                p.group != group
                    && p.service.name == service.name
                    && p.service.service_type == service.service_type
                    && p.service.domain == service.domain
            })
        });
        if collision {
            state.set_group_state(group, GroupState::Collision);
            return Ok(());
        }

        for service in staged {
            state.publish(group, session, service);
        }
        state.set_group_state(group, GroupState::Established);
        Ok(())
    }

    fn reset_group(&self, group: GroupHandle) -> Result<(), ErrorCode> {
        let mut state = lock(&self.state);
        state.group(group)?;
        state.unpublish_group(group);
        if let Ok(entry) = state.group_mut(group) {
            entry.staged.clear();
        }
        state.set_group_state(group, GroupState::Uncommitted);
        Ok(())
    }

    fn group_state(&self, group: GroupHandle) -> Result<GroupState, ErrorCode> {
        Ok(lock(&self.state).group(group)?.state)
    }

    fn group_is_empty(&self, group: GroupHandle) -> Result<bool, ErrorCode> {
        Ok(lock(&self.state).group(group)?.staged.is_empty())
    }

    fn open_service_browser(
        &self,
        session: SessionHandle,
        interface: i32,
        protocol: Protocol,
        service_type: &str,
        domain: Option<&str>,
        flags: LookupFlags,
    ) -> Result<BrowserHandle, ErrorCode> {
        let _ = flags;
        let mut state = lock(&self.state);
        state.session(session)?;
        let domain = domain.unwrap_or(&state.domain_name).to_string();
        let (index, generation) = state.browsers.insert(BrowserEntry {
            session,
            interface,
            protocol,
            service_type: service_type.to_string(),
            domain,
        });
        let handle: BrowserHandle = Handle::new(index, generation);

        // Replay already-published services as cached answers.
        let mut events = Vec::new();
        if let Some(browser) = state.browsers.get(index, generation) {
            for p in &state.published {
                if DaemonState::browser_matches(browser, &p.service) {
                    let mut result_flags = LookupResultFlags::CACHED
                        | LookupResultFlags::MULTICAST
                        | LookupResultFlags::LOCAL;
                    if p.session == session {
                        result_flags |= LookupResultFlags::OUR_OWN;
                    }
                    events.push(BrowserEvent::Added {
                        service: DaemonState::identity_of(&p.service),
                        flags: result_flags,
                    });
                }
            }
        }
        events.push(BrowserEvent::CacheExhausted);
        events.push(BrowserEvent::AllForNow);
        for event in events {
            state.emit(
                session,
                DaemonEvent::ServiceBrowser {
                    browser: handle,
                    event,
                },
            );
        }
        Ok(handle)
    }

    fn close_service_browser(&self, browser: BrowserHandle) -> Result<(), ErrorCode> {
        lock(&self.state)
            .browsers
            .remove(browser.index(), browser.generation())
            .map(|_| ())
            .ok_or(ErrorCode::InvalidObject)
    }

    fn open_service_resolver(
        &self,
        session: SessionHandle,
        service: &ServiceIdentity,
        address_protocol: Protocol,
        flags: LookupFlags,
    ) -> Result<ResolverHandle, ErrorCode> {
        let mut state = lock(&self.state);
        state.session(session)?;
        let (index, generation) = state.resolvers.insert(ResolverEntry {
            session,
            target: service.clone(),
            address_protocol,
            flags,
        });
        let handle: ResolverHandle = Handle::new(index, generation);

        // Answer immediately if the service is already published.
        let answer = state.resolvers.get(index, generation).and_then(|resolver| {
            state
                .published
                .iter()
                .find(|p| DaemonState::resolver_matches(resolver, &p.service))
                .map(|p| state.resolved_answer(resolver, p.session, &p.service))
        });
        if let Some(event) = answer {
            state.emit(
                session,
                DaemonEvent::ServiceResolver {
                    resolver: handle,
                    event,
                },
            );
        }
        Ok(handle)
    }

    fn close_service_resolver(&self, resolver: ResolverHandle) -> Result<(), ErrorCode> {
        lock(&self.state)
            .resolvers
            .remove(resolver.index(), resolver.generation())
            .map(|_| ())
            .ok_or(ErrorCode::InvalidObject)
    }

    fn open_record_browser(
        &self,
        session: SessionHandle,
        interface: i32,
        protocol: Protocol,
        name: &str,
        class: DnsClass,
        record_type: RecordType,
        flags: LookupFlags,
    ) -> Result<RecordHandle, ErrorCode> {
        let _ = flags;
        let mut state = lock(&self.state);
        state.session(session)?;
        let (index, generation) = state
            .record_browsers
            .insert(RecordBrowserEntry { session });
        let handle: RecordHandle = Handle::new(index, generation);

        let mut events = Vec::new();
        for record in &state.records {
            if record.name == name && record.class == class && record.record_type == record_type {
                events.push(RecordEvent::Added(RecordData {
                    interface,
                    protocol,
                    name: record.name.clone(),
                    class: record.class,
                    record_type: record.record_type,
                    rdata: record.rdata.clone(),
                    flags: LookupResultFlags::STATIC,
                }));
            }
        }
        events.push(RecordEvent::CacheExhausted);
        events.push(RecordEvent::AllForNow);
        for event in events {
            state.emit(
                session,
                DaemonEvent::RecordBrowser {
                    browser: handle,
                    event,
                },
            );
        }
        Ok(handle)
    }

    fn close_record_browser(&self, browser: RecordHandle) -> Result<(), ErrorCode> {
        lock(&self.state)
            .record_browsers
            .remove(browser.index(), browser.generation())
            .map(|_| ())
            .ok_or(ErrorCode::InvalidObject)
    }

    fn parse_address(&self, payload: &AddressPayload) -> Result<AddressValue, ErrorCode> {
        let bytes = payload.as_bytes();
        match bytes.split_first() {
            Some((4, octets)) => {
                let octets: [u8; 4] = octets.try_into().map_err(|_| ErrorCode::InvalidAddress)?;
                Ok(AddressValue::new(IpAddr::V4(Ipv4Addr::from(octets))))
            }
            Some((6, octets)) => {
                let octets: [u8; 16] = octets.try_into().map_err(|_| ErrorCode::InvalidAddress)?;
                Ok(AddressValue::new(IpAddr::V6(Ipv6Addr::from(octets))))
            }
            _ => Err(ErrorCode::InvalidAddress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn open_session(daemon: &FakeDaemon) -> (SessionHandle, mpsc::Receiver<DaemonEvent>) {
        let (tx, rx) = mpsc::channel();
        let session = daemon.open_session(tx).expect("session should open");
        (session, rx)
    }

    #[test]
    fn test_stale_handles_are_rejected() {
        let daemon = FakeDaemon::new();
        let (session, _rx) = open_session(&daemon);

        let group = daemon.open_group(session).unwrap();
        daemon.close_group(group).unwrap();

        assert_eq!(daemon.group_state(group), Err(ErrorCode::InvalidObject));
        assert_eq!(daemon.commit_group(group), Err(ErrorCode::InvalidObject));
        // The freed slot can be reused without the old handle resolving.
        let replacement = daemon.open_group(session).unwrap();
        assert_ne!(replacement, group);
        assert_eq!(daemon.group_state(group), Err(ErrorCode::InvalidObject));
    }

    #[test]
    fn test_refuse_sessions() {
        let daemon = FakeDaemon::new();
        daemon.refuse_sessions(true);
        let (tx, _rx) = mpsc::channel();
        assert_eq!(daemon.open_session(tx), Err(ErrorCode::NoDaemon));
    }

    #[test]
    fn test_parse_address_round_trip() {
        let daemon = FakeDaemon::new();
        let state = lock(&daemon.state);
        let v4 = state.encode_address(Protocol::Inet);
        let v6 = state.encode_address(Protocol::Inet6);
        drop(state);

        let v4 = daemon.parse_address(&v4).unwrap();
        assert_eq!(v4.family(), Protocol::Inet);
        assert_eq!(v4.to_string(), "192.0.2.17");

        let v6 = daemon.parse_address(&v6).unwrap();
        assert_eq!(v6.family(), Protocol::Inet6);
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        let daemon = FakeDaemon::new();
        assert_eq!(
            daemon.parse_address(&AddressPayload::new(vec![9, 9, 9])),
            Err(ErrorCode::InvalidAddress)
        );
        assert_eq!(
            daemon.parse_address(&AddressPayload::new(vec![4, 1, 2])),
            Err(ErrorCode::InvalidAddress)
        );
        assert_eq!(
            daemon.parse_address(&AddressPayload::new(Vec::new())),
            Err(ErrorCode::InvalidAddress)
        );
    }

    #[test]
    fn test_commit_empty_group_is_rejected() {
        let daemon = FakeDaemon::new();
        let (session, _rx) = open_session(&daemon);
        let group = daemon.open_group(session).unwrap();
        assert_eq!(daemon.commit_group(group), Err(ErrorCode::IsEmpty));
    }

    #[test]
    fn test_set_host_name_rejects_empty() {
        let daemon = FakeDaemon::new();
        let (session, _rx) = open_session(&daemon);
        assert_eq!(
            daemon.set_host_name(session, ""),
            Err(ErrorCode::InvalidHostName)
        );
        daemon.set_host_name(session, "renamed").unwrap();
        assert_eq!(daemon.fqdn(session).unwrap(), "renamed.local");
    }
}
