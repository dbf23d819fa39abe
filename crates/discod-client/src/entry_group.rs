//! Entry groups: batches of services published and withdrawn together.
//!
//! Stage services with [`EntryGroup::add_service`], publish them with
//! [`EntryGroup::commit`], and watch the group callback for the
//! asynchronous outcome: `Registering` followed by `Established`, or
//! `Collision` when a staged name is already taken on the network. TXT
//! records of a committed service can be swapped in place with
//! [`EntryGroup::update_service`] — no second commit needed.
//!
//! Argument validation happens before the daemon is contacted, but failures
//! are reported in the same [`ErrorCode`] space as daemon rejections, so
//! callers cannot (and need not) tell the two apart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use discod_core::{ErrorCode, GroupState, Protocol, MAX_SERVICE_NAME_LEN};

use crate::binding::{GroupHandle, ServiceSpec};
use crate::client::{ClientCore, GroupCallback};
use crate::error::ClientError;
use crate::sync::lock;

/// Counter feeding [`EntryGroup::find_alternative_service_name`]; never
/// repeats within one process run.
static NEXT_SUFFIX: AtomicU64 = AtomicU64::new(2);

// ============================================================================
// Group core
// ============================================================================

pub(crate) struct GroupCore {
    client: Arc<ClientCore>,
    handle: GroupHandle,
    callback: Option<GroupCallback>,
    released: Mutex<bool>,
}

impl GroupCore {
    /// Runs the group callback unless the group has been released.
    /// Only ever called from the owning client's event-loop thread.
    pub(crate) fn dispatch(&self, state: GroupState) {
        let released = lock(&self.released);
        if *released {
            trace!(group = ?self.handle, "dispatch suppressed for released group");
            return;
        }
        drop(released);
        if let Some(callback) = &self.callback {
            callback(state);
        }
    }

    pub(crate) fn release(&self) {
        let mut released = lock(&self.released);
        if *released {
            return;
        }
        *released = true;
        drop(released);

        self.client.forget_group(self.handle);
        if let Err(code) = self.client.binding.close_group(self.handle) {
            debug!(group = ?self.handle, code = %code, "close during group release");
        }
        debug!(group = ?self.handle, "entry group released");
    }

    /// Serializes a state-mutating operation and rejects released groups.
    fn guard(&self) -> Result<MutexGuard<'_, bool>, ErrorCode> {
        let released = lock(&self.released);
        if *released {
            return Err(ErrorCode::InvalidObject);
        }
        Ok(released)
    }
}

// ============================================================================
// Entry group
// ============================================================================

/// A batch of services published under one client.
///
/// Created with `Client::create_entry_group`. Releasing the group (or its
/// client) withdraws everything it published.
pub struct EntryGroup {
    core: Arc<GroupCore>,
}

impl EntryGroup {
    pub(crate) fn create(
        client: Arc<ClientCore>,
        callback: Option<GroupCallback>,
    ) -> Result<EntryGroup, ClientError> {
        let handle = client
            .binding
            .open_group(client.session)
            .map_err(ClientError::Daemon)?;
        let core = Arc::new(GroupCore {
            client: Arc::clone(&client),
            handle,
            callback,
            released: Mutex::new(false),
        });
        client.register_group(handle, &core);
        debug!(group = ?handle, "entry group created");
        Ok(EntryGroup { core })
    }

    /// Stages a service in the group. Nothing reaches the network until
    /// [`commit`](EntryGroup::commit).
    ///
    /// `domain` of `None` publishes in the host's own domain; `host` of
    /// `None` announces the local host. TXT records are free-form
    /// `key=value` strings, published in order.
    ///
    /// # Errors
    ///
    /// `InvalidServiceName` for an empty name or one longer than 63 bytes,
    /// `InvalidServiceType` for an empty type, `InvalidPort` for a port
    /// above 65535 — all detected locally — plus anything the daemon
    /// reports, e.g. `Collision` for a duplicate within the group.
    #[allow(clippy::too_many_arguments)]
    pub fn add_service(
        &self,
        interface: i32,
        protocol: Protocol,
        name: &str,
        service_type: &str,
        domain: Option<&str>,
        host: Option<&str>,
        port: u32,
        txt_records: &[String],
    ) -> Result<(), ErrorCode> {
        validate_service_name(name)?;
        if service_type.is_empty() {
            return Err(ErrorCode::InvalidServiceType);
        }
        let port = u16::try_from(port).map_err(|_| ErrorCode::InvalidPort)?;

        let _guard = self.core.guard()?;
        let spec = ServiceSpec {
            interface,
            protocol,
            name: name.to_string(),
            service_type: service_type.to_string(),
            domain: domain.map(str::to_string),
            host: host.map(str::to_string),
            port,
            txt_records: txt_records.to_vec(),
        };
        self.core.client.binding.add_service(self.core.handle, &spec)
    }

    /// Registers an additional subtype for a service already staged in this
    /// group.
    ///
    /// # Errors
    ///
    /// `InvalidServiceName` / `InvalidServiceSubtype` for locally rejected
    /// arguments; `NotFound` from the daemon when no staged service
    /// matches.
    pub fn add_service_subtype(
        &self,
        interface: i32,
        protocol: Protocol,
        name: &str,
        service_type: &str,
        domain: Option<&str>,
        subtype: &str,
    ) -> Result<(), ErrorCode> {
        validate_service_name(name)?;
        if service_type.is_empty() || subtype.is_empty() {
            return Err(ErrorCode::InvalidServiceSubtype);
        }

        let _guard = self.core.guard()?;
        self.core.client.binding.add_service_subtype(
            self.core.handle,
            interface,
            protocol,
            name,
            service_type,
            domain,
            subtype,
        )
    }

    /// Replaces the TXT records of a committed service. Takes effect
    /// immediately; do not commit again.
    pub fn update_service(
        &self,
        interface: i32,
        protocol: Protocol,
        name: &str,
        service_type: &str,
        domain: Option<&str>,
        txt_records: &[String],
    ) -> Result<(), ErrorCode> {
        validate_service_name(name)?;
        if service_type.is_empty() {
            return Err(ErrorCode::InvalidServiceType);
        }

        let _guard = self.core.guard()?;
        self.core.client.binding.update_service(
            self.core.handle,
            interface,
            protocol,
            name,
            service_type,
            domain,
            txt_records,
        )
    }

    /// Publishes everything staged in the group.
    ///
    /// Returns the immediate daemon status only; the outcome arrives
    /// asynchronously on the group callback as `Registering` and then
    /// `Established`, or `Collision` if a staged name is already taken.
    pub fn commit(&self) -> Result<(), ErrorCode> {
        let _guard = self.core.guard()?;
        self.core.client.binding.commit_group(self.core.handle)
    }

    /// Withdraws every published service and returns the group to
    /// `Uncommitted`.
    pub fn reset(&self) -> Result<(), ErrorCode> {
        let _guard = self.core.guard()?;
        self.core.client.binding.reset_group(self.core.handle)
    }

    /// Whether no services have been staged yet.
    pub fn is_empty(&self) -> Result<bool, ErrorCode> {
        let _guard = self.core.guard()?;
        self.core.client.binding.group_is_empty(self.core.handle)
    }

    /// The group's current state as the daemon reports it.
    pub fn state(&self) -> Result<GroupState, ErrorCode> {
        let _guard = self.core.guard()?;
        self.core.client.binding.group_state(self.core.handle)
    }

    /// Releases the group, unpublishing everything it holds. Idempotent.
    pub fn release(&self) {
        self.core.release();
    }

    /// Suggests a replacement for a colliding service name.
    ///
    /// Purely local: strips any ` #N` suffix a previous round added, then
    /// appends a process-wide counter, keeping the result within the
    /// 63-byte name limit. Never returns the same string twice within one
    /// process run and never consults the daemon.
    pub fn find_alternative_service_name(colliding_name: &str) -> String {
        let base = strip_counter_suffix(colliding_name);
        let n = NEXT_SUFFIX.fetch_add(1, Ordering::Relaxed);
        let suffix = format!(" #{n}");
        let base = truncate_at_char_boundary(base, MAX_SERVICE_NAME_LEN.saturating_sub(suffix.len()));
        format!("{base}{suffix}")
    }
}

impl Drop for EntryGroup {
    fn drop(&mut self) {
        self.core.release();
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn validate_service_name(name: &str) -> Result<(), ErrorCode> {
    if name.is_empty() || name.len() > MAX_SERVICE_NAME_LEN {
        return Err(ErrorCode::InvalidServiceName);
    }
    Ok(())
}

/// Strips a trailing ` #N` previously added by the alternative-name
/// suggestion, so repeated collisions do not pile up suffixes.
fn strip_counter_suffix(name: &str) -> &str {
    if let Some(pos) = name.rfind(" #") {
        let digits = &name[pos + 2..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return &name[..pos];
        }
    }
    name
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
