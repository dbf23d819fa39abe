//! Shared lifecycle plumbing for browser/resolver watch objects.
//!
//! All three watch kinds (service browser, service resolver, record
//! browser) have the same shape: a daemon handle, a mandatory callback and
//! a terminal released flag. The flag is checked under its lock at every
//! dispatch, so once `release` has returned no further callback begins for
//! that object; a callback already executing is allowed to finish.

use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::binding::{BrowserHandle, RecordHandle, ResolverHandle};
use crate::client::ClientCore;
use crate::sync::lock;

/// The daemon handle of a watch object, tagged by kind so release knows
/// which close operation to invoke.
#[derive(Debug, Clone, Copy)]
pub(crate) enum WatchHandle {
    Browser(BrowserHandle),
    Resolver(ResolverHandle),
    Record(RecordHandle),
}

pub(crate) struct WatchCore<E> {
    client: Arc<ClientCore>,
    handle: WatchHandle,
    callback: Box<dyn Fn(E) + Send + Sync>,
    released: Mutex<bool>,
}

impl<E> WatchCore<E> {
    pub(crate) fn new(
        client: Arc<ClientCore>,
        handle: WatchHandle,
        callback: Box<dyn Fn(E) + Send + Sync>,
    ) -> Arc<Self> {
        Arc::new(WatchCore {
            client,
            handle,
            callback,
            released: Mutex::new(false),
        })
    }

    /// Runs the callback unless the object has been released.
    /// Only ever called from the owning client's event-loop thread.
    pub(crate) fn dispatch(&self, event: E) {
        let released = lock(&self.released);
        if *released {
            trace!(handle = ?self.handle, "dispatch suppressed for released watch");
            return;
        }
        drop(released);
        (self.callback)(event);
    }

    /// Releases the watch. Idempotent: only the first call closes the
    /// daemon handle; later calls return without effect.
    pub(crate) fn release(&self) {
        let mut released = lock(&self.released);
        if *released {
            return;
        }
        *released = true;
        drop(released);

        self.client.forget_watch(self.handle);
        if let Err(code) = self.client.close_watch(self.handle) {
            debug!(handle = ?self.handle, code = %code, "close during watch release");
        }
        debug!(handle = ?self.handle, "watch released");
    }
}
