//! Service browsers: watches for services of one type appearing and
//! disappearing.

use std::sync::Arc;

use tracing::debug;

use discod_core::{BrowserEvent, LookupFlags, Protocol};

use crate::client::{BrowserCallback, ClientCore};
use crate::error::ClientError;
use crate::watch::{WatchCore, WatchHandle};

/// Watches the network for services of a given type.
///
/// Created with `Client::create_service_browser`. Every matching service
/// appearing or disappearing is reported to the callback as a
/// [`BrowserEvent`] on the client's event-loop thread; pass the identity
/// from an `Added` event verbatim to `Client::create_service_resolver` to
/// resolve it.
pub struct ServiceBrowser {
    core: Arc<WatchCore<BrowserEvent>>,
}

impl ServiceBrowser {
    pub(crate) fn create(
        client: Arc<ClientCore>,
        callback: BrowserCallback,
        interface: i32,
        protocol: Protocol,
        service_type: &str,
        domain: Option<&str>,
        flags: LookupFlags,
    ) -> Result<ServiceBrowser, ClientError> {
        let handle = client
            .binding
            .open_service_browser(client.session, interface, protocol, service_type, domain, flags)
            .map_err(ClientError::Daemon)?;
        let core = WatchCore::new(Arc::clone(&client), WatchHandle::Browser(handle), callback);
        client.register_browser(handle, &core);
        debug!(browser = ?handle, service_type, "service browser created");
        Ok(ServiceBrowser { core })
    }

    /// Stops the browse and suppresses further callbacks. Idempotent.
    pub fn release(&self) {
        self.core.release();
    }
}

impl Drop for ServiceBrowser {
    fn drop(&mut self) {
        self.core.release();
    }
}
