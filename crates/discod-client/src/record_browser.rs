//! Record browsers: query and watch one DNS record of a host.

use std::sync::Arc;

use tracing::debug;

use discod_core::{DnsClass, LookupFlags, Protocol, RecordEvent, RecordType};

use crate::client::{ClientCore, RecordCallback};
use crate::error::ClientError;
use crate::watch::{WatchCore, WatchHandle};

/// Watches one `(interface, protocol, name, class, type)` record.
///
/// Created with `Client::create_record_browser`. Answers arrive as
/// [`RecordEvent`]s whose payload bytes are left undecoded; their meaning
/// depends on the record type queried.
pub struct RecordBrowser {
    core: Arc<WatchCore<RecordEvent>>,
}

impl RecordBrowser {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create(
        client: Arc<ClientCore>,
        callback: RecordCallback,
        interface: i32,
        protocol: Protocol,
        name: &str,
        class: DnsClass,
        record_type: RecordType,
        flags: LookupFlags,
    ) -> Result<RecordBrowser, ClientError> {
        let handle = client
            .binding
            .open_record_browser(
                client.session,
                interface,
                protocol,
                name,
                class,
                record_type,
                flags,
            )
            .map_err(ClientError::Daemon)?;
        let core = WatchCore::new(Arc::clone(&client), WatchHandle::Record(handle), callback);
        client.register_record_browser(handle, &core);
        debug!(record_browser = ?handle, name, "record browser created");
        Ok(RecordBrowser { core })
    }

    /// Stops the query and suppresses further callbacks. Idempotent.
    pub fn release(&self) {
        self.core.release();
    }
}

impl Drop for RecordBrowser {
    fn drop(&mut self) {
        self.core.release();
    }
}
