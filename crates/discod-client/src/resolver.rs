//! Service resolvers: turn a browsed service identity into connectable
//! host/address/port/TXT data and keep watching it.

use std::sync::Arc;

use tracing::debug;

use discod_core::{LookupFlags, Protocol, ResolverEvent, ServiceIdentity};

use crate::client::{ClientCore, ResolverCallback};
use crate::error::ClientError;
use crate::watch::{WatchCore, WatchHandle};

/// A live, continuing resolution of one service.
///
/// Created with `Client::create_service_resolver` from the identity tuple a
/// browser reported. Until released, the resolver keeps delivering
/// [`ResolverEvent`]s: the initial `Resolved`, another `Resolved` whenever
/// the service's records change, and `Removed` when the service leaves the
/// network.
pub struct ServiceResolver {
    core: Arc<WatchCore<ResolverEvent>>,
}

impl ServiceResolver {
    pub(crate) fn create(
        client: Arc<ClientCore>,
        callback: ResolverCallback,
        service: &ServiceIdentity,
        address_protocol: Protocol,
        flags: LookupFlags,
    ) -> Result<ServiceResolver, ClientError> {
        let handle = client
            .binding
            .open_service_resolver(client.session, service, address_protocol, flags)
            .map_err(ClientError::Daemon)?;
        let core = WatchCore::new(Arc::clone(&client), WatchHandle::Resolver(handle), callback);
        client.register_resolver(handle, &core);
        debug!(resolver = ?handle, name = %service.name, "service resolver created");
        Ok(ServiceResolver { core })
    }

    /// Stops watching the service and suppresses further callbacks.
    /// Idempotent.
    pub fn release(&self) {
        self.core.release();
    }
}

impl Drop for ServiceResolver {
    fn drop(&mut self) {
        self.core.release();
    }
}
