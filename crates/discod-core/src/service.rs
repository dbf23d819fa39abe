//! Service identity and resolved-service payload types.

use serde::{Deserialize, Serialize};

use crate::address::{AddressValue, Protocol};
use crate::flags::LookupResultFlags;

/// The 5-tuple identifying a concrete service instance on the network.
///
/// A service browser reports this tuple for every service it sees; to
/// resolve the service, pass the tuple verbatim to
/// `Client::create_service_resolver` — the daemon matches on the exact
/// interface, protocol, name, type and domain it announced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// Interface index the service was seen on.
    pub interface: i32,
    /// Address family the service was announced with.
    pub protocol: Protocol,
    /// Instance name, e.g. `"Laser Printer 4F"`.
    pub name: String,
    /// Service type, e.g. `"_ipp._tcp"`.
    pub service_type: String,
    /// Domain the service was announced in, e.g. `"local"`.
    pub domain: String,
}

impl ServiceIdentity {
    pub fn new(
        interface: i32,
        protocol: Protocol,
        name: impl Into<String>,
        service_type: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        ServiceIdentity {
            interface,
            protocol,
            name: name.into(),
            service_type: service_type.into(),
            domain: domain.into(),
        }
    }
}

/// Everything the daemon knows about a resolved service: where it is
/// reachable and the discovery-time metadata attached to it.
///
/// `address` is `None` when the lookup was made with
/// `LookupFlags::NO_ADDRESS` or when the daemon delivered no usable
/// address record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedService {
    pub interface: i32,
    pub protocol: Protocol,
    pub name: String,
    pub service_type: String,
    pub domain: String,
    /// Host name of the machine the service runs on.
    pub host_name: String,
    pub address: Option<AddressValue>,
    pub port: u16,
    /// TXT strings in the order the daemon reported them.
    pub txt_records: Vec<String>,
    pub flags: LookupResultFlags,
}

impl ResolvedService {
    /// The identity tuple of the resolved service.
    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity::new(
            self.interface,
            self.protocol,
            self.name.clone(),
            self.service_type.clone(),
            self.domain.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_resolved() {
        let resolved = ResolvedService {
            interface: 2,
            protocol: Protocol::Inet,
            name: "unit".to_string(),
            service_type: "_test._tcp".to_string(),
            domain: "local".to_string(),
            host_name: "box.local".to_string(),
            address: None,
            port: 8080,
            txt_records: vec!["k=v".to_string()],
            flags: LookupResultFlags::MULTICAST,
        };

        let identity = resolved.identity();
        assert_eq!(identity.interface, 2);
        assert_eq!(identity.service_type, "_test._tcp");
        assert_eq!(identity.domain, "local");
    }

    #[test]
    fn test_identity_serde_round_trip() {
        let identity = ServiceIdentity::new(-1, Protocol::Any, "svc", "_http._tcp", "local");
        let json = serde_json::to_string(&identity).unwrap();
        let back: ServiceIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, identity);
    }
}
