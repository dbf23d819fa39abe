//! IP address values and the address-family tag used throughout the API.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::status::ErrorCode;

/// The address family (protocol) of an address, service or lookup.
///
/// Browse and resolve operations accept `Any` to mean "either family";
/// concrete addresses are always `Inet` or `Inet6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// IPv4.
    Inet,
    /// IPv6.
    Inet6,
    /// Either IP version.
    Any,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Protocol::Inet => "IPv4",
            Protocol::Inet6 => "IPv6",
            Protocol::Any => "any",
        };
        f.write_str(label)
    }
}

impl Protocol {
    /// Whether an address of family `family` satisfies this lookup family.
    pub fn matches(self, family: Protocol) -> bool {
        self == Protocol::Any || self == family
    }
}

/// An immutable IPv4 or IPv6 address with its family tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressValue {
    addr: IpAddr,
}

impl AddressValue {
    /// Wraps an already-parsed address.
    pub fn new(addr: IpAddr) -> Self {
        AddressValue { addr }
    }

    /// Parses a textual address and checks it against the expected family.
    ///
    /// # Errors
    ///
    /// `ErrorCode::InvalidAddress` if the text does not parse, if the
    /// parsed family differs from `family`, or if `family` is
    /// `Protocol::Any` (a concrete address always has a concrete family).
    pub fn from_text(text: &str, family: Protocol) -> Result<Self, ErrorCode> {
        if family == Protocol::Any {
            return Err(ErrorCode::InvalidAddress);
        }
        let addr = IpAddr::from_str(text).map_err(|_| ErrorCode::InvalidAddress)?;
        let value = AddressValue { addr };
        if value.family() != family {
            return Err(ErrorCode::InvalidAddress);
        }
        Ok(value)
    }

    pub fn ip(&self) -> IpAddr {
        self.addr
    }

    /// The family tag of this address; never `Protocol::Any`.
    pub fn family(&self) -> Protocol {
        match self.addr {
            IpAddr::V4(_) => Protocol::Inet,
            IpAddr::V6(_) => Protocol::Inet6,
        }
    }
}

impl fmt::Display for AddressValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}

impl From<IpAddr> for AddressValue {
    fn from(addr: IpAddr) -> Self {
        AddressValue::new(addr)
    }
}
