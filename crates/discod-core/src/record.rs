//! DNS record classes, record types and raw record payloads.

use serde::{Deserialize, Serialize};

use crate::address::Protocol;
use crate::flags::LookupResultFlags;

/// DNS record class. Only the Internet class is meaningful here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DnsClass {
    /// The Internet class (`IN`).
    In,
}

impl DnsClass {
    /// The wire value of this class.
    pub fn as_u16(self) -> u16 {
        match self {
            DnsClass::In => 1,
        }
    }
}

/// DNS resource-record types a record browser can query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address.
    A,
    /// Name server.
    Ns,
    /// Canonical name (alias).
    Cname,
    /// Start of authority.
    Soa,
    /// Pointer (reverse lookup).
    Ptr,
    /// Host information.
    Hinfo,
    /// Mail exchange.
    Mx,
    /// Free-form text.
    Txt,
    /// IPv6 address.
    Aaaa,
    /// Service location.
    Srv,
}

impl RecordType {
    /// The wire value of this record type.
    pub fn as_u16(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Ns => 2,
            RecordType::Cname => 5,
            RecordType::Soa => 6,
            RecordType::Ptr => 12,
            RecordType::Hinfo => 13,
            RecordType::Mx => 15,
            RecordType::Txt => 16,
            RecordType::Aaaa => 28,
            RecordType::Srv => 33,
        }
    }
}

/// One answer delivered to a record browser.
///
/// `rdata` is the record's payload exactly as the daemon delivered it; its
/// interpretation depends on `record_type` and is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordData {
    pub interface: i32,
    pub protocol: Protocol,
    /// Fully-qualified name the record belongs to.
    pub name: String,
    pub class: DnsClass,
    pub record_type: RecordType,
    pub rdata: Vec<u8>,
    pub flags: LookupResultFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_wire_values() {
        assert_eq!(RecordType::A.as_u16(), 1);
        assert_eq!(RecordType::Txt.as_u16(), 16);
        assert_eq!(RecordType::Aaaa.as_u16(), 28);
        assert_eq!(RecordType::Srv.as_u16(), 33);
        assert_eq!(DnsClass::In.as_u16(), 1);
    }

    #[test]
    fn test_record_data_serde_round_trip() {
        let record = RecordData {
            interface: 1,
            protocol: Protocol::Inet,
            name: "box.local".to_string(),
            class: DnsClass::In,
            record_type: RecordType::A,
            rdata: vec![192, 0, 2, 17],
            flags: LookupResultFlags::MULTICAST,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: RecordData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
