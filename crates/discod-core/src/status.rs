//! The daemon status-code catalog.
//!
//! Every operation the daemon can refuse maps to one code in this closed
//! catalog. Success is not part of the catalog: fallible operations return
//! `Result<_, ErrorCode>`, so "code 0 / OK" is simply `Ok(())`. The raw
//! integer values are part of the daemon contract and must not be renumbered.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure code reported by the daemon (or by local validation, which maps
/// into the same space so callers cannot distinguish the two).
///
/// The `Display` implementation renders the human-readable description of
/// each code, which is the library-side rendering of the daemon's
/// "status code to text" facility.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    /// Generic failure.
    #[error("operation failed")]
    Failure = -1,
    /// Object was in a bad state for the requested operation.
    #[error("bad state")]
    BadState = -2,
    #[error("invalid host name")]
    InvalidHostName = -3,
    #[error("invalid domain name")]
    InvalidDomainName = -4,
    /// No suitable network protocol available.
    #[error("no suitable network protocol available")]
    NoNetwork = -5,
    #[error("invalid DNS TTL")]
    InvalidTtl = -6,
    /// Resource-record key is a pattern.
    #[error("resource record key is a pattern")]
    IsPattern = -7,
    /// Name collision with an already-registered service.
    #[error("local name collision")]
    Collision = -8,
    #[error("invalid resource record")]
    InvalidRecord = -9,
    #[error("invalid service name")]
    InvalidServiceName = -10,
    #[error("invalid service type")]
    InvalidServiceType = -11,
    #[error("invalid port number")]
    InvalidPort = -12,
    #[error("invalid record key")]
    InvalidKey = -13,
    #[error("invalid address")]
    InvalidAddress = -14,
    #[error("timeout reached")]
    Timeout = -15,
    #[error("too many clients")]
    TooManyClients = -16,
    #[error("too many objects")]
    TooManyObjects = -17,
    #[error("too many entries")]
    TooManyEntries = -18,
    /// Operating-system error.
    #[error("OS error")]
    Os = -19,
    #[error("access denied")]
    AccessDenied = -20,
    #[error("invalid operation")]
    InvalidOperation = -21,
    /// Unexpected error on the daemon's IPC bus.
    #[error("unexpected bus error")]
    BusError = -22,
    /// The connection to the daemon was lost.
    #[error("daemon connection failed")]
    Disconnected = -23,
    #[error("memory exhausted")]
    NoMemory = -24,
    /// The handle passed to an operation no longer refers to a live object.
    #[error("the object passed to this function was invalid")]
    InvalidObject = -25,
    /// The daemon is not running.
    #[error("daemon not running")]
    NoDaemon = -26,
    #[error("invalid interface")]
    InvalidInterface = -27,
    #[error("invalid protocol")]
    InvalidProtocol = -28,
    #[error("invalid flags")]
    InvalidFlags = -29,
    #[error("not found")]
    NotFound = -30,
    #[error("invalid configuration")]
    InvalidConfig = -31,
    /// The daemon speaks an incompatible protocol version.
    #[error("version mismatch")]
    VersionMismatch = -32,
    #[error("invalid service subtype")]
    InvalidServiceSubtype = -33,
    #[error("invalid packet")]
    InvalidPacket = -34,
    #[error("invalid DNS return code")]
    InvalidDnsError = -35,
    #[error("DNS failure: FORMERR")]
    DnsFormErr = -36,
    #[error("DNS failure: SERVFAIL")]
    DnsServFail = -37,
    #[error("DNS failure: NXDOMAIN")]
    DnsNxDomain = -38,
    #[error("DNS failure: NOTIMP")]
    DnsNotImp = -39,
    #[error("DNS failure: REFUSED")]
    DnsRefused = -40,
    #[error("DNS failure: YXDOMAIN")]
    DnsYxDomain = -41,
    #[error("DNS failure: YXRRSET")]
    DnsYxRrSet = -42,
    #[error("DNS failure: NXRRSET")]
    DnsNxRrSet = -43,
    #[error("DNS failure: NOTAUTH")]
    DnsNotAuth = -44,
    #[error("DNS failure: NOTZONE")]
    DnsNotZone = -45,
    #[error("invalid RDATA")]
    InvalidRdata = -46,
    #[error("invalid DNS class")]
    InvalidDnsClass = -47,
    #[error("invalid DNS type")]
    InvalidDnsType = -48,
    #[error("not supported")]
    NotSupported = -49,
    #[error("operation not permitted")]
    NotPermitted = -50,
    #[error("invalid argument")]
    InvalidArgument = -51,
    /// The object has no contents (e.g. committing an empty entry group).
    #[error("is empty")]
    IsEmpty = -52,
    /// The requested operation is invalid because it is redundant.
    #[error("no change")]
    NoChange = -53,
}

impl ErrorCode {
    /// The raw integer value carried on the daemon protocol.
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Looks up the code for a raw daemon value. Returns `None` for values
    /// outside the catalog (including zero, which is not an error).
    pub fn from_raw(raw: i32) -> Option<Self> {
        use ErrorCode::*;
        Some(match raw {
            -1 => Failure,
            -2 => BadState,
            -3 => InvalidHostName,
            -4 => InvalidDomainName,
            -5 => NoNetwork,
            -6 => InvalidTtl,
            -7 => IsPattern,
            -8 => Collision,
            -9 => InvalidRecord,
            -10 => InvalidServiceName,
            -11 => InvalidServiceType,
            -12 => InvalidPort,
            -13 => InvalidKey,
            -14 => InvalidAddress,
            -15 => Timeout,
            -16 => TooManyClients,
            -17 => TooManyObjects,
            -18 => TooManyEntries,
            -19 => Os,
            -20 => AccessDenied,
            -21 => InvalidOperation,
            -22 => BusError,
            -23 => Disconnected,
            -24 => NoMemory,
            -25 => InvalidObject,
            -26 => NoDaemon,
            -27 => InvalidInterface,
            -28 => InvalidProtocol,
            -29 => InvalidFlags,
            -30 => NotFound,
            -31 => InvalidConfig,
            -32 => VersionMismatch,
            -33 => InvalidServiceSubtype,
            -34 => InvalidPacket,
            -35 => InvalidDnsError,
            -36 => DnsFormErr,
            -37 => DnsServFail,
            -38 => DnsNxDomain,
            -39 => DnsNotImp,
            -40 => DnsRefused,
            -41 => DnsYxDomain,
            -42 => DnsYxRrSet,
            -43 => DnsNxRrSet,
            -44 => DnsNotAuth,
            -45 => DnsNotZone,
            -46 => InvalidRdata,
            -47 => InvalidDnsClass,
            -48 => InvalidDnsType,
            -49 => NotSupported,
            -50 => NotPermitted,
            -51 => InvalidArgument,
            -52 => IsEmpty,
            -53 => NoChange,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip() {
        for raw in -53..=-1 {
            let code = ErrorCode::from_raw(raw).expect("catalog is dense over -53..=-1");
            assert_eq!(code.as_raw(), raw);
        }
    }

    #[test]
    fn test_from_raw_rejects_out_of_catalog() {
        assert_eq!(ErrorCode::from_raw(0), None);
        assert_eq!(ErrorCode::from_raw(1), None);
        assert_eq!(ErrorCode::from_raw(-54), None);
        assert_eq!(ErrorCode::from_raw(i32::MIN), None);
    }

    #[test]
    fn test_display_text() {
        assert_eq!(ErrorCode::BadState.to_string(), "bad state");
        assert_eq!(ErrorCode::NoDaemon.to_string(), "daemon not running");
        assert_eq!(
            ErrorCode::InvalidServiceName.to_string(),
            "invalid service name"
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::to_string(&ErrorCode::Collision).unwrap();
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorCode::Collision);
    }
}
