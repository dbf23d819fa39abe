//! discod-core — shared domain types for the discod client library.
//!
//! This crate holds the leaf data types shared between the session machinery
//! in `discod-client` and application code: the daemon status catalog,
//! lookup/result flag bitsets, state enumerations, address values and the
//! event payloads delivered to watch callbacks.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()` or `todo!()` outside of tests.

pub mod address;
pub mod event;
pub mod flags;
pub mod record;
pub mod service;
pub mod state;
pub mod status;

// Re-exports for convenience
pub use address::{AddressValue, Protocol};
pub use event::{BrowserEvent, RecordEvent, ResolverEvent};
pub use flags::{LookupFlags, LookupResultFlags};
pub use record::{DnsClass, RecordData, RecordType};
pub use service::{ResolvedService, ServiceIdentity};
pub use state::{ClientState, GroupState};
pub use status::ErrorCode;

/// Interface index meaning "use every available interface".
pub const ANY_INTERFACE: i32 = -1;

/// Maximum length of a service instance name, in bytes of UTF-8.
pub const MAX_SERVICE_NAME_LEN: usize = 63;
