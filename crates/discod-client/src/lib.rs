//! discod-client — session layer for the discod service-discovery daemon.
//!
//! This crate lets a process announce services on the local network,
//! discover services announced by others, and query DNS-style records, all
//! through a long-running local daemon. It implements the client-side
//! session machinery: the connection state machine, the publish-side entry
//! group, and the browse/resolve/record watch objects with their callback
//! dispatch and release semantics.
//!
//! The daemon itself, the wire protocol and all network I/O live behind the
//! [`binding::ServiceBinding`] trait. The bundled
//! [`binding::FakeDaemon`] implements that contract in-process and backs
//! the test suite.
//!
//! # Threading
//!
//! Each started [`Client`] runs exactly one background event-loop thread,
//! and that thread is the only place callbacks execute. Public operations
//! are safe to call from any thread; do not call `Client::stop` or
//! `Client::release` from inside a callback.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use discod_client::binding::{FakeDaemon, ServiceBinding};
//! use discod_client::{Client, Protocol, ANY_INTERFACE};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let binding: Arc<dyn ServiceBinding> = Arc::new(FakeDaemon::new());
//! let client = Client::new(binding)?;
//! client.start()?;
//!
//! let group = client.create_entry_group(None)?;
//! group.add_service(
//!     ANY_INTERFACE,
//!     Protocol::Any,
//!     "My Web Service",
//!     "_http._tcp",
//!     None,
//!     None,
//!     8080,
//!     &["path=/".to_string()],
//! )?;
//! group.commit()?;
//!
//! // Release children before the client.
//! group.release();
//! client.release();
//! # Ok(())
//! # }
//! ```
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()` or `todo!()` outside of tests.

pub mod binding;
pub mod browser;
pub mod client;
pub mod entry_group;
pub mod error;
pub mod record_browser;
pub mod resolver;

mod sync;
mod watch;

// Re-exports for convenience
pub use browser::ServiceBrowser;
pub use client::{
    BrowserCallback, Client, GroupCallback, RecordCallback, ResolverCallback, StateCallback,
};
pub use entry_group::EntryGroup;
pub use error::{ClientError, Result};
pub use record_browser::RecordBrowser;
pub use resolver::ServiceResolver;

pub use discod_core::{
    AddressValue, BrowserEvent, ClientState, DnsClass, ErrorCode, GroupState, LookupFlags,
    LookupResultFlags, Protocol, RecordData, RecordEvent, RecordType, ResolvedService,
    ResolverEvent, ServiceIdentity, ANY_INTERFACE, MAX_SERVICE_NAME_LEN,
};
