//! Event payloads delivered to watch-object callbacks.
//!
//! Each watch object registers a single handler receiving one of these sum
//! types. Failure variants deliberately carry no fields: when a watch fails,
//! no other part of the payload is meaningful, and the type makes reading
//! one impossible.

use serde::{Deserialize, Serialize};

use crate::flags::LookupResultFlags;
use crate::record::RecordData;
use crate::service::{ResolvedService, ServiceIdentity};

/// An event delivered to a service browser callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrowserEvent {
    /// A service matching the browse filter appeared.
    Added {
        service: ServiceIdentity,
        flags: LookupResultFlags,
    },
    /// A previously reported service disappeared.
    Removed {
        service: ServiceIdentity,
        flags: LookupResultFlags,
    },
    /// Everything the daemon had cached for this browse has been reported.
    CacheExhausted,
    /// No more answers are expected in the short term.
    AllForNow,
    /// The browse failed; the browser delivers nothing further.
    Failed,
}

/// An event delivered to a service resolver callback.
///
/// A live resolver keeps reporting: the initial `Resolved`, further
/// `Resolved` events when the service's records change (e.g. a TXT update),
/// and `Removed` when the service leaves the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolverEvent {
    /// The service was resolved (or its records changed).
    Resolved(ResolvedService),
    /// The watched service is gone.
    Removed,
    /// The service could not be resolved.
    Failed,
}

/// An event delivered to a record browser callback. Same taxonomy as
/// [`BrowserEvent`], carrying raw records instead of service identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordEvent {
    Added(RecordData),
    Removed(RecordData),
    CacheExhausted,
    AllForNow,
    Failed,
}
