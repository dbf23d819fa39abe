//! Lookup-flag and lookup-result-flag bitsets.
//!
//! `LookupFlags` narrows what a browse/resolve operation asks the daemon
//! for; `LookupResultFlags` describes where an answer came from. Both are
//! thin newtypes over the raw bit values carried on the daemon protocol.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

// ============================================================================
// Lookup flags
// ============================================================================

/// Flags controlling the scope of a browse/resolve request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupFlags(u32);

impl LookupFlags {
    /// No restriction; the default for most lookups.
    pub const NONE: LookupFlags = LookupFlags(0);
    /// When resolving a service, do not look up its TXT records.
    pub const NO_TXT: LookupFlags = LookupFlags(1);
    /// When resolving a service, do not look up its address record.
    pub const NO_ADDRESS: LookupFlags = LookupFlags(1 << 1);

    const ALL: u32 = (1 << 2) - 1;

    /// The raw bit value carried on the daemon protocol.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Reconstructs flags from raw bits. Returns `None` if any bit outside
    /// the recognized set is present.
    pub fn from_bits(bits: u32) -> Option<Self> {
        (bits & !Self::ALL == 0).then_some(LookupFlags(bits))
    }

    pub fn contains(self, other: LookupFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for LookupFlags {
    type Output = LookupFlags;

    fn bitor(self, rhs: LookupFlags) -> LookupFlags {
        LookupFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for LookupFlags {
    fn bitor_assign(&mut self, rhs: LookupFlags) {
        self.0 |= rhs.0;
    }
}

// ============================================================================
// Lookup result flags
// ============================================================================

/// Flags describing the provenance of a browse/resolve answer.
///
/// `LOCAL` and `OUR_OWN` are only reported on newly-discovered items, never
/// on removals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupResultFlags(u32);

impl LookupResultFlags {
    pub const NONE: LookupResultFlags = LookupResultFlags(0);
    /// The answer was served from the daemon's cache.
    pub const CACHED: LookupResultFlags = LookupResultFlags(1);
    /// The answer originates from wide-area (unicast) DNS.
    pub const WIDE_AREA: LookupResultFlags = LookupResultFlags(1 << 1);
    /// The answer originates from multicast DNS.
    pub const MULTICAST: LookupResultFlags = LookupResultFlags(1 << 2);
    /// The item resides on, and was announced by, the local host.
    pub const LOCAL: LookupResultFlags = LookupResultFlags(1 << 3);
    /// The item belongs to the same daemon session as the watch object.
    pub const OUR_OWN: LookupResultFlags = LookupResultFlags(1 << 4);
    /// The answer was defined statically by daemon configuration.
    pub const STATIC: LookupResultFlags = LookupResultFlags(1 << 5);

    const ALL: u32 = (1 << 6) - 1;

    /// The raw bit value carried on the daemon protocol.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Reconstructs flags from raw bits. Returns `None` if any bit outside
    /// the recognized set is present.
    pub fn from_bits(bits: u32) -> Option<Self> {
        (bits & !Self::ALL == 0).then_some(LookupResultFlags(bits))
    }

    pub fn contains(self, other: LookupResultFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for LookupResultFlags {
    type Output = LookupResultFlags;

    fn bitor(self, rhs: LookupResultFlags) -> LookupResultFlags {
        LookupResultFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for LookupResultFlags {
    fn bitor_assign(&mut self, rhs: LookupResultFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for LookupResultFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(LookupResultFlags, &str); 6] = [
            (LookupResultFlags::CACHED, "cached"),
            (LookupResultFlags::WIDE_AREA, "wide-area"),
            (LookupResultFlags::MULTICAST, "multicast"),
            (LookupResultFlags::LOCAL, "local"),
            (LookupResultFlags::OUR_OWN, "our-own"),
            (LookupResultFlags::STATIC, "static"),
        ];

        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(", ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}
