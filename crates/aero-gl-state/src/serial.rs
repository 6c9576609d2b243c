//! Opaque resource identity tokens.
//!
//! The resource layer issues a [`ResourceSerial`] for every object it hands to the state manager.
//! The state manager only stores and compares serials to detect changes; it never owns or destroys
//! the objects behind them.

use std::fmt;
use std::num::NonZeroU64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceSerial(NonZeroU64);

impl ResourceSerial {
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ResourceSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic serial allocator. Serials from one factory are unique and strictly increasing.
#[derive(Debug)]
pub struct SerialFactory {
    next: u64,
}

impl Default for SerialFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialFactory {
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Factory whose serials start at `first`. Independent allocators (the device, the state
    /// cache, the caller's resource layer) use disjoint bases so their serials never collide.
    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: if first == 0 { 1 } else { first },
        }
    }

    pub fn generate(&mut self) -> ResourceSerial {
        let raw = self.next;
        // 2^64 serials will not be exhausted by a single device.
        self.next = self.next.wrapping_add(1).max(1);
        ResourceSerial(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }
}

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub ResourceSerial);

        impl $name {
            pub const fn serial(self) -> ResourceSerial {
                self.0
            }
        }

        impl From<ResourceSerial> for $name {
            fn from(serial: ResourceSerial) -> Self {
                Self(serial)
            }
        }
    };
}

native_handle!(
    /// Native buffer (vertex, index, constant or stream-out).
    BufferId
);
native_handle!(
    /// Native resource view (shader resource, unordered access, render target or depth-stencil).
    ViewId
);
native_handle!(
    /// Compiled native shader executable.
    ShaderId
);
native_handle!(
    /// Immutable native state object (blend, depth-stencil, rasterizer or sampler).
    StateObjectId
);
native_handle!(InputLayoutId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serials_are_strictly_increasing() {
        let mut factory = SerialFactory::new();
        let a = factory.generate();
        let b = factory.generate();
        let c = factory.generate();
        assert!(a < b && b < c);
        assert_eq!(a.get(), 1);
        assert_eq!(c.to_string(), "#3");
    }

    #[test]
    fn handles_compare_by_serial() {
        let mut factory = SerialFactory::new();
        let serial = factory.generate();
        assert_eq!(BufferId(serial), BufferId::from(serial));
        assert_ne!(BufferId(serial), BufferId(factory.generate()));
    }
}
