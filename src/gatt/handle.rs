use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::util::name_of;

/// Defines an opaque server-allocated handle type.
macro_rules! handle {
    ($(#[$outer:meta])* $t:ident) => {
        $(#[$outer])*
        #[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[repr(transparent)]
        pub struct $t(NonZeroU32);

        impl $t {
            /// Wraps a raw handle. Returns `None` if the handle is invalid.
            #[inline]
            #[must_use]
            pub const fn new(h: u32) -> Option<Self> {
                match NonZeroU32::new(h) {
                    Some(nz) => Some(Self(nz)),
                    None => None,
                }
            }
        }

        impl Debug for $t {
            #[allow(clippy::use_self)]
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:#06X})", name_of!($t), self.0.get())
            }
        }

        impl Display for $t {
            #[inline]
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                Debug::fmt(self, f)
            }
        }

        impl From<$t> for u32 {
            #[inline]
            fn from(h: $t) -> Self {
                h.0.get()
            }
        }
    };
}

handle! {
    /// Identity of a registered service. Adapters use it to match
    /// `ServiceAdded` completions and to unregister the service.
    ServiceHandle
}

handle! {
    /// Identity of a registered characteristic. Adapters refer to
    /// characteristics in read/write requests and value updates only through
    /// this handle.
    CharHandle
}

/// Allocator of unique service and characteristic handles. Handles are never
/// reused by the same allocator.
#[derive(Debug)]
pub(crate) struct HandleAlloc(AtomicU32);

impl HandleAlloc {
    /// Creates a new allocator.
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    /// Returns a new service handle.
    #[inline]
    pub fn service(&self) -> ServiceHandle {
        ServiceHandle(self.next())
    }

    /// Returns a new characteristic handle.
    #[inline]
    pub fn characteristic(&self) -> CharHandle {
        CharHandle(self.next())
    }

    fn next(&self) -> NonZeroU32 {
        let h = self.0.fetch_add(1, Ordering::Relaxed);
        NonZeroU32::new(h).expect("handle space exhausted")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc() {
        let a = HandleAlloc::new();
        let s = a.service();
        let c = a.characteristic();
        assert_eq!(u32::from(s), 1);
        assert_eq!(u32::from(c), 2);
        assert_ne!(u32::from(a.service()), u32::from(s));
        assert_eq!(format!("{c}"), "CharHandle(0x0002)");
        assert_eq!(CharHandle::new(0), None);
        assert_eq!(CharHandle::new(2), Some(c));
    }
}
