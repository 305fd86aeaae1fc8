pub(crate) use pending::*;

mod pending;

/// Returns a string representation of the specified type.
macro_rules! name_of {
    ($t:ty) => {{
        type _T = $t; // Allows $t to be recognized as a type for refactoring
        stringify!($t)
    }};
}
pub(crate) use name_of;

/// Implements `Display` for one or more types by forwarding to `Debug`.
#[macro_export]
#[doc(hidden)]
macro_rules! impl_display_via_debug {
    ($($t:ty),+ $(,)?) => {$(
        impl ::core::fmt::Display for $t {
            #[inline(always)]
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Debug::fmt(self, f)
            }
        }
    )+};
}
