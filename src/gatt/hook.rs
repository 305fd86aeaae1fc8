use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::util::name_of;
use crate::{AdapterState, Central, Uuid};

use super::*;

/// Authorization hook result. An error rejects the request and is sent to the
/// central.
pub type HookResult = std::result::Result<(), ErrorCode>;

/// Read access presented to the read hook.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct ReadAccess<'a> {
    pub central: Central,
    pub uuid: Uuid,
    /// Current characteristic value.
    pub value: &'a [u8],
    pub offset: usize,
}

/// Write access presented to the write hook.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct WriteAccess<'a> {
    pub central: Central,
    pub uuid: Uuid,
    /// Current characteristic value.
    pub value: &'a [u8],
    /// Value that will be stored if the whole batch is accepted.
    pub new_value: &'a [u8],
    /// Bytes written by the central.
    pub bytes: &'a [u8],
    pub offset: usize,
}

/// Defines a cloneable wrapper around a shared callback.
macro_rules! hook {
    ($(#[$outer:meta])* $t:ident($($f:tt)*)) => {
        $(#[$outer])*
        #[derive(Clone)]
        #[repr(transparent)]
        pub struct $t(Arc<dyn $($f)* + Send + Sync>);

        impl Debug for $t {
            #[inline]
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                (f.debug_tuple(name_of!($t)).field(&Arc::as_ptr(&self.0))).finish()
            }
        }

        impl<T: $($f)* + Send + Sync + 'static> From<T> for $t {
            #[inline(always)]
            fn from(f: T) -> Self {
                Self(Arc::new(f))
            }
        }
    };
}

hook! {
    /// Read authorization hook.
    ReadHook(for<'a> Fn(&ReadAccess<'a>) -> HookResult)
}

hook! {
    /// Write authorization hook. Called once per request in a batch.
    WriteHook(for<'a> Fn(&WriteAccess<'a>) -> HookResult)
}

hook! {
    /// Adapter state observer.
    StateHook(Fn(AdapterState))
}

impl ReadHook {
    #[inline(always)]
    pub(crate) fn call(&self, r: &ReadAccess) -> HookResult {
        (self.0)(r)
    }
}

impl WriteHook {
    #[inline(always)]
    pub(crate) fn call(&self, w: &WriteAccess) -> HookResult {
        (self.0)(w)
    }
}

impl StateHook {
    #[inline(always)]
    pub(crate) fn call(&self, s: AdapterState) {
        (self.0)(s);
    }
}

/// Installed hooks. Unset hooks permit every request.
#[derive(Clone, Debug, Default)]
pub(crate) struct Hooks {
    pub read: Option<ReadHook>,
    pub write: Option<WriteHook>,
    pub state: Option<StateHook>,
}

impl Hooks {
    /// Authorizes a read.
    #[inline]
    pub fn read(&self, r: &ReadAccess) -> HookResult {
        self.read.as_ref().map_or(Ok(()), |h| h.call(r))
    }

    /// Authorizes one write of a batch.
    #[inline]
    pub fn write(&self, w: &WriteAccess) -> HookResult {
        self.write.as_ref().map_or(Ok(()), |h| h.call(w))
    }

    /// Reports an adapter state change.
    #[inline]
    pub fn state(&self, s: AdapterState) {
        if let Some(h) = self.state.as_ref() {
            h.call(s);
        }
    }
}

impl<'a> WriteAccess<'a> {
    /// Creates a write access for the specified values.
    #[inline]
    pub(crate) const fn new(
        central: Central,
        uuid: Uuid,
        value: &'a [u8],
        new_value: &'a [u8],
        bytes: &'a [u8],
        offset: usize,
    ) -> Self {
        Self {
            central,
            uuid,
            value,
            new_value,
            bytes,
            offset,
        }
    }
}

impl<'a> ReadAccess<'a> {
    /// Creates a read access for the specified value.
    #[inline]
    pub(crate) const fn new(central: Central, uuid: Uuid, value: &'a [u8], offset: usize) -> Self {
        Self {
            central,
            uuid,
            value,
            offset,
        }
    }
}

/// Returns `val` with `bytes` written at `off`, or an error if the offset is
/// past the end of the value or the result exceeds the maximum attribute
/// value length ([Vol 3] Part F, Section 3.4.6.1).
pub(crate) fn splice(
    val: &[u8],
    off: usize,
    bytes: &[u8],
) -> std::result::Result<Vec<u8>, ErrorCode> {
    if off > val.len() {
        return Err(ErrorCode::InvalidOffset);
    }
    let end = off
        .checked_add(bytes.len())
        .filter(|&n| n <= MAX_VAL_LEN)
        .ok_or(ErrorCode::InvalidAttributeValueLength)?;
    let mut v = Vec::with_capacity(val.len().max(end));
    v.extend_from_slice(&val[..off]);
    v.extend_from_slice(bytes);
    if end < val.len() {
        v.extend_from_slice(&val[end..]);
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_value() {
        assert_eq!(splice(b"hello", 0, b"J").unwrap(), b"Jello");
        assert_eq!(splice(b"hello", 3, b"p!").unwrap(), b"help!");
        assert_eq!(splice(b"hello", 4, b"ooo").unwrap(), b"hellooo");
        assert_eq!(splice(b"hello", 5, b"").unwrap(), b"hello");
        assert_eq!(splice(b"", 0, b"").unwrap(), b"");
        assert_eq!(splice(b"abc", 4, b"x"), Err(ErrorCode::InvalidOffset));

        let full = vec![0; MAX_VAL_LEN];
        assert_eq!(splice(&full, 1, &[1; MAX_VAL_LEN - 1]).unwrap().len(), MAX_VAL_LEN);
        assert_eq!(
            splice(&full, 1, &[1; MAX_VAL_LEN]),
            Err(ErrorCode::InvalidAttributeValueLength)
        );
    }

    #[test]
    fn hooks() {
        let c = Central { id: 1 };
        let u = Uuid::from_u16(0x2A00).unwrap();
        let mut h = Hooks::default();
        assert!(h.read(&ReadAccess::new(c, u, b"", 0)).is_ok());
        assert!(h.write(&WriteAccess::new(c, u, b"", b"x", b"x", 0)).is_ok());
        h.state(AdapterState::PoweredOn);

        h.read = Some(ReadHook::from(|r: &ReadAccess| {
            if r.offset == 0 {
                Ok(())
            } else {
                Err(ErrorCode::ReadNotPermitted)
            }
        }));
        h.write = Some(WriteHook::from(|w: &WriteAccess| {
            if w.new_value.len() <= 2 {
                Ok(())
            } else {
                Err(ErrorCode::ValueNotAllowed)
            }
        }));
        assert!(h.read(&ReadAccess::new(c, u, b"ab", 0)).is_ok());
        assert_eq!(h.read(&ReadAccess::new(c, u, b"ab", 1)), Err(ErrorCode::ReadNotPermitted));
        assert!(h.write(&WriteAccess::new(c, u, b"a", b"ab", b"b", 1)).is_ok());
        assert_eq!(
            h.write(&WriteAccess::new(c, u, b"ab", b"abc", b"c", 2)),
            Err(ErrorCode::ValueNotAllowed)
        );
        assert!(format!("{:?}", h.read.unwrap()).starts_with("ReadHook("));
    }
}
