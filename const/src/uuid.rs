use std::fmt::{Debug, Display, Formatter};
use std::num::{NonZeroU128, NonZeroU16};
use std::str::FromStr;

use num_enum::TryFromPrimitive;

const SHIFT: u32 = u128::BITS - u32::BITS;
const BASE: u128 = 0x00000000_0000_1000_8000_00805F9B34FB;
const MASK_16: u128 = !((u16::MAX as u128) << SHIFT);
const MASK_32: u128 = !((u32::MAX as u128) << SHIFT);

/// 16-, 32-, or 128-bit UUID ([Vol 3] Part B, Section 2.5.1). All forms are
/// stored as the full 128-bit value, so two UUIDs compare equal regardless of
/// the form they were created from.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Uuid(NonZeroU128);

impl Uuid {
    /// UUID size in bytes.
    pub const BYTES: usize = std::mem::size_of::<Self>();

    /// Creates a UUID from a `u128`. Returns [`None`] for the nil UUID.
    #[inline]
    #[must_use]
    pub const fn new(v: u128) -> Option<Self> {
        match NonZeroU128::new(v) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }

    /// Creates a UUID from a 16-bit Bluetooth SIG alias. Returns [`None`] if
    /// `v` is zero.
    #[inline]
    #[must_use]
    pub const fn from_u16(v: u16) -> Option<Self> {
        match Uuid16::new(v) {
            Some(u) => Some(u.as_uuid()),
            None => None,
        }
    }

    /// Creates a UUID from a 32-bit Bluetooth SIG alias. Returns [`None`] if
    /// `v` is zero.
    #[inline]
    #[must_use]
    pub const fn from_u32(v: u32) -> Option<Self> {
        if v == 0 {
            return None;
        }
        Self::new((v as u128) << SHIFT | BASE)
    }

    /// Returns the UUID type. Returns [`UuidType::NonSig`] for non-SIG UUID.
    #[inline]
    #[must_use]
    pub fn typ(self) -> UuidType {
        self.as_uuid16().map_or(UuidType::NonSig, Uuid16::typ)
    }

    /// Returns a [`Uuid16`] representation or [`None`] if the UUID is not a
    /// 16-bit SIG alias.
    #[inline]
    #[must_use]
    pub fn as_uuid16(self) -> Option<Uuid16> {
        self.as_u16().and_then(Uuid16::new)
    }

    /// Converts a 16-bit Bluetooth SIG UUID to `u16`. This is mutually
    /// exclusive with `as_u32` and `as_u128`.
    #[inline]
    #[must_use]
    pub fn as_u16(self) -> Option<u16> {
        #[allow(clippy::cast_possible_truncation)]
        let v = (self.0.get() >> SHIFT) as u16;
        (self.0.get() & MASK_16 == BASE && v > 0).then_some(v)
    }

    /// Converts a 32-bit Bluetooth SIG UUID to `u32`. This is mutually
    /// exclusive with `as_u16` and `as_u128`.
    #[inline]
    #[must_use]
    pub fn as_u32(self) -> Option<u32> {
        #[allow(clippy::cast_possible_truncation)]
        let v = (self.0.get() >> SHIFT) as u32;
        (self.0.get() & MASK_32 == BASE && v > u32::from(u16::MAX)).then_some(v)
    }

    /// Converts a non-SIG UUID to `u128`. This is mutually exclusive with
    /// `as_u16` and `as_u32`.
    #[inline]
    #[must_use]
    pub fn as_u128(self) -> Option<u128> {
        (self.0.get() & MASK_32 != BASE).then_some(self.0.get())
    }

    /// Returns the UUID as a little-endian byte array.
    #[inline]
    #[must_use]
    pub const fn to_bytes(self) -> [u8; Self::BYTES] {
        self.0.get().to_le_bytes()
    }
}

impl From<Uuid16> for Uuid {
    #[inline]
    fn from(u: Uuid16) -> Self {
        u.as_uuid()
    }
}

impl From<Uuid> for u128 {
    #[inline]
    fn from(u: Uuid) -> Self {
        u.0.get()
    }
}

impl TryFrom<&[u8]> for Uuid {
    type Error = ();

    /// Converts a little-endian 2- or 16-byte slice.
    fn try_from(v: &[u8]) -> Result<Self, Self::Error> {
        if let Ok(b) = <[u8; Uuid16::BYTES]>::try_from(v) {
            return Uuid16::new(u16::from_le_bytes(b)).map(Uuid16::as_uuid).ok_or(());
        }
        let b = <[u8; Self::BYTES]>::try_from(v).map_err(|_| ())?;
        Self::new(u128::from_le_bytes(b)).ok_or(())
    }
}

impl FromStr for Uuid {
    type Err = ParseUuidError;

    /// Parses a 16- or 32-bit alias (`"180D"`, `"0x180D"`, `"0000180D"`) or a
    /// 128-bit UUID with or without hyphens.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseUuidError(s.to_owned());
        let short = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let hex = |v: &str| {
            (!v.is_empty() && v.bytes().all(|b| b.is_ascii_hexdigit()))
                .then(|| u128::from_str_radix(v, 16).ok())
                .flatten()
        };
        let v = match short.len() {
            4 => hex(short).and_then(|v| Self::from_u16(u16::try_from(v).ok()?)),
            8 => hex(short).and_then(|v| Self::from_u32(u32::try_from(v).ok()?)),
            32 if short.len() == s.len() => hex(s).and_then(Self::new),
            36 if short.len() == s.len() => {
                let b = s.as_bytes();
                if [8, 13, 18, 23].iter().any(|&i| b[i] != b'-') {
                    return Err(err());
                }
                let digits = s.replace('-', "");
                if digits.len() != 32 {
                    return Err(err());
                }
                hex(&digits).and_then(Self::new)
            }
            _ => None,
        };
        v.ok_or_else(err)
    }
}

impl Debug for Uuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        #[allow(clippy::cast_possible_truncation)]
        if let Some(v) = self.as_u16() {
            write!(f, "{v:#06X}")
        } else if let Some(v) = self.as_u32() {
            write!(f, "{v:#010X}")
        } else {
            let v = self.0.get();
            write!(
                f,
                "{:08X}-{:04X}-{:04X}-{:04X}-{:012X}",
                (v >> 96) as u32,
                (v >> 80) as u16,
                (v >> 64) as u16,
                (v >> 48) as u16,
                (v & ((1 << 48) - 1)) as u64
            )
        }
    }
}

impl Display for Uuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.typ() {
            UuidType::Declaration(d) => write!(f, "{d:?} <{self:?}>"),
            UuidType::Descriptor(d) => write!(f, "{d:?} <{self:?}>"),
            UuidType::Other(_) | UuidType::NonSig => Debug::fmt(self, f),
        }
    }
}

/// Error returned when a string is not a valid UUID.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseUuidError(String);

impl Display for ParseUuidError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid UUID: {:?}", self.0)
    }
}

impl std::error::Error for ParseUuidError {}

/// 16-bit Bluetooth SIG UUID.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Uuid16(NonZeroU16);

impl Uuid16 {
    /// UUID size in bytes.
    pub const BYTES: usize = std::mem::size_of::<Self>();

    /// Creates a 16-bit SIG UUID from a `u16`.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Option<Self> {
        match NonZeroU16::new(v) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }

    /// Returns the UUID type.
    #[must_use]
    pub fn typ(self) -> UuidType {
        let u = self.0.get();
        match u >> 8 {
            0x28 => (Declaration::try_from_primitive(u))
                .map_or(UuidType::Other(u), UuidType::Declaration),
            0x29 => (Descriptor::try_from_primitive(u))
                .map_or(UuidType::Other(u), UuidType::Descriptor),
            _ => UuidType::Other(u),
        }
    }

    /// Returns 128-bit UUID representation.
    #[inline]
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        // SAFETY: BASE is non-zero
        Uuid(unsafe { NonZeroU128::new_unchecked((self.0.get() as u128) << SHIFT | BASE) })
    }

    /// Returns the raw 16-bit UUID value.
    #[inline(always)]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0.get()
    }

    /// Returns the UUID as a little-endian byte array.
    #[inline]
    #[must_use]
    pub const fn to_bytes(self) -> [u8; Self::BYTES] {
        self.0.get().to_le_bytes()
    }
}

impl Debug for Uuid16 {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}", self.0.get())
    }
}

impl Display for Uuid16 {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.as_uuid(), f)
    }
}

impl From<Uuid16> for u16 {
    #[inline]
    fn from(u: Uuid16) -> Self {
        u.raw()
    }
}

/// Assigned 16-bit UUID category.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum UuidType {
    Declaration(Declaration),
    Descriptor(Descriptor),
    Other(u16),
    NonSig,
}

impl From<Uuid> for UuidType {
    #[inline(always)]
    fn from(u: Uuid) -> Self {
        u.typ()
    }
}

/// Provides `Uuid` conversions for an assigned 16-bit UUID enum.
macro_rules! uuid16_enum {
    (
        $(#[$outer:meta])*
        $vis:vis enum $typ:ident {
            $($(#[$inner:meta])* $item:ident = $uuid:literal,)+
        }
    ) => {
        $(#[$outer])*
        #[derive(
            Clone,
            Copy,
            Debug,
            Eq,
            Hash,
            Ord,
            PartialEq,
            PartialOrd,
            ::num_enum::IntoPrimitive,
            ::num_enum::TryFromPrimitive,
        )]
        #[cfg_attr(test, derive(enum_iterator::Sequence))]
        #[non_exhaustive]
        #[repr(u16)]
        $vis enum $typ {
            $($(#[$inner])* $item = $uuid,)+
        }

        impl $typ {
            /// Returns the `Uuid` representation of the variant.
            #[inline]
            #[must_use]
            pub const fn uuid(self) -> Uuid {
                self.uuid16().as_uuid()
            }

            /// Returns the `Uuid16` representation of the variant.
            #[inline]
            #[must_use]
            pub const fn uuid16(self) -> Uuid16 {
                // SAFETY: All variants are non-zero
                Uuid16(unsafe { NonZeroU16::new_unchecked(self as u16) })
            }
        }

        impl From<$typ> for Uuid {
            #[inline]
            fn from(v: $typ) -> Self {
                v.uuid()
            }
        }

        impl PartialEq<Uuid> for $typ {
            #[inline]
            fn eq(&self, rhs: &Uuid) -> bool {
                self.uuid() == *rhs
            }
        }

        impl PartialEq<$typ> for Uuid {
            #[inline]
            fn eq(&self, rhs: &$typ) -> bool {
                *self == rhs.uuid()
            }
        }
    };
}

uuid16_enum! {
    /// GATT attribute types ([Assigned Numbers] Section 3.5).
    pub enum Declaration {
        PrimaryService = 0x2800,
        SecondaryService = 0x2801,
        Include = 0x2802,
        Characteristic = 0x2803,
    }
}

uuid16_enum! {
    /// GATT descriptors ([Assigned Numbers] Section 3.7).
    pub enum Descriptor {
        CharacteristicExtendedProperties = 0x2900,
        CharacteristicUserDescription = 0x2901,
        /// Managed by the platform when a characteristic can notify or
        /// indicate.
        ClientCharacteristicConfiguration = 0x2902,
        ServerCharacteristicConfiguration = 0x2903,
        CharacteristicPresentationFormat = 0x2904,
        CharacteristicAggregateFormat = 0x2905,
    }
}
