use bitflags::bitflags;

bitflags! {
    /// Characteristic properties ([Vol 3] Part G, Section 3.3.1.1).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct Prop: u8 {
        /// Permits broadcasts of the Characteristic Value using Server
        /// Characteristic Configuration Descriptor.
        const BROADCAST = 0x01;
        /// Permits reads of the Characteristic Value.
        const READ = 0x02;
        /// Permits writes of the Characteristic Value without response.
        const WRITE_CMD = 0x04;
        /// Permits writes of the Characteristic Value with response.
        const WRITE = 0x08;
        /// Permits notifications of a Characteristic Value without
        /// acknowledgment. The platform adds the Client Characteristic
        /// Configuration descriptor.
        const NOTIFY = 0x10;
        /// Permits indications of a Characteristic Value with acknowledgment.
        /// The platform adds the Client Characteristic Configuration
        /// descriptor.
        const INDICATE = 0x20;
        /// Permits signed writes to the Characteristic Value.
        const SIGNED_WRITE_CMD = 0x40;
        /// Additional characteristic properties are defined in the
        /// Characteristic Extended Properties descriptor.
        const EXT_PROPS = 0x80;
    }
}

impl Prop {
    /// Returns whether the characteristic value can be written by any write
    /// procedure.
    #[inline]
    #[must_use]
    pub const fn is_writable(self) -> bool {
        self.intersects(Self::WRITE.union(Self::WRITE_CMD).union(Self::SIGNED_WRITE_CMD))
    }

    /// Returns whether the server can push value updates to subscribers.
    #[inline]
    #[must_use]
    pub const fn can_push(self) -> bool {
        self.intersects(Self::NOTIFY.union(Self::INDICATE))
    }
}

bitflags! {
    /// Attribute permissions enforced by the platform before a request reaches
    /// the server ([Vol 3] Part F, Section 3.2.5).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[must_use]
    #[repr(transparent)]
    pub struct Perm: u8 {
        /// Read access.
        const READ = 1 << 0;
        /// Write access.
        const WRITE = 1 << 1;
        /// Read access over an encrypted link only.
        const READ_ENCRYPT = 1 << 2;
        /// Write access over an encrypted link only.
        const WRITE_ENCRYPT = 1 << 3;
        /// Read/write access.
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

impl Perm {
    /// Returns the permissions implied by a set of characteristic properties.
    /// This is the default used when a characteristic does not specify its
    /// permissions explicitly.
    pub const fn from_props(p: Prop) -> Self {
        let mut v = Self::empty();
        if p.contains(Prop::READ) {
            v = v.union(Self::READ);
        }
        if p.is_writable() {
            v = v.union(Self::WRITE);
        }
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prop_perm() {
        assert_eq!(Perm::from_props(Prop::READ | Prop::NOTIFY), Perm::READ);
        assert_eq!(Perm::from_props(Prop::WRITE_CMD), Perm::WRITE);
        assert_eq!(Perm::from_props(Prop::READ | Prop::WRITE), Perm::READ_WRITE);
        assert_eq!(Perm::from_props(Prop::NOTIFY), Perm::empty());
        assert!(Prop::INDICATE.can_push());
        assert!(!Prop::READ.can_push());
        assert!(Prop::SIGNED_WRITE_CMD.is_writable());
        assert_eq!(Prop::WRITE.bits(), 0x08);
    }
}
