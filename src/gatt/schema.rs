use crate::Uuid;

use super::*;

/// Service definition ([Vol 3] Part G, Section 3.1). Characteristic order is
/// preserved when the service is registered.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Service {
    pub uuid: Uuid,
    pub primary: bool,
    pub characteristics: Vec<Characteristic>,
}

impl Service {
    /// Creates an empty primary service.
    #[inline]
    #[must_use]
    pub const fn primary(uuid: Uuid) -> Self {
        Self {
            uuid,
            primary: true,
            characteristics: Vec::new(),
        }
    }

    /// Creates an empty secondary service.
    #[inline]
    #[must_use]
    pub const fn secondary(uuid: Uuid) -> Self {
        Self {
            uuid,
            primary: false,
            characteristics: Vec::new(),
        }
    }

    /// Appends a characteristic.
    #[inline]
    #[must_use]
    pub fn with(mut self, c: Characteristic) -> Self {
        self.characteristics.push(c);
        self
    }
}

/// Characteristic definition ([Vol 3] Part G, Section 3.3).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub props: Prop,
    pub perms: Perm,
    /// Initial value returned to reads until the first write or update.
    pub value: Vec<u8>,
    pub descriptors: Vec<Descriptor>,
}

impl Characteristic {
    /// Creates a characteristic with permissions derived from its properties.
    #[inline]
    #[must_use]
    pub fn new(uuid: Uuid, props: Prop, value: impl Into<Vec<u8>>) -> Self {
        Self {
            uuid,
            props,
            perms: Perm::from_props(props),
            value: value.into(),
            descriptors: Vec::new(),
        }
    }

    /// Overrides the attribute permissions.
    #[inline]
    #[must_use]
    pub fn perms(mut self, perms: Perm) -> Self {
        self.perms = perms;
        self
    }

    /// Appends a descriptor.
    #[inline]
    #[must_use]
    pub fn with(mut self, d: Descriptor) -> Self {
        self.descriptors.push(d);
        self
    }
}

/// Characteristic descriptor definition ([Vol 3] Part G, Section 3.3.3).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Descriptor {
    pub uuid: Uuid,
    pub value: Vec<u8>,
}

impl Descriptor {
    /// Creates a descriptor.
    #[inline]
    #[must_use]
    pub fn new(uuid: impl Into<Uuid>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            uuid: uuid.into(),
            value: value.into(),
        }
    }

    /// Creates a Characteristic User Description descriptor
    /// ([Vol 3] Part G, Section 3.3.3.2).
    #[inline]
    #[must_use]
    pub fn user_description(s: &str) -> Self {
        Self::new(crate::DescriptorType::CharacteristicUserDescription, s)
    }
}

#[cfg(test)]
mod tests {
    use crate::DescriptorType;

    use super::*;

    #[test]
    fn build() {
        let hr = Uuid::from_u16(0x180D).unwrap();
        let m = Uuid::from_u16(0x2A37).unwrap();
        let s = Service::primary(hr).with(
            Characteristic::new(m, Prop::READ | Prop::NOTIFY, [0, 60])
                .with(Descriptor::user_description("Heart Rate")),
        );
        assert!(s.primary);
        assert_eq!(s.characteristics.len(), 1);
        let c = &s.characteristics[0];
        assert_eq!(c.perms, Perm::READ);
        assert_eq!(c.value, [0, 60]);
        assert_eq!(c.descriptors[0].uuid, DescriptorType::CharacteristicUserDescription);
        assert_eq!(c.descriptors[0].value, b"Heart Rate");
        assert!(!Service::secondary(hr).primary);
    }
}
