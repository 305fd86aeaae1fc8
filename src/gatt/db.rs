use std::collections::BTreeMap;

use crate::{ServiceReg, Uuid};

use super::*;

/// Attribute database of registered services and their current values.
///
/// Services are kept in registration order and addressed by 1-based index.
/// Values are keyed by [`CharHandle`], so structural changes never require
/// realigning parallel tables.
#[derive(Debug, Default)]
pub(crate) struct Db {
    services: Vec<Entry>,
    values: BTreeMap<CharHandle, Value>,
}

/// Registered service.
#[derive(Debug)]
struct Entry {
    hdl: ServiceHandle,
    uuid: Uuid,
    primary: bool,
    chars: Vec<CharHandle>,
}

/// Characteristic value entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Value {
    pub uuid: Uuid,
    pub props: Prop,
    pub val: Vec<u8>,
}

impl Db {
    /// Creates an empty database.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a service registered as `reg` with initial values from `svc`.
    /// Returns the 1-based index of the new service.
    pub fn push(&mut self, reg: ServiceReg, svc: Service) -> usize {
        assert_eq!(
            reg.characteristics.len(),
            svc.characteristics.len(),
            "registration does not match service {}",
            svc.uuid
        );
        let mut chars = Vec::with_capacity(reg.characteristics.len());
        for (r, c) in reg.characteristics.into_iter().zip(svc.characteristics) {
            let v = Value {
                uuid: c.uuid,
                props: c.props,
                val: c.value,
            };
            let prev = self.values.insert(r.handle, v);
            assert!(prev.is_none(), "duplicate {}", r.handle);
            chars.push(r.handle);
        }
        self.services.push(Entry {
            hdl: reg.handle,
            uuid: reg.uuid,
            primary: reg.primary,
            chars,
        });
        self.services.len()
    }

    /// Returns the handle of the service at 1-based `index`.
    #[must_use]
    pub fn service(&self, index: usize) -> Option<ServiceHandle> {
        let i = index.checked_sub(1)?;
        self.services.get(i).map(|e| e.hdl)
    }

    /// Returns the 1-based index of the service registered as `hdl`.
    #[must_use]
    pub fn index_of(&self, hdl: ServiceHandle) -> Option<usize> {
        self.services.iter().position(|e| e.hdl == hdl).map(|i| i + 1)
    }

    /// Removes the service at 1-based `index` and all of its values. Later
    /// services move down by one.
    pub fn remove(&mut self, index: usize) -> Option<ServiceHandle> {
        let i = index.checked_sub(1).filter(|&i| i < self.services.len())?;
        let e = self.services.remove(i);
        for hdl in &e.chars {
            self.values.remove(hdl);
        }
        Some(e.hdl)
    }

    /// Removes all services.
    #[inline]
    pub fn clear(&mut self) {
        self.services.clear();
        self.values.clear();
    }

    /// Returns the number of registered services.
    #[inline]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns the service UUIDs in index order.
    pub fn uuids(&self) -> Vec<Uuid> {
        self.services.iter().map(|e| e.uuid).collect()
    }

    /// Returns the UUIDs of primary services in index order.
    pub fn primary_uuids(&self) -> Vec<Uuid> {
        (self.services.iter().filter(|e| e.primary))
            .map(|e| e.uuid)
            .collect()
    }

    /// Returns the handle of the first characteristic with the specified UUID
    /// in service and characteristic order.
    pub fn find(&self, uuid: Uuid) -> Option<CharHandle> {
        (self.services.iter().flat_map(|e| e.chars.iter()))
            .copied()
            .find(|hdl| self.values[hdl].uuid == uuid)
    }

    /// Returns the value entry for a registered characteristic handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is not registered. The adapter only refers to
    /// characteristics that the server registered.
    #[inline]
    #[track_caller]
    pub fn get(&self, hdl: CharHandle) -> &Value {
        (self.values.get(&hdl)).unwrap_or_else(|| panic!("unknown {hdl}"))
    }

    /// Replaces the value of a registered characteristic.
    ///
    /// # Panics
    ///
    /// Panics if the handle is not registered.
    #[inline]
    #[track_caller]
    pub fn set(&mut self, hdl: CharHandle, val: Vec<u8>) {
        match self.values.get_mut(&hdl) {
            Some(v) => v.val = val,
            None => panic!("unknown {hdl}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::gatt::HandleAlloc;

    use super::*;

    fn svc(uuid: u16, chars: &[(u16, &[u8])]) -> Service {
        let mut s = Service::primary(Uuid::from_u16(uuid).unwrap());
        for &(u, v) in chars {
            s = s.with(Characteristic::new(
                Uuid::from_u16(u).unwrap(),
                Prop::READ | Prop::WRITE,
                v,
            ));
        }
        s
    }

    fn push(db: &mut Db, a: &HandleAlloc, s: Service) -> (usize, ServiceReg) {
        let reg = ServiceReg::new(&s, a);
        (db.push(reg.clone(), s), reg)
    }

    #[test]
    fn push_remove() {
        let (mut db, a) = (Db::new(), HandleAlloc::new());
        let (i1, r1) = push(&mut db, &a, svc(0x1800, &[(0x2A00, b"name")]));
        let (i2, r2) = push(&mut db, &a, svc(0x180F, &[(0x2A19, &[50])]));
        let (i3, r3) = push(&mut db, &a, svc(0x180A, &[]));
        assert_eq!((i1, i2, i3), (1, 2, 3));
        assert_eq!(db.len(), 3);
        assert_eq!(db.service(0), None);
        assert_eq!(db.service(2), Some(r2.handle));
        assert_eq!(db.service(4), None);

        let batt = r2.characteristics[0].handle;
        assert_eq!(db.get(batt).val, [50]);
        assert_eq!(db.index_of(r3.handle), Some(3));
        assert_eq!(db.remove(2), Some(r2.handle));
        assert_eq!(db.service(2), Some(r3.handle));
        assert_eq!(db.index_of(r3.handle), Some(2));
        assert_eq!(db.index_of(r2.handle), None);
        assert_eq!(db.find(Uuid::from_u16(0x2A19).unwrap()), None);
        assert!(!db.values.contains_key(&batt));
        assert_eq!(db.remove(3), None);
        assert_eq!(db.remove(0), None);

        let name = r1.characteristics[0].handle;
        db.set(name, b"other".to_vec());
        assert_eq!(db.get(name).val, b"other");
        db.clear();
        assert_eq!(db.len(), 0);
        assert!(db.values.is_empty());
    }

    #[test]
    fn find_first() {
        let (mut db, a) = (Db::new(), HandleAlloc::new());
        let (_, r1) = push(&mut db, &a, svc(0x1800, &[(0x2A00, b"a"), (0x2A01, b"b")]));
        let (_, r2) = push(&mut db, &a, svc(0x1801, &[(0x2A01, b"c")]));
        let u = Uuid::from_u16(0x2A01).unwrap();
        assert_eq!(db.find(u), Some(r1.characteristics[1].handle));
        db.remove(1);
        assert_eq!(db.find(u), Some(r2.characteristics[0].handle));
        assert_eq!(db.uuids(), [Uuid::from_u16(0x1801).unwrap()]);
    }

    #[test]
    fn primary_uuids() {
        let (mut db, a) = (Db::new(), HandleAlloc::new());
        push(&mut db, &a, svc(0x1800, &[]));
        push(&mut db, &a, Service::secondary(Uuid::from_u16(0x1801).unwrap()));
        push(&mut db, &a, svc(0x180F, &[]));
        assert_eq!(
            db.primary_uuids(),
            [Uuid::from_u16(0x1800).unwrap(), Uuid::from_u16(0x180F).unwrap()]
        );
        assert_eq!(db.uuids().len(), 3);
    }

    #[test]
    #[should_panic(expected = "unknown CharHandle")]
    fn unknown_handle() {
        let db = Db::new();
        let _ = db.get(CharHandle::new(7).unwrap());
    }
}
