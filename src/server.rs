//! GATT peripheral server.

use std::fmt::{Debug, Formatter};

use tracing::{debug, info, trace, warn};

pub use {config::*, event_loop::*};

use crate::att::ErrorCode;
use crate::gatt::*;
use crate::util::Pending;
use crate::*;

mod config;
mod event_loop;


/// Error type returned by the server.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("timeout while waiting for {0}")]
    Timeout(&'static str),
    #[error("previous {0} is still outstanding")]
    Busy(&'static str),
    #[error("invalid service index: {0}")]
    InvalidIndex(usize),
    #[error("unknown characteristic: {0}")]
    UnknownCharacteristic(Uuid),
}

/// Common server result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Context of a pending service registration.
type AddCtx = (ServiceReg, Service);

/// GATT peripheral server.
///
/// The server is shared between the caller and the adapter, which delivers
/// events via [`Server::handle_event`]. All database access is serialized by a
/// single lock, which is also held while authorization hooks run. Hooks must
/// not call back into the server.
pub struct Server<A: Adapter> {
    adapter: A,
    cfg: Config,
    alloc: HandleAlloc,
    db: SyncMutex<Db>,
    hooks: SyncMutex<Hooks>,
    state: SyncMutex<AdapterState>,
    add: Pending<ServiceHandle, AddCtx, Result<usize>>,
    adv: Pending<(), (), Result<()>>,
}

impl<A: Adapter> Server<A> {
    /// Creates a server with the default configuration.
    #[inline]
    #[must_use]
    pub fn new(adapter: A) -> Self {
        Self::with_config(adapter, Config::default())
    }

    /// Creates a server with the specified configuration.
    #[must_use]
    pub fn with_config(adapter: A, cfg: Config) -> Self {
        Self {
            adapter,
            cfg,
            alloc: HandleAlloc::new(),
            db: SyncMutex::new(Db::new()),
            hooks: SyncMutex::default(),
            state: SyncMutex::default(),
            add: Pending::new("service registration"),
            adv: Pending::new("advertising start"),
        }
    }

    /// Returns the platform adapter.
    #[inline(always)]
    pub const fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Returns the server configuration.
    #[inline(always)]
    pub const fn config(&self) -> &Config {
        &self.cfg
    }

    /// Registers a service with the adapter and blocks until the registration
    /// completes. Returns the 1-based index of the service, which is the number
    /// of services registered after the call.
    ///
    /// # Panics
    ///
    /// Panics if another registration is in progress.
    pub fn add(&self, svc: Service) -> Result<usize> {
        self.begin_add(svc)?;
        self.add.wait(self.cfg.timeout)?
    }

    /// Registers a service with the adapter. This is the async version of
    /// [`Server::add`]. If the future is dropped after the adapter reported
    /// success, the service is removed again.
    pub async fn add_async(&self, svc: Service) -> Result<usize> {
        let hdl = self.begin_add(svc)?;
        let discard = |r: Result<usize>| {
            if r.is_ok() {
                self.undo_add(hdl);
            }
        };
        self.add.wait_async(self.cfg.timeout, discard).await?
    }

    /// Removes the service at the specified 1-based index. Services at higher
    /// indices move down by one.
    pub fn remove(&self, index: usize) -> Result<()> {
        let mut db = self.db.lock();
        let Some(hdl) = db.service(index) else {
            return Err(Error::InvalidIndex(index));
        };
        self.adapter.remove_service(hdl);
        db.remove(index);
        debug!("Removed service {index} ({hdl})");
        Ok(())
    }

    /// Removes all services.
    pub fn clear(&self) {
        let mut db = self.db.lock();
        self.adapter.remove_all_services();
        db.clear();
        debug!("Removed all services");
    }

    /// Sets the value of the first characteristic with the specified UUID and
    /// sends it to subscribed centrals. Returns `false` if the adapter
    /// transmit queue is full. The stored value is updated either way.
    pub fn update(&self, uuid: Uuid, value: impl Into<Vec<u8>>) -> Result<bool> {
        let mut db = self.db.lock();
        let Some(hdl) = db.find(uuid) else {
            return Err(Error::UnknownCharacteristic(uuid));
        };
        let value = value.into();
        let sent = self.adapter.update_value(hdl, &value);
        if !sent {
            debug!("Update of {uuid} not sent: transmit queue full");
        }
        db.set(hdl, value);
        Ok(sent)
    }

    /// Starts advertising and blocks until the adapter confirms.
    ///
    /// # Panics
    ///
    /// Panics if another start is in progress.
    pub fn start(&self) -> Result<()> {
        self.begin_adv()?;
        self.adv.wait(self.cfg.timeout)?
    }

    /// Starts advertising. This is the async version of [`Server::start`].
    pub async fn start_async(&self) -> Result<()> {
        self.begin_adv()?;
        self.adv.wait_async(self.cfg.timeout, drop).await?
    }

    /// Stops advertising.
    pub fn stop(&self) {
        self.adapter.stop_advertising();
        info!("Advertising stopped");
    }

    /// Returns the current value of the first characteristic with the
    /// specified UUID.
    #[must_use]
    pub fn value(&self, uuid: Uuid) -> Option<Vec<u8>> {
        let db = self.db.lock();
        db.find(uuid).map(|hdl| db.get(hdl).val.clone())
    }

    /// Returns the number of registered services.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.db.lock().len()
    }

    /// Returns whether no services are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the UUIDs of registered services in index order.
    #[inline]
    #[must_use]
    pub fn services(&self) -> Vec<Uuid> {
        self.db.lock().uuids()
    }

    /// Returns the last state reported by the adapter.
    #[inline]
    #[must_use]
    pub fn state(&self) -> AdapterState {
        *self.state.lock()
    }

    /// Sets the read authorization hook.
    pub fn set_on_read(
        &self,
        f: impl for<'a> Fn(&ReadAccess<'a>) -> HookResult + Send + Sync + 'static,
    ) {
        self.hooks.lock().read = Some(ReadHook::from(f));
    }

    /// Sets the write authorization hook.
    pub fn set_on_write(
        &self,
        f: impl for<'a> Fn(&WriteAccess<'a>) -> HookResult + Send + Sync + 'static,
    ) {
        self.hooks.lock().write = Some(WriteHook::from(f));
    }

    /// Sets the adapter state observer.
    pub fn set_on_state_changed(&self, f: impl Fn(AdapterState) + Send + Sync + 'static) {
        self.hooks.lock().state = Some(StateHook::from(f));
    }

    /// Removes all hooks.
    pub fn clear_hooks(&self) {
        *self.hooks.lock() = Hooks::default();
    }

    /// Handles an adapter event. This is called from the adapter execution
    /// context and never blocks on another event.
    ///
    /// # Panics
    ///
    /// Panics if the event refers to an operation that is not in progress or
    /// to a characteristic that is not registered.
    pub fn handle_event(&self, e: Event) {
        trace!("{e:?}");
        match e {
            Event::StateChanged(s) => self.state_changed(s),
            Event::AdvertisingStarted(r) => self.adv_started(r),
            Event::ServiceAdded { service, result } => self.service_added(service, result),
            Event::ReadRequest(r) => self.read(r),
            Event::WriteRequests(w) => self.write(w),
        }
    }

    /// Sends a service registration to the adapter.
    fn begin_add(&self, svc: Service) -> Result<ServiceHandle> {
        let reg = ServiceReg::new(&svc, &self.alloc);
        debug!("Adding service {} as {}", svc.uuid, reg.handle);
        self.add.begin(reg.handle, (reg.clone(), svc))?;
        self.adapter.add_service(&reg);
        Ok(reg.handle)
    }

    /// Removes a service whose registration outcome was not delivered to the
    /// caller.
    fn undo_add(&self, hdl: ServiceHandle) {
        let mut db = self.db.lock();
        let Some(i) = db.index_of(hdl) else { return };
        self.adapter.remove_service(hdl);
        db.remove(i);
        warn!("Removed service {i} ({hdl}) after its waiter was dropped");
    }

    /// Sends an advertising start request to the adapter.
    fn begin_adv(&self) -> Result<()> {
        let adv = Advertisement {
            local_name: self.cfg.local_name.clone(),
            services: if self.cfg.advertise_services {
                self.db.lock().primary_uuids()
            } else {
                Vec::new()
            },
        };
        self.adv.begin((), ())?;
        self.adapter.start_advertising(&adv);
        Ok(())
    }

    fn state_changed(&self, s: AdapterState) {
        debug!("Adapter state: {s}");
        *self.state.lock() = s;
        let hooks = self.hooks.lock().clone();
        hooks.state(s);
    }

    fn adv_started(&self, r: std::result::Result<(), AdapterError>) {
        match r {
            Ok(()) => info!("Advertising started"),
            Err(ref e) => warn!("Advertising failed: {e}"),
        }
        if self.adv.complete(&(), |()| r.map_err(Error::from)).is_some() {
            warn!("Advertising start completed after timeout");
        }
    }

    fn service_added(&self, hdl: ServiceHandle, r: std::result::Result<(), AdapterError>) {
        if let Err(ref e) = r {
            warn!("Service registration {hdl} failed: {e}");
        }
        let ok = r.is_ok();
        let late = self.add.complete(&hdl, |(reg, svc)| {
            r?;
            let uuid = svc.uuid;
            let i = self.db.lock().push(reg, svc);
            debug!("Added service {i} ({uuid})");
            Ok(i)
        });
        if let Some((_, svc)) = late {
            warn!("Service {} ({hdl}) registered after timeout", svc.uuid);
            if ok {
                self.adapter.remove_service(hdl);
            }
        }
    }

    /// Handles a read request.
    fn read(&self, r: ReadRequest) {
        let hooks = self.hooks.lock().clone();
        let rsp = {
            let db = self.db.lock();
            let v = db.get(r.handle);
            if r.offset > v.val.len() {
                warn!("Read of {} at invalid offset {}", v.uuid, r.offset);
                Response::Error(ErrorCode::InvalidOffset)
            } else {
                match hooks.read(&ReadAccess::new(r.central, v.uuid, &v.val, r.offset)) {
                    Ok(()) => Response::Value(v.val[r.offset..].to_vec()),
                    Err(e) => {
                        warn!("Read of {} by {} denied: {e}", v.uuid, r.central);
                        Response::Error(e)
                    }
                }
            }
        };
        self.adapter.respond(r.id, rsp);
    }

    /// Handles a batch of write requests. Either all values are committed or
    /// none are, and only the first request receives a response.
    fn write(&self, batch: Vec<WriteRequest>) {
        let Some(id) = batch.first().map(|w| w.id) else {
            warn!("Ignoring empty write batch");
            return;
        };
        let hooks = self.hooks.lock().clone();
        let rsp = {
            let mut db = self.db.lock();
            let vals: std::result::Result<Vec<_>, _> = (batch.iter())
                .map(|w| {
                    let v = db.get(w.handle);
                    let nv = splice(&v.val, w.offset, &w.value).map_err(|e| {
                        warn!("Write of {} at offset {} rejected: {e}", v.uuid, w.offset);
                        e
                    })?;
                    let acc = WriteAccess::new(w.central, v.uuid, &v.val, &nv, &w.value, w.offset);
                    if let Err(e) = hooks.write(&acc) {
                        warn!("Write of {} by {} denied: {e}", v.uuid, w.central);
                        return Err(e);
                    }
                    Ok((w.handle, nv))
                })
                .collect();
            match vals {
                Ok(vals) => {
                    for (hdl, v) in vals {
                        db.set(hdl, v);
                    }
                    Response::Success
                }
                Err(e) => Response::Error(e),
            }
        };
        self.adapter.respond(id, rsp);
    }
}

impl<A: Adapter> Debug for Server<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("cfg", &self.cfg)
            .field("state", &self.state())
            .field("services", &self.len())
            .finish_non_exhaustive()
    }
}
