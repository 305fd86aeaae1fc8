//! Platform adapter interface.
//!
//! The adapter owns the radio, connections, and the ATT bearer. The server
//! drives it through the [`Adapter`] trait, and the adapter reports completions
//! and client requests back as [`Event`]s, either by calling
//! [`Server::handle_event`](crate::Server::handle_event) directly from its own
//! execution context or through an [`EventSender`] drained by an
//! [`EventLoop`](crate::EventLoop).

use std::fmt::{Display, Formatter};

use crate::att::ErrorCode;
use crate::gatt::{CharHandle, Descriptor, HandleAlloc, Perm, Prop, Service, ServiceHandle};
use crate::Uuid;

/// Platform BLE peripheral manager.
///
/// Methods must not wait for the delivery of another [`Event`] to the server.
/// Methods called with the database lock held must not deliver events
/// synchronously. Operations that complete asynchronously report their result
/// with the matching event exactly once.
pub trait Adapter: Send + Sync + 'static {
    /// Starts advertising. Completion is reported with
    /// [`Event::AdvertisingStarted`].
    fn start_advertising(&self, adv: &Advertisement);

    /// Stops advertising. Failures are not reported.
    fn stop_advertising(&self);

    /// Publishes a service. Completion is reported with
    /// [`Event::ServiceAdded`] carrying `svc.handle`.
    fn add_service(&self, svc: &ServiceReg);

    /// Unpublishes a service. May be called with the database lock held.
    fn remove_service(&self, hdl: ServiceHandle);

    /// Unpublishes all services. Called with the database lock held.
    fn remove_all_services(&self);

    /// Sends an updated characteristic value to subscribed centrals. Returns
    /// `false` if the platform transmit queue is full and the update was
    /// dropped. Called with the database lock held.
    fn update_value(&self, hdl: CharHandle, value: &[u8]) -> bool;

    /// Sends the response to a read or write request.
    fn respond(&self, req: RequestId, rsp: Response);
}

/// Advertising parameters.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Advertisement {
    pub local_name: String,
    /// Primary service UUIDs to include in the advertising data.
    pub services: Vec<Uuid>,
}

/// Adapter-facing copy of a [`Service`] with handles assigned by the server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceReg {
    pub handle: ServiceHandle,
    pub uuid: Uuid,
    pub primary: bool,
    pub characteristics: Vec<CharReg>,
}

impl ServiceReg {
    /// Creates a registration for `svc`, allocating new handles.
    pub(crate) fn new(svc: &Service, alloc: &HandleAlloc) -> Self {
        let handle = alloc.service();
        let characteristics = (svc.characteristics.iter())
            .map(|c| CharReg {
                handle: alloc.characteristic(),
                uuid: c.uuid,
                props: c.props,
                perms: c.perms,
                descriptors: c.descriptors.clone(),
            })
            .collect();
        Self {
            handle,
            uuid: svc.uuid,
            primary: svc.primary,
            characteristics,
        }
    }
}

/// Adapter-facing characteristic. The value is not included because the
/// server answers all reads itself.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CharReg {
    pub handle: CharHandle,
    pub uuid: Uuid,
    pub props: Prop,
    pub perms: Perm,
    pub descriptors: Vec<Descriptor>,
}

/// Event delivered by the adapter.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Event {
    /// Adapter state change.
    StateChanged(AdapterState),
    /// Completion of [`Adapter::start_advertising`].
    AdvertisingStarted(Result<(), AdapterError>),
    /// Completion of [`Adapter::add_service`].
    ServiceAdded {
        service: ServiceHandle,
        result: Result<(), AdapterError>,
    },
    /// Client read request.
    ReadRequest(ReadRequest),
    /// One or more client write requests that must be applied atomically.
    /// Each request is spliced into the value as it was before the batch, so
    /// the chunks of a prepared long write must be merged into a single
    /// request per characteristic before delivery.
    WriteRequests(Vec<WriteRequest>),
}

/// Sending half of an event channel drained by an
/// [`EventLoop`](crate::EventLoop).
pub type EventSender = tokio::sync::mpsc::UnboundedSender<Event>;

/// Receiving half of an event channel.
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<Event>;

/// Creates a new event channel.
#[inline]
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Adapter-assigned request identifier that is passed back to
/// [`Adapter::respond`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RequestId(pub u64);

/// Remote central that issued a request.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Central {
    /// Platform identifier of the peer.
    pub id: u64,
}

impl Display for Central {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Central({:#018X})", self.id)
    }
}

/// Client read request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadRequest {
    pub id: RequestId,
    pub central: Central,
    pub handle: CharHandle,
    pub offset: usize,
}

/// Client write request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WriteRequest {
    pub id: RequestId,
    pub central: Central,
    pub handle: CharHandle,
    pub offset: usize,
    pub value: Vec<u8>,
}

/// Server decision for a read or write request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Response {
    /// Read succeeded with the value starting at the requested offset.
    Value(Vec<u8>),
    /// Write succeeded.
    Success,
    /// Request failed with an ATT error.
    Error(ErrorCode),
}

/// Platform peripheral manager state.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum AdapterState {
    Unknown = 0,
    Resetting = 1,
    Unsupported = 2,
    Unauthorized = 3,
    PoweredOff = 4,
    PoweredOn = 5,
}

impl Default for AdapterState {
    #[inline(always)]
    fn default() -> Self {
        Self::Unknown
    }
}

crate::impl_display_via_debug! { AdapterState }

/// Error reported by the adapter for an operation started by the server.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum AdapterError {
    #[error("adapter is not powered on")]
    NotPoweredOn,
    #[error("service {0} is already registered")]
    DuplicateService(Uuid),
    #[error("invalid service definition: {0}")]
    InvalidDefinition(String),
    #[error("adapter resources exhausted")]
    ResourceExhausted,
    #[error("advertising already started")]
    AlreadyAdvertising,
    #[error("platform error {code}: {reason}")]
    Platform { code: i64, reason: String },
}
