//! Platform-independent GATT peripheral server.
//!
//! [`Server`] owns an in-memory attribute database, presents blocking (and
//! async) service registration and advertising calls, and answers ATT read and
//! write requests delivered by a platform [`Adapter`]. The adapter owns the
//! radio, the ATT bearer, and PDU encoding; the server only makes decisions.
//!
//! ```text
//!  caller ── add/remove/update/start ──► Server ──► Adapter (platform)
//!                                          ▲            │
//!                                          └── Event ◄──┘
//! ```

#![warn(missing_debug_implementations)]
#![warn(non_ascii_idents)]
#![warn(single_use_lifetimes)]
#![warn(unused_extern_crates)]
#![warn(unused_import_braces)]
#![warn(unused_lifetimes)]
#![warn(unused_qualifications)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![allow(clippy::inline_always)]
#![allow(clippy::module_name_repetitions)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::get_unwrap)]
#![warn(clippy::print_stdout)]
#![warn(clippy::str_to_string)]
#![warn(clippy::todo)]
#![warn(clippy::try_err)]
#![warn(clippy::undocumented_unsafe_blocks)]

pub use gatt_periph_const::{Declaration, Descriptor as DescriptorType, Uuid, Uuid16, UuidType};

pub use {adapter::*, server::*};

pub mod adapter;
pub mod att;
pub mod gatt;
mod server;
mod util;

type SyncMutex<T> = parking_lot::Mutex<T>;
