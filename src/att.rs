//! Attribute Protocol types shared with the adapter ([Vol 3] Part F).
//!
//! PDU encoding belongs to the adapter. This module only defines the error
//! codes that the server uses to answer requests and the attribute value
//! limits that it enforces.

pub use consts::*;

mod consts;
