//! Generic Attribute Profile ([Vol 3] Part G).
//!
//! Service definitions, the handles that identify their registered copies, the
//! attribute database, and the authorization hooks that gate client access.

pub use {consts::*, handle::*, hook::*, schema::*};
pub(crate) use db::*;

use crate::att::*;

mod consts;
mod db;
mod handle;
mod hook;
mod schema;
