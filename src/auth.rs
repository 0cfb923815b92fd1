//! Auth-domain identifiers and the token value object.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{record::*, secret::*};
