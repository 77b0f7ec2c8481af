//! Auth-domain identifiers, scope sets, cache keys, and token records.

pub mod id;
pub mod scope;
pub mod token;

pub use id::*;
pub use scope::*;
pub use token::{key::*, record::*, secret::*};
