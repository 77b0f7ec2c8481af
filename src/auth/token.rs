//! Token material, persisted records, and the cache keys they are stored under.

pub mod key;
pub mod record;
pub mod secret;
