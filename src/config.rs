//! Per-service, per-environment configuration.
//!
//! Raw [`ServiceSettings`] are grouped by service and environment inside a
//! [`ServiceRegistry`]. Resolving a `(service, environment)` pair layers the environment's
//! settings over the service's `default` block, validates the result into an immutable
//! [`ServiceConfig`], and caches it for later lookups.

/// Registry of raw settings with lazily-resolved, cached configurations.
pub mod registry;
/// Resolved service configuration and its raw settings form.
pub mod service;

pub use registry::*;
pub use service::*;
