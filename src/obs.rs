//! Optional observability helpers for lifecycle operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth_delegate.operation` with the
//!   `operation` and `stage` (call site) fields, plus events for renewals, lock timeouts, and
//!   denied access.
//! - Enable `metrics` to increment the `oauth_delegate_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Lifecycle operations observed by the manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Starting an authorization.
	RequestAuthorization,
	/// Completing an authorization from the provider callback.
	VerifyAuthorization,
	/// Checking whether a usable credential exists.
	HasAccess,
	/// Forced or threshold-driven renewal.
	Refresh,
	/// Releasing a credential.
	Release,
	/// Signed resource call.
	Invoke,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::RequestAuthorization => "request_authorization",
			OperationKind::VerifyAuthorization => "verify_authorization",
			OperationKind::HasAccess => "has_access",
			OperationKind::Refresh => "refresh",
			OperationKind::Release => "release",
			OperationKind::Invoke => "invoke",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to a lifecycle operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
		}
	}

	/// Maps a result onto [`OperationOutcome::Success`] or [`OperationOutcome::Failure`].
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { OperationOutcome::Success } else { OperationOutcome::Failure }
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
