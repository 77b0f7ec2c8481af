// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token renewals.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	provider_calls: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of renewal rounds, including rounds lost to lock contention.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns how often a provider was asked to renew a token.
	pub fn provider_calls(&self) -> u64 {
		self.provider_calls.load(Ordering::Relaxed)
	}

	/// Returns the number of settled renewals (including adopting a concurrent caller's token).
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed renewals.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_provider_call(&self) {
		self.provider_calls.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}
