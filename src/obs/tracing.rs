// self
use crate::{
	_prelude::*,
	auth::{CacheKey, Environment, ServiceName},
	obs::OperationKind,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOperation<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOperation<F> = F;

/// A span builder used by lifecycle operations.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates a new span tagged with the operation, call-site stage, and service.
	pub fn new(kind: OperationKind, stage: &'static str, service: &ServiceName) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth_delegate.operation",
				operation = kind.as_str(),
				stage,
				service = service.as_ref()
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage, service);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOperation<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Reports that a lock wait gave up and the caller proceeds without the lock.
pub fn lock_wait_timed_out(namespace: &str, key: &CacheKey) {
	#[cfg(feature = "tracing")]
	tracing::warn!(namespace, key = key.as_str(), "Lock wait timed out; proceeding without it.");
	#[cfg(not(feature = "tracing"))]
	let _ = (namespace, key);
}

/// Reports that a lock older than the lock timeout was taken over.
pub fn abandoned_lock_released(key: &CacheKey) {
	#[cfg(feature = "tracing")]
	tracing::warn!(key = key.as_str(), "Released an abandoned cache lock.");
	#[cfg(not(feature = "tracing"))]
	let _ = key;
}

/// Reports a successful renewal together with the new expiry.
pub fn token_refreshed(service: &ServiceName, environment: &Environment, expires_at: Option<i64>) {
	#[cfg(feature = "tracing")]
	tracing::info!(
		service = service.as_ref(),
		environment = environment.as_ref(),
		expires_at,
		"Token refreshed."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (service, environment, expires_at);
}

/// Reports that an access check failed because no usable credential could be produced.
pub fn access_denied(service: &ServiceName, error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(service = service.as_ref(), error = %error, "Access check failed.");
	#[cfg(not(feature = "tracing"))]
	let _ = (service, error);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn service() -> ServiceName {
		ServiceName::new("svc").expect("Service fixture should be valid.")
	}

	#[test]
	fn events_are_callable_without_subscriber() {
		let environment = Environment::new("test").expect("Environment fixture should be valid.");
		let key = CacheKey::durable(&service(), &environment);

		lock_wait_timed_out("default", &key);
		abandoned_lock_released(&key);
		token_refreshed(&service(), &environment, Some(42));
		access_denied(&service(), &Error::MissingCredentials);
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = OperationSpan::new(OperationKind::Refresh, "instrument_wraps_future", &service());
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
