//! Token lifecycle orchestration: authorization, verification, renewal, release, and signed
//! resource calls across every configured service.
//!
//! Each record moves through `Unissued → PendingAuthorization → Authorized →
//! {Authorized (refreshed) | Unauthorized(error)} → Released`. In-flight authorizations live
//! under `temp<nonce>` keys in the service's `temp_cache` namespace; durable credentials live
//! under the `token` key in its `token_cache` namespace.

pub mod access;
pub mod authorize;
pub mod refresh;

pub use authorize::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	adapter::{AdapterRegistry, SigningAdapter},
	auth::{CacheKey, Environment, ServiceName},
	config::{ServiceConfig, ServiceRegistry},
	error::ConfigError,
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	store::{StoreError, TokenStore},
};

/// Coordinates every lifecycle operation for the services of one environment.
///
/// The manager owns no credentials itself: records live in the [`TokenStore`], protocol work is
/// delegated to the [`SigningAdapter`] registered for each service's adapter kind, and
/// configuration is resolved lazily from the [`ServiceRegistry`].
#[derive(Clone)]
pub struct TokenLifecycleManager {
	registry: Arc<ServiceRegistry>,
	store: Arc<TokenStore>,
	adapters: AdapterRegistry,
	environment: Environment,
	refresh_metrics: Arc<RefreshMetrics>,
}
impl TokenLifecycleManager {
	/// Creates a manager for `environment`.
	pub fn new(
		registry: ServiceRegistry,
		store: Arc<TokenStore>,
		adapters: AdapterRegistry,
		environment: Environment,
	) -> Self {
		Self {
			registry: Arc::new(registry),
			store,
			adapters,
			environment,
			refresh_metrics: Default::default(),
		}
	}

	/// Environment every service is resolved for.
	pub fn environment(&self) -> &Environment {
		&self.environment
	}

	/// Service configurations known to the manager.
	pub fn registry(&self) -> &ServiceRegistry {
		&self.registry
	}

	/// Token store backing the manager.
	pub fn store(&self) -> &Arc<TokenStore> {
		&self.store
	}

	/// Renewal counters shared by every service.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	/// Durable cache key of `service` in this manager's environment.
	pub fn durable_key(&self, service: &ServiceName) -> CacheKey {
		CacheKey::durable(service, &self.environment)
	}

	/// Cache key of the in-flight authorization identified by `nonce`.
	pub fn temp_key(&self, service: &ServiceName, nonce: &str) -> CacheKey {
		CacheKey::temp(service, &self.environment, nonce)
	}

	fn context(&self, service: &ServiceName) -> Result<ServiceContext> {
		let config = self.registry.resolve(service, &self.environment)?;
		let adapter = Arc::clone(self.adapters.get(config.adapter)?);

		if adapter.kind() != config.adapter {
			return Err(ConfigError::UnregisteredAdapter { kind: config.adapter }.into());
		}

		Ok(ServiceContext { durable: self.durable_key(service), config, adapter })
	}

	async fn observe<T, Fut>(
		&self,
		kind: OperationKind,
		stage: &'static str,
		service: &ServiceName,
		fut: Fut,
	) -> Result<T>
	where
		Fut: Future<Output = Result<T>>,
	{
		let span = OperationSpan::new(kind, stage, service);

		obs::record_operation_outcome(kind, OperationOutcome::Attempt);

		let result = span.instrument(fut).await;

		obs::record_operation_outcome(kind, OperationOutcome::of(&result));

		result
	}
}
impl Debug for TokenLifecycleManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenLifecycleManager")
			.field("environment", &self.environment)
			.field("registry", &self.registry)
			.field("store", &self.store)
			.field("adapters", &self.adapters)
			.finish()
	}
}

/// Resolved pieces one operation works with.
pub(crate) struct ServiceContext {
	pub(crate) config: Arc<ServiceConfig>,
	pub(crate) adapter: Arc<dyn SigningAdapter>,
	pub(crate) durable: CacheKey,
}

// Lock contention on a blocking read surfaces as a crate-level error naming the key.
fn lock_error(error: StoreError) -> Error {
	match error {
		StoreError::LockUnavailable { key } => Error::LockUnavailable { key },
		other => other.into(),
	}
}
