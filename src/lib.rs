//! OAuth delegated-access client: acquire, cache, refresh, and revoke provider credentials for
//! many services at once, with lock-aware token stores and OAuth 1.0a request signing.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod adapter;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod obs;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		adapter::{AdapterKind, AdapterRegistry, OAuth1a, OAuth2, SigningAdapter},
		auth::Environment,
		config::ServiceRegistry,
		http::{ReqwestHttpClient, ReqwestTransportErrorMapper},
		lifecycle::TokenLifecycleManager,
		store::{CacheBackend, MemoryStore, TokenStore},
	};

	/// Environment name used by integration tests.
	pub const TEST_ENVIRONMENT: &str = "test";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds a token store whose `default` namespace lives in memory.
	pub fn memory_token_store() -> (Arc<TokenStore>, Arc<MemoryStore>) {
		let backend = Arc::new(MemoryStore::default());
		let store = TokenStore::new()
			.with_namespace("default", Arc::clone(&backend) as Arc<dyn CacheBackend>);

		(Arc::new(store), backend)
	}

	/// Constructs a manager that signs with the reqwest-backed OAuth 1.0a adapter and persists
	/// into an in-memory store.
	pub fn build_reqwest_test_manager(
		registry: ServiceRegistry,
	) -> (TokenLifecycleManager, Arc<MemoryStore>) {
		let adapter: Arc<dyn SigningAdapter> =
			Arc::new(OAuth1a::new(test_reqwest_http_client(), ReqwestTransportErrorMapper));

		build_test_manager(registry, adapter)
	}

	/// Constructs a manager around a caller-supplied OAuth 1.0a adapter implementation.
	pub fn build_test_manager(
		registry: ServiceRegistry,
		adapter: Arc<dyn SigningAdapter>,
	) -> (TokenLifecycleManager, Arc<MemoryStore>) {
		let (store, backend) = memory_token_store();
		let adapters = AdapterRegistry::default()
			.with_adapter(AdapterKind::OAuth1a, adapter)
			.with_adapter(AdapterKind::OAuth2, Arc::new(OAuth2));
		let environment =
			Environment::new(TEST_ENVIRONMENT).expect("Test environment name should be valid.");
		let manager = TokenLifecycleManager::new(registry, store, adapters, environment);

		(manager, backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
