//! Plugs a caller-defined cache backend into the lifecycle manager and authorizes a two-legged
//! service with it. Two-legged services need no user approval, so nothing here touches the
//! network.

// std
use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use color_eyre::Result;
use parking_lot::Mutex;
// self
use oauth_delegate::{
	adapter::AdapterRegistry,
	auth::{CacheKey, Environment, Params, ServiceName, TokenSecret},
	config::{DEFAULT_BLOCK, ServiceRegistry, ServiceSettings},
	http::ReqwestHttpClient,
	lifecycle::TokenLifecycleManager,
	store::{CacheBackend, CacheEntry, StoreFuture, TokenStore},
};

/// Lock-less backend that counts how often the manager persists records.
#[derive(Default)]
struct CountingBackend {
	entries: Mutex<HashMap<CacheKey, CacheEntry>>,
	saves: AtomicUsize,
}
impl CacheBackend for CountingBackend {
	fn load<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<CacheEntry>> {
		Box::pin(async move { Ok(self.entries.lock().get(key).cloned()) })
	}

	fn save<'a>(&'a self, key: &'a CacheKey, entry: CacheEntry) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.saves.fetch_add(1, Ordering::Relaxed);
			self.entries.lock().insert(key.clone(), entry);

			Ok(())
		})
	}

	fn remove<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.entries.lock().remove(key).is_some()) })
	}
}

fn scope(value: &str) -> Params {
	Params::from([("scope".to_owned(), value.to_owned())])
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let service = ServiceName::new("search")?;
	let registry = ServiceRegistry::new().with_settings(
		service.clone(),
		DEFAULT_BLOCK,
		ServiceSettings {
			consumer_key: Some("search-consumer".into()),
			consumer_secret: Some(TokenSecret::new("search-secret")),
			base: Some("api.search.example.com".into()),
			temp_ttl: Some(60),
			..Default::default()
		},
	);
	let backend = Arc::new(CountingBackend::default());
	let store = TokenStore::new().with_namespace("default", backend.clone());
	let manager = TokenLifecycleManager::new(
		registry,
		Arc::new(store),
		AdapterRegistry::with_reqwest(ReqwestHttpClient::new()?),
		Environment::new("staging")?,
	);
	let start = manager.request_authorization(&service, scope("search.read")).await?;

	println!("Authorization started: {start:?}.");

	let read = manager.has_access(&service, &scope("search.read")).await;
	let write = manager.has_access(&service, &scope("search.write")).await;

	println!("Read access: {read}, write access: {write}.");
	println!("Backend saved {} records.", backend.saves.load(Ordering::Relaxed));

	Ok(())
}
