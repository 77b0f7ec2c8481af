//! Walks through a complete three-legged OAuth 1.0a authorization against a local mock
//! provider: start the authorization, simulate the user's approval callback, then issue a
//! signed resource call with the stored credentials.

// std
use std::{collections::BTreeMap, sync::Arc};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth_delegate::{
	adapter::{AdapterRegistry, AuthorizationStart},
	auth::{Environment, ServiceName},
	config::ServiceRegistry,
	http::ReqwestHttpClient,
	lifecycle::TokenLifecycleManager,
	store::{MemoryStore, TokenStore},
};

const FORM: &str = "application/x-www-form-urlencoded";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/request_token");
			then.status(200)
				.header("content-type", FORM)
				.body("oauth_token=demo-request&oauth_token_secret=demo-request-secret");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/access_token");
			then.status(200).header("content-type", FORM).body(
				"oauth_token=demo-access&oauth_token_secret=demo-access-secret\
				 &oauth_expires_in=3600&oauth_session_handle=demo-session",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/profile").header_exists("authorization");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"name\":\"Demo User\"}");
		})
		.await;

	let registry = ServiceRegistry::from_json_str(&format!(
		r#"{{ "services": {{ "demo": {{ "default": {{
			"consumer_key": "demo-consumer",
			"consumer_secret": "demo-consumer-secret",
			"base": "{}",
			"request_token": "oauth/request_token",
			"access_token": "oauth/access_token",
			"authorize": "https://provider.example.com/authorize"
		}} }} }} }}"#,
		server.base_url()
	))?;
	let store =
		TokenStore::new().with_namespace("default", Arc::new(MemoryStore::default()));
	let adapters = AdapterRegistry::with_reqwest(ReqwestHttpClient::new()?);
	let manager = TokenLifecycleManager::new(
		registry,
		Arc::new(store),
		adapters,
		Environment::new("production")?,
	);
	let service = ServiceName::new("demo")?;
	let request = BTreeMap::from([
		("nonce".to_owned(), "demo-nonce".to_owned()),
		("return_to".to_owned(), "/dashboard".to_owned()),
	]);

	match manager.request_authorization(&service, request).await? {
		AuthorizationStart::Redirect(url) => println!("Send your user to {url}."),
		AuthorizationStart::Granted => println!("Service granted access without user approval."),
	}

	// The provider redirects back with the request token and a verifier.
	let callback = BTreeMap::from([
		("nonce".to_owned(), "demo-nonce".to_owned()),
		("oauth_token".to_owned(), "demo-request".to_owned()),
		("oauth_verifier".to_owned(), "demo-verifier".to_owned()),
	]);
	let context = manager.verify_authorization(&service, callback).await.into_result()?;

	println!("Authorized; returning the user to {:?}.", context.get("return_to"));

	let profile = manager.get(&service, "v1/profile", BTreeMap::new()).await?;

	println!("Signed call returned {profile}.");

	manager.release(&service).await?;

	let granted = manager.has_access(&service, &BTreeMap::new()).await;

	println!("Credentials released; has access: {granted}.");

	Ok(())
}
