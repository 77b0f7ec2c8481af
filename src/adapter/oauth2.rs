//! OAuth 2.0 placeholder adapter.

// self
use crate::{
	_prelude::*,
	adapter::{AccessRequest, AdapterFuture, AdapterKind, AuthorizationRequest, SigningAdapter},
	auth::{Params, TokenFields, TokenRecord},
	config::ServiceConfig,
};

const LABEL: &str = "OAuth 2.0";

/// Registers the `oauth2` adapter kind so configurations naming it resolve, while every
/// network operation fails fast with [`Error::NotImplemented`].
#[derive(Clone, Copy, Debug, Default)]
pub struct OAuth2;
impl OAuth2 {
	fn unsupported<'a, T>(operation: &'static str) -> AdapterFuture<'a, T>
	where
		T: 'a + Send,
	{
		Box::pin(async move {
			Err(Error::NotImplemented { adapter: LABEL.into(), operation: operation.into() })
		})
	}
}
impl SigningAdapter for OAuth2 {
	fn kind(&self) -> AdapterKind {
		AdapterKind::OAuth2
	}

	fn has_access(&self, _: &ServiceConfig, _: &TokenFields, _: &Params) -> bool {
		false
	}

	fn request<'a>(
		&'a self,
		_: &'a ServiceConfig,
		_: &'a Params,
	) -> AdapterFuture<'a, AuthorizationRequest> {
		Self::unsupported("request")
	}

	fn verify<'a>(
		&'a self,
		_: &'a ServiceConfig,
		_: &'a TokenRecord,
		_: &'a Params,
	) -> AdapterFuture<'a, TokenFields> {
		Self::unsupported("verify")
	}

	fn expires(&self, _: &ServiceConfig, _: &TokenFields) -> Option<i64> {
		None
	}

	fn refresh<'a>(
		&'a self,
		_: &'a ServiceConfig,
		_: &'a TokenFields,
	) -> AdapterFuture<'a, TokenFields> {
		Self::unsupported("refresh")
	}

	fn release<'a>(&'a self, _: &'a ServiceConfig, _: &'a TokenFields) -> AdapterFuture<'a, ()> {
		Self::unsupported("release")
	}

	fn access<'a>(
		&'a self,
		_: &'a ServiceConfig,
		_: &'a TokenFields,
		_: AccessRequest,
	) -> AdapterFuture<'a, String> {
		Self::unsupported("access")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::config::ServiceSettings;

	fn config() -> ServiceConfig {
		ServiceSettings { consumer_key: Some("ck".into()), ..Default::default() }
			.resolve(
				"svc".parse().expect("Service fixture should be valid."),
				"test".parse().expect("Environment fixture should be valid."),
			)
			.expect("Fixture settings should resolve.")
	}

	#[tokio::test]
	async fn network_operations_fail_fast() {
		let config = config();
		let token = TokenFields::new();
		let err = OAuth2
			.refresh(&config, &token)
			.await
			.expect_err("The placeholder never refreshes.");

		assert!(matches!(err, Error::NotImplemented { operation, .. } if operation == "refresh"));
		assert!(OAuth2.request(&config, &Params::new()).await.is_err());
		assert_eq!(OAuth2.expires(&config, &token), None);
		assert!(!OAuth2.has_access(&config, &token, &Params::new()));
	}
}
