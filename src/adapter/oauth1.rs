//! OAuth 1.0a (RFC 5849) adapter with the session extension for renewable tokens.

pub mod response;
pub mod signature;

pub use signature::{RequestSigner, SignedRequest};

// crates.io
use oauth2::{
	AsyncHttpClient, HttpRequest, HttpResponse,
	http::{
		Method,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue},
	},
};
// self
use crate::{
	_prelude::*,
	adapter::{
		AccessRequest, AdapterFuture, AdapterKind, AuthorizationRequest, AuthorizationStart,
		HttpMethod, SigningAdapter,
	},
	auth::{Params, ScopeSet, TokenFields, TokenRecord},
	config::ServiceConfig,
	error::{ConfigError, TransportError},
	http::{ResponseMetadataSlot, TokenHttpClient, TransportErrorMapper},
};

const OUT_OF_BAND: &str = "oob";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const ACCEPT_VALUE: &str = "application/x-www-form-urlencoded, application/json;q=0.9, */*;q=0.1";

/// Token field holding the scopes granted at request time.
pub const SCOPE_FIELD: &str = "scope";
/// Token field holding the session handle used for renewals.
pub const SESSION_HANDLE_FIELD: &str = "oauth_session_handle";
/// Token field holding the absolute token expiry.
pub const EXPIRES_AT_FIELD: &str = "oauth_expires_at";
/// Token field holding the absolute end of the renewable session.
pub const AUTHORIZATION_EXPIRES_AT_FIELD: &str = "oauth_authorization_expires_at";

/// OAuth 1.0a signing adapter over a pluggable HTTP transport.
///
/// Token fields produced by this adapter are the provider's token response with
/// `oauth_expires_in` / `oauth_authorization_expires_in` rewritten to absolute
/// `*_expires_at` timestamps, plus `scope` when the authorization asked for one.
pub struct OAuth1a<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
}
impl<C, M> OAuth1a<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an adapter that reuses the caller-provided transport + mapper pair.
	pub fn new(http_client: impl Into<Arc<C>>, transport_mapper: impl Into<Arc<M>>) -> Self {
		Self { http_client: http_client.into(), transport_mapper: transport_mapper.into() }
	}

	fn signer<'a>(config: &'a ServiceConfig) -> RequestSigner<'a> {
		RequestSigner::new(
			config.signature_method,
			&config.consumer.key,
			config.consumer.secret.expose(),
		)
		.with_realm(config.realm.as_deref())
	}

	async fn send(
		&self,
		method: Method,
		url: &Url,
		authorization: &str,
		body: Option<String>,
		headers: &BTreeMap<String, String>,
	) -> Result<HttpResponse> {
		let slot = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(slot.clone());
		let mut builder = oauth2::http::Request::builder()
			.method(method)
			.uri(url.as_str())
			.header(ACCEPT, ACCEPT_VALUE);

		for (name, value) in headers {
			let name = HeaderName::from_bytes(name.as_bytes())
				.map_err(oauth2::http::Error::from)
				.map_err(ConfigError::from)?;
			let value = HeaderValue::from_str(value)
				.map_err(oauth2::http::Error::from)
				.map_err(ConfigError::from)?;

			builder = builder.header(name, value);
		}

		builder = builder.header(AUTHORIZATION, authorization);

		let request: HttpRequest = match body {
			Some(body) =>
				builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE).body(body.into_bytes()),
			None => builder.body(Vec::new()),
		}
		.map_err(ConfigError::from)?;

		handle
			.call(request)
			.await
			.map_err(|e| self.transport_mapper.map_transport_error(slot.take().as_ref(), e))
	}

	// POSTs a signed token request and converts the answer into credential fields.
	async fn fetch_token(
		&self,
		url: &Url,
		signer: RequestSigner<'_>,
		data: &Params,
	) -> Result<TokenFields> {
		let signed = signer.sign(Method::POST.as_str(), url, data);
		let body = encode_form(data);
		let response = self
			.send(Method::POST, url, &signed.authorization, Some(body), &BTreeMap::new())
			.await?;
		let params = response::parse_params(&response);

		response::ensure_success(&response, &params)?;

		response::token_fields(params, response.status().as_u16(), OffsetDateTime::now_utc())
	}

	async fn request_token(
		&self,
		config: &ServiceConfig,
		request: &Params,
	) -> Result<AuthorizationRequest> {
		let scope = request.get(SCOPE_FIELD).filter(|scope| !scope.is_empty());

		if config.is_two_legged() {
			let mut token = TokenFields::new();

			if let Some(scope) = scope {
				token.insert(SCOPE_FIELD, scope.as_str());
			}

			return Ok(AuthorizationRequest { token, start: AuthorizationStart::Granted });
		}

		let callback = request.get("callback").map_or(OUT_OF_BAND, String::as_str);
		let signer = Self::signer(config).with_param("oauth_callback", callback);
		let data = scope
			.map(|scope| Params::from([(SCOPE_FIELD.to_owned(), scope.clone())]))
			.unwrap_or_default();
		let mut token = self.fetch_token(config.request_token_url()?, signer, &data).await?;

		if let Some(scope) = scope {
			token.insert(SCOPE_FIELD, scope.as_str());
		}

		let mut redirect = config.endpoints.authorize.clone().ok_or_else(|| {
			ConfigError::MissingSetting { service: config.service.to_string(), setting: "authorize" }
		})?;

		redirect
			.query_pairs_mut()
			.append_pair("oauth_token", token.get("oauth_token").unwrap_or_default());

		Ok(AuthorizationRequest { token, start: AuthorizationStart::Redirect(redirect) })
	}

	async fn access_token(
		&self,
		config: &ServiceConfig,
		pending: &TokenRecord,
		callback: &Params,
	) -> Result<TokenFields> {
		let (request_token, request_secret) = credentials(&pending.token)?;

		if callback.get("oauth_token").is_some_and(|token| token != request_token) {
			return Err(Error::MismatchedToken);
		}

		let mut signer = Self::signer(config).with_token(request_token, request_secret);

		if let Some(verifier) = callback.get("oauth_verifier") {
			signer = signer.with_param("oauth_verifier", verifier.as_str());
		}

		let mut token =
			self.fetch_token(config.access_token_url()?, signer, &Params::new()).await?;

		carry_over(&pending.token, &mut token, SCOPE_FIELD);

		Ok(token)
	}

	async fn renew(&self, config: &ServiceConfig, token: &TokenFields) -> Result<TokenFields> {
		let handle = token.get(SESSION_HANDLE_FIELD).ok_or(Error::Expired)?;
		let session_ends = token
			.get(AUTHORIZATION_EXPIRES_AT_FIELD)
			.and_then(|value| value.parse::<i64>().ok());

		if session_ends.is_some_and(|ends| OffsetDateTime::now_utc().unix_timestamp() >= ends) {
			return Err(Error::Expired);
		}

		let (access_token, access_secret) = credentials(token)?;
		let signer = Self::signer(config)
			.with_token(access_token, access_secret)
			.with_param(SESSION_HANDLE_FIELD, handle);
		let mut renewed =
			self.fetch_token(config.access_token_url()?, signer, &Params::new()).await?;

		for field in [SCOPE_FIELD, SESSION_HANDLE_FIELD, AUTHORIZATION_EXPIRES_AT_FIELD] {
			carry_over(token, &mut renewed, field);
		}

		Ok(renewed)
	}

	async fn signed_call(
		&self,
		config: &ServiceConfig,
		token: &TokenFields,
		request: AccessRequest,
	) -> Result<String> {
		let mut url = config.resource_url(&request.path)?;
		let mut signer = Self::signer(config);

		if let (Some(access_token), Some(access_secret)) =
			(token.get("oauth_token"), token.get("oauth_token_secret"))
		{
			signer = signer.with_token(access_token, access_secret);
		}

		let signed = signer.sign(request.method.as_str(), &url, &request.data);
		let body = if request.method.has_body() {
			Some(encode_form(&request.data))
		} else {
			if !request.data.is_empty() {
				url.query_pairs_mut().extend_pairs(request.data.iter());
			}

			None
		};
		let response = self
			.send(
				http_method(request.method),
				&url,
				&signed.authorization,
				body,
				&request.options.headers,
			)
			.await?;

		response::ensure_success(&response, &Params::new())?;

		String::from_utf8(response.into_body()).map_err(|e| TransportError::from(e).into())
	}
}
impl<C, M> SigningAdapter for OAuth1a<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn kind(&self) -> AdapterKind {
		AdapterKind::OAuth1a
	}

	fn has_access(&self, config: &ServiceConfig, token: &TokenFields, request: &Params) -> bool {
		if !config.is_two_legged() && token.get("oauth_token").is_none() {
			return false;
		}

		let Some(requested) = request.get(SCOPE_FIELD).filter(|scope| !scope.is_empty()) else {
			return true;
		};
		let granted = token.get(SCOPE_FIELD).unwrap_or_default();

		match (ScopeSet::from_str(granted), ScopeSet::from_str(requested)) {
			(Ok(granted), Ok(requested)) => granted.covers(&requested),
			_ => false,
		}
	}

	fn request<'a>(
		&'a self,
		config: &'a ServiceConfig,
		request: &'a Params,
	) -> AdapterFuture<'a, AuthorizationRequest> {
		Box::pin(self.request_token(config, request))
	}

	fn verify<'a>(
		&'a self,
		config: &'a ServiceConfig,
		pending: &'a TokenRecord,
		response: &'a Params,
	) -> AdapterFuture<'a, TokenFields> {
		Box::pin(self.access_token(config, pending, response))
	}

	fn expires(&self, _: &ServiceConfig, token: &TokenFields) -> Option<i64> {
		token.get(EXPIRES_AT_FIELD).and_then(|value| value.parse().ok())
	}

	fn refresh<'a>(
		&'a self,
		config: &'a ServiceConfig,
		token: &'a TokenFields,
	) -> AdapterFuture<'a, TokenFields> {
		Box::pin(self.renew(config, token))
	}

	fn release<'a>(&'a self, _: &'a ServiceConfig, _: &'a TokenFields) -> AdapterFuture<'a, ()> {
		Box::pin(async { Ok(()) })
	}

	fn access<'a>(
		&'a self,
		config: &'a ServiceConfig,
		token: &'a TokenFields,
		request: AccessRequest,
	) -> AdapterFuture<'a, String> {
		Box::pin(self.signed_call(config, token, request))
	}
}

fn credentials(token: &TokenFields) -> Result<(&str, &str)> {
	match (token.get("oauth_token"), token.get("oauth_token_secret")) {
		(Some(token), Some(secret)) => Ok((token, secret)),
		_ => Err(Error::MissingCredentials),
	}
}

fn carry_over(from: &TokenFields, to: &mut TokenFields, field: &str) {
	if to.get(field).is_none()
		&& let Some(value) = from.get(field)
	{
		to.insert(field, value);
	}
}

fn encode_form(data: &Params) -> String {
	url::form_urlencoded::Serializer::new(String::new()).extend_pairs(data.iter()).finish()
}

fn http_method(method: HttpMethod) -> Method {
	match method {
		HttpMethod::Get => Method::GET,
		HttpMethod::Post => Method::POST,
		HttpMethod::Put => Method::PUT,
		HttpMethod::Delete => Method::DELETE,
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{Environment, ServiceName, TokenSecret},
		config::ServiceSettings,
		http::{ReqwestHttpClient, ReqwestTransportErrorMapper},
	};

	type Adapter = OAuth1a<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	fn adapter() -> Adapter {
		OAuth1a::new(ReqwestHttpClient::default(), ReqwestTransportErrorMapper)
	}

	fn config(authorize: &str) -> ServiceConfig {
		ServiceSettings {
			consumer_key: Some("ck".into()),
			consumer_secret: Some(TokenSecret::new("cs")),
			base: Some("https://api.example.com".into()),
			request_token: Some("oauth/request_token".into()),
			access_token: Some("oauth/access_token".into()),
			authorize: Some(authorize.into()),
			..Default::default()
		}
		.resolve(
			ServiceName::new("svc").expect("Service fixture should be valid."),
			Environment::new("test").expect("Environment fixture should be valid."),
		)
		.expect("Fixture settings should resolve.")
	}

	fn params(pairs: &[(&str, &str)]) -> Params {
		pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
	}

	#[tokio::test]
	async fn two_legged_requests_are_granted_without_network() {
		let granted = adapter()
			.request(&config(""), &params(&[("scope", "read")]))
			.await
			.expect("Two-legged services grant immediately.");

		assert_eq!(granted.start, AuthorizationStart::Granted);
		assert_eq!(granted.token.get(SCOPE_FIELD), Some("read"));
	}

	#[tokio::test]
	async fn mismatched_callback_token_is_rejected_before_network() {
		let pending = TokenRecord::pending(Params::new()).with_token(
			[("oauth_token", "request-token"), ("oauth_token_secret", "s")].into_iter().collect(),
		);
		let err = adapter()
			.verify(&config("oauth/authorize"), &pending, &params(&[("oauth_token", "other")]))
			.await
			.expect_err("Foreign callback tokens must be rejected.");

		assert!(matches!(err, Error::MismatchedToken));
	}

	#[tokio::test]
	async fn renewal_requires_a_session_handle() {
		let token: TokenFields =
			[("oauth_token", "t"), ("oauth_token_secret", "s")].into_iter().collect();
		let err = adapter()
			.refresh(&config("oauth/authorize"), &token)
			.await
			.expect_err("Tokens without a session handle cannot be renewed.");

		assert!(matches!(err, Error::Expired));
	}

	#[test]
	fn has_access_checks_scope_coverage() {
		let adapter = adapter();
		let config = config("oauth/authorize");
		let token: TokenFields =
			[("oauth_token", "t"), ("scope", "read write")].into_iter().collect();

		assert!(adapter.has_access(&config, &token, &Params::new()));
		assert!(adapter.has_access(&config, &token, &params(&[("scope", "read")])));
		assert!(!adapter.has_access(&config, &token, &params(&[("scope", "read admin")])));
		assert!(!adapter.has_access(&config, &TokenFields::new(), &Params::new()));
	}

	#[test]
	fn expires_reads_absolute_expiry() {
		let adapter = adapter();
		let config = config("oauth/authorize");
		let token: TokenFields = [(EXPIRES_AT_FIELD, "2147483646")].into_iter().collect();

		assert_eq!(adapter.expires(&config, &token), Some(2_147_483_646));
		assert_eq!(adapter.expires(&config, &TokenFields::new()), None);
	}
}
