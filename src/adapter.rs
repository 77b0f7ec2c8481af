//! Protocol plugins that fetch, renew, and use provider credentials.
//!
//! A [`SigningAdapter`] knows one authorization protocol. It never touches the token store or
//! takes locks; the lifecycle manager hands it the record fields it needs and persists
//! whatever it returns.

pub mod oauth1;
pub mod oauth2;

pub use self::{oauth1::OAuth1a, oauth2::OAuth2};

// self
use crate::{
	_prelude::*,
	auth::{Params, TokenFields, TokenRecord},
	config::ServiceConfig,
	error::ConfigError,
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

/// Boxed future returned by [`SigningAdapter`] operations.
pub type AdapterFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// OAuth 1.0a adapter over the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestOAuth1a = OAuth1a<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Protocol selected by a service's `adapter` setting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterKind {
	#[default]
	/// OAuth 1.0a (RFC 5849) with the session extension.
	#[serde(rename = "oauth1a", alias = "oauth1")]
	OAuth1a,
	/// OAuth 2.0 placeholder.
	#[serde(rename = "oauth2")]
	OAuth2,
}
impl AdapterKind {
	/// Returns a stable label suitable for configuration and log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AdapterKind::OAuth1a => "oauth1a",
			AdapterKind::OAuth2 => "oauth2",
		}
	}
}
impl Display for AdapterKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// How an authorization request continues.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationStart {
	/// Credentials were issued immediately (two-legged services).
	Granted,
	/// The end user must approve the request at this URL.
	Redirect(Url),
}

/// Result of [`SigningAdapter::request`].
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
	/// Temporary (or, when granted, final) credential fields.
	pub token: TokenFields,
	/// Next step for the caller.
	pub start: AuthorizationStart,
}

/// HTTP verbs supported by [`SigningAdapter::access`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
	/// `GET`; data goes to the query string.
	Get,
	/// `POST`; data goes to a form body.
	Post,
	/// `PUT`; data goes to a form body.
	Put,
	/// `DELETE`; data goes to the query string.
	Delete,
}
impl HttpMethod {
	/// Upper-case method name as used in signature base strings.
	pub const fn as_str(self) -> &'static str {
		match self {
			HttpMethod::Get => "GET",
			HttpMethod::Post => "POST",
			HttpMethod::Put => "PUT",
			HttpMethod::Delete => "DELETE",
		}
	}

	/// Returns true when request data travels in the body instead of the query string.
	pub const fn has_body(self) -> bool {
		matches!(self, HttpMethod::Post | HttpMethod::Put)
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Per-call options for [`SigningAdapter::access`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvokeOptions {
	/// Extra request headers. `Authorization` is always set by the adapter.
	pub headers: BTreeMap<String, String>,
}
impl InvokeOptions {
	/// Adds a request header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}
}

/// Signed resource call issued by [`SigningAdapter::access`].
#[derive(Clone, Debug)]
pub struct AccessRequest {
	/// HTTP verb.
	pub method: HttpMethod,
	/// Absolute URL or path relative to the service's `base`.
	pub path: String,
	/// Request parameters, signed along with the protocol parameters.
	pub data: Params,
	/// Transport options.
	pub options: InvokeOptions,
}

/// Protocol plugin contract.
pub trait SigningAdapter
where
	Self: Send + Sync,
{
	/// Adapter label used in errors and logs.
	fn kind(&self) -> AdapterKind;

	/// Returns true if `token` permits the access described by `request`.
	fn has_access(&self, config: &ServiceConfig, token: &TokenFields, request: &Params) -> bool;

	/// Starts an authorization.
	fn request<'a>(
		&'a self,
		config: &'a ServiceConfig,
		request: &'a Params,
	) -> AdapterFuture<'a, AuthorizationRequest>;

	/// Completes an authorization from the provider callback data, returning the final
	/// credential fields.
	fn verify<'a>(
		&'a self,
		config: &'a ServiceConfig,
		pending: &'a TokenRecord,
		response: &'a Params,
	) -> AdapterFuture<'a, TokenFields>;

	/// Absolute expiry of `token` in Unix seconds; `None` never expires.
	fn expires(&self, config: &ServiceConfig, token: &TokenFields) -> Option<i64>;

	/// Renews `token`, returning the replacement credential fields.
	fn refresh<'a>(
		&'a self,
		config: &'a ServiceConfig,
		token: &'a TokenFields,
	) -> AdapterFuture<'a, TokenFields>;

	/// Revokes `token` at the provider, if the protocol supports it.
	fn release<'a>(
		&'a self,
		config: &'a ServiceConfig,
		token: &'a TokenFields,
	) -> AdapterFuture<'a, ()>;

	/// Issues a signed resource call and returns the response body.
	fn access<'a>(
		&'a self,
		config: &'a ServiceConfig,
		token: &'a TokenFields,
		request: AccessRequest,
	) -> AdapterFuture<'a, String>;
}

/// Adapters available to the lifecycle manager, keyed by [`AdapterKind`].
#[derive(Clone, Default)]
pub struct AdapterRegistry(HashMap<AdapterKind, Arc<dyn SigningAdapter>>);
impl AdapterRegistry {
	/// Registers (or replaces) the adapter serving `kind`.
	pub fn with_adapter(mut self, kind: AdapterKind, adapter: Arc<dyn SigningAdapter>) -> Self {
		self.0.insert(kind, adapter);

		self
	}

	/// Registry with the reqwest-backed OAuth 1.0a adapter and the OAuth 2.0 placeholder.
	#[cfg(feature = "reqwest")]
	pub fn with_reqwest(client: ReqwestHttpClient) -> Self {
		Self::default()
			.with_adapter(
				AdapterKind::OAuth1a,
				Arc::new(ReqwestOAuth1a::new(client, ReqwestTransportErrorMapper)),
			)
			.with_adapter(AdapterKind::OAuth2, Arc::new(OAuth2))
	}

	/// Returns the adapter serving `kind`.
	pub fn get(&self, kind: AdapterKind) -> Result<&Arc<dyn SigningAdapter>, ConfigError> {
		self.0.get(&kind).ok_or(ConfigError::UnregisteredAdapter { kind })
	}
}
impl Debug for AdapterRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AdapterRegistry").field(&self.0.keys().collect::<Vec<_>>()).finish()
	}
}
