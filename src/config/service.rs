// self
use crate::{
	_prelude::*,
	adapter::AdapterKind,
	auth::{Environment, ServiceName, TokenSecret},
	error::ConfigError,
};

/// Namespace used when a service does not name its caches.
pub const DEFAULT_CACHE_NAMESPACE: &str = "default";
/// Lifetime of in-flight temp records when `temp_ttl` is not configured.
pub const DEFAULT_TEMP_TTL_SECS: u64 = 3_600;

/// Digest used to sign OAuth 1.0a requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureMethod {
	#[default]
	/// `HMAC-SHA1` keyed by the consumer and token secrets.
	#[serde(rename = "HMAC-SHA1")]
	HmacSha1,
	/// `PLAINTEXT`: the signing key itself; only safe over TLS.
	#[serde(rename = "PLAINTEXT")]
	Plaintext,
}
impl SignatureMethod {
	/// Value sent as `oauth_signature_method`.
	pub const fn as_str(self) -> &'static str {
		match self {
			SignatureMethod::HmacSha1 => "HMAC-SHA1",
			SignatureMethod::Plaintext => "PLAINTEXT",
		}
	}
}
impl Display for SignatureMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Raw, possibly partial settings for one service in one environment.
///
/// Every field is optional so an environment block can override just what differs from the
/// service's `default` block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSettings {
	/// Signing adapter kind.
	pub adapter: Option<AdapterKind>,
	/// Cache namespace for in-flight temp records.
	pub temp_cache: Option<String>,
	/// Cache namespace for durable credentials.
	pub token_cache: Option<String>,
	/// Provider-side application identifier (informational).
	pub consumer_app_id: Option<String>,
	/// OAuth consumer key.
	pub consumer_key: Option<String>,
	/// OAuth consumer secret.
	pub consumer_secret: Option<TokenSecret>,
	/// Request-token endpoint (absolute URL or path relative to `base`).
	pub request_token: Option<String>,
	/// Access-token endpoint (absolute URL or path relative to `base`).
	pub access_token: Option<String>,
	/// User authorization endpoint; empty marks a two-legged service.
	pub authorize: Option<String>,
	/// Base URL for relative endpoints and resource paths; `https://` is assumed without scheme.
	pub base: Option<String>,
	/// Signature method.
	pub signature_method: Option<SignatureMethod>,
	/// `realm` parameter of the `Authorization` header.
	pub realm: Option<String>,
	/// Lifetime of in-flight temp records, in seconds.
	pub temp_ttl: Option<u64>,
}
impl ServiceSettings {
	/// Returns `self` with every field set in `overrides` replaced.
	pub fn layered(self, overrides: ServiceSettings) -> Self {
		Self {
			adapter: overrides.adapter.or(self.adapter),
			temp_cache: overrides.temp_cache.or(self.temp_cache),
			token_cache: overrides.token_cache.or(self.token_cache),
			consumer_app_id: overrides.consumer_app_id.or(self.consumer_app_id),
			consumer_key: overrides.consumer_key.or(self.consumer_key),
			consumer_secret: overrides.consumer_secret.or(self.consumer_secret),
			request_token: overrides.request_token.or(self.request_token),
			access_token: overrides.access_token.or(self.access_token),
			authorize: overrides.authorize.or(self.authorize),
			base: overrides.base.or(self.base),
			signature_method: overrides.signature_method.or(self.signature_method),
			realm: overrides.realm.or(self.realm),
			temp_ttl: overrides.temp_ttl.or(self.temp_ttl),
		}
	}

	/// Validates the settings into a [`ServiceConfig`].
	pub fn resolve(
		self,
		service: ServiceName,
		environment: Environment,
	) -> Result<ServiceConfig, ConfigError> {
		let missing = |setting: &'static str| ConfigError::MissingSetting {
			service: service.to_string(),
			setting,
		};
		let base = self.base.as_deref().map(parse_base).transpose()?;
		let authorize = match self.authorize.as_deref().map(str::trim) {
			None | Some("") => None,
			Some(value) => Some(resolve_endpoint("authorize", value, base.as_ref())?),
		};
		let request_token = self
			.request_token
			.as_deref()
			.map(|value| resolve_endpoint("request_token", value, base.as_ref()))
			.transpose()?;
		let access_token = self
			.access_token
			.as_deref()
			.map(|value| resolve_endpoint("access_token", value, base.as_ref()))
			.transpose()?;

		if authorize.is_some() {
			if request_token.is_none() {
				return Err(missing("request_token"));
			}
			if access_token.is_none() {
				return Err(missing("access_token"));
			}
		}

		let consumer = ConsumerCredentials {
			app_id: self.consumer_app_id,
			key: self.consumer_key.ok_or_else(|| missing("consumer_key"))?,
			secret: self.consumer_secret.unwrap_or_default(),
		};

		Ok(ServiceConfig {
			service,
			environment,
			adapter: self.adapter.unwrap_or_default(),
			temp_cache: self.temp_cache.unwrap_or_else(|| DEFAULT_CACHE_NAMESPACE.into()),
			token_cache: self.token_cache.unwrap_or_else(|| DEFAULT_CACHE_NAMESPACE.into()),
			consumer,
			endpoints: ServiceEndpoints { base, request_token, access_token, authorize },
			signature_method: self.signature_method.unwrap_or_default(),
			realm: self.realm,
			temp_ttl: Duration::seconds(
				self.temp_ttl.unwrap_or(DEFAULT_TEMP_TTL_SECS).min(i64::MAX as u64) as i64,
			),
		})
	}
}

/// Consumer (client application) credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumerCredentials {
	/// Provider-side application identifier.
	pub app_id: Option<String>,
	/// Consumer key sent as `oauth_consumer_key`.
	pub key: String,
	/// Consumer secret; first half of the signing key.
	pub secret: TokenSecret,
}

/// Absolute provider endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceEndpoints {
	/// Base URL for relative resource paths.
	pub base: Option<Url>,
	/// Request-token endpoint.
	pub request_token: Option<Url>,
	/// Access-token endpoint (also used for session renewal).
	pub access_token: Option<Url>,
	/// User authorization endpoint; `None` for two-legged services.
	pub authorize: Option<Url>,
}

/// Immutable configuration for one `(service, environment)` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
	/// Service name.
	pub service: ServiceName,
	/// Environment the settings were resolved for.
	pub environment: Environment,
	/// Signing adapter kind.
	pub adapter: AdapterKind,
	/// Cache namespace for in-flight temp records.
	pub temp_cache: String,
	/// Cache namespace for durable credentials.
	pub token_cache: String,
	/// Consumer credentials.
	pub consumer: ConsumerCredentials,
	/// Provider endpoints.
	pub endpoints: ServiceEndpoints,
	/// Signature method.
	pub signature_method: SignatureMethod,
	/// Optional `realm` for the `Authorization` header.
	pub realm: Option<String>,
	/// Lifetime of in-flight temp records.
	pub temp_ttl: Duration,
}
impl ServiceConfig {
	/// Returns true when the service has no user authorization step.
	pub fn is_two_legged(&self) -> bool {
		self.endpoints.authorize.is_none()
	}

	/// Request-token endpoint, required by three-legged services.
	pub fn request_token_url(&self) -> Result<&Url, ConfigError> {
		self.endpoints.request_token.as_ref().ok_or_else(|| self.missing("request_token"))
	}

	/// Access-token endpoint, required for verification and renewal.
	pub fn access_token_url(&self) -> Result<&Url, ConfigError> {
		self.endpoints.access_token.as_ref().ok_or_else(|| self.missing("access_token"))
	}

	/// Resolves a resource path against `base`; absolute URLs are returned unchanged.
	pub fn resource_url(&self, path: &str) -> Result<Url, ConfigError> {
		resolve_endpoint("resource", path, self.endpoints.base.as_ref())
	}

	fn missing(&self, setting: &'static str) -> ConfigError {
		ConfigError::MissingSetting { service: self.service.to_string(), setting }
	}
}

fn parse_base(value: &str) -> Result<Url, ConfigError> {
	let value = value.trim();
	let candidate =
		if value.contains("://") { value.to_owned() } else { format!("https://{value}") };
	let mut url = Url::parse(&candidate).map_err(|source| ConfigError::InvalidEndpoint {
		endpoint: "base",
		value: value.to_owned(),
		source,
	})?;

	// Relative joins must append to the base path instead of replacing its last segment.
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	Ok(url)
}

fn resolve_endpoint(
	endpoint: &'static str,
	value: &str,
	base: Option<&Url>,
) -> Result<Url, ConfigError> {
	let invalid = |source: url::ParseError| ConfigError::InvalidEndpoint {
		endpoint,
		value: value.to_owned(),
		source,
	};

	match Url::parse(value) {
		Ok(url) => Ok(url),
		Err(url::ParseError::RelativeUrlWithoutBase) => match base {
			Some(base) => base.join(value.trim_start_matches('/')).map_err(invalid),
			None => Err(invalid(url::ParseError::RelativeUrlWithoutBase)),
		},
		Err(source) => Err(invalid(source)),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn names() -> (ServiceName, Environment) {
		(
			ServiceName::new("svc").expect("Service fixture should be valid."),
			Environment::new("test").expect("Environment fixture should be valid."),
		)
	}

	fn three_legged() -> ServiceSettings {
		ServiceSettings {
			consumer_key: Some("ck".into()),
			consumer_secret: Some(TokenSecret::new("cs")),
			base: Some("api.example.com/v1".into()),
			request_token: Some("oauth/request_token".into()),
			access_token: Some("/oauth/access_token".into()),
			authorize: Some("https://auth.example.com/authorize".into()),
			..Default::default()
		}
	}

	#[test]
	fn relative_endpoints_join_onto_schemeless_base() {
		let (service, environment) = names();
		let config =
			three_legged().resolve(service, environment).expect("Settings should resolve.");

		assert_eq!(
			config.request_token_url().expect("Request endpoint should exist.").as_str(),
			"https://api.example.com/v1/oauth/request_token"
		);
		assert_eq!(
			config.access_token_url().expect("Access endpoint should exist.").as_str(),
			"https://api.example.com/v1/oauth/access_token"
		);
		assert_eq!(
			config.resource_url("statuses/home.json").expect("Resource should resolve.").as_str(),
			"https://api.example.com/v1/statuses/home.json"
		);
		assert_eq!(
			config.resource_url("http://other.test/x").expect("Absolute URL is kept.").as_str(),
			"http://other.test/x"
		);
		assert!(!config.is_two_legged());
		assert_eq!(config.signature_method, SignatureMethod::HmacSha1);
		assert_eq!(config.temp_ttl, Duration::hours(1));
		assert_eq!(config.token_cache, DEFAULT_CACHE_NAMESPACE);
	}

	#[test]
	fn empty_authorize_marks_two_legged_service() {
		let (service, environment) = names();
		let settings = ServiceSettings {
			authorize: Some(String::new()),
			request_token: None,
			access_token: None,
			..three_legged()
		};
		let config = settings.resolve(service, environment).expect("Two-legged should resolve.");

		assert!(config.is_two_legged());
		assert!(config.access_token_url().is_err());
	}

	#[test]
	fn three_legged_services_require_token_endpoints() {
		let (service, environment) = names();
		let settings = ServiceSettings { access_token: None, ..three_legged() };
		let err = settings.resolve(service, environment).expect_err("Access endpoint is required.");

		assert!(matches!(err, ConfigError::MissingSetting { setting: "access_token", .. }));
	}

	#[test]
	fn layering_prefers_overrides() {
		let base = three_legged();
		let layered = base.clone().layered(ServiceSettings {
			consumer_key: Some("prod-key".into()),
			temp_ttl: Some(60),
			..Default::default()
		});

		assert_eq!(layered.consumer_key.as_deref(), Some("prod-key"));
		assert_eq!(layered.temp_ttl, Some(60));
		assert_eq!(layered.base, base.base);
	}

	#[test]
	fn signature_method_uses_wire_names() {
		let method: SignatureMethod =
			serde_json::from_str("\"PLAINTEXT\"").expect("PLAINTEXT should deserialize.");

		assert_eq!(method, SignatureMethod::Plaintext);
		assert_eq!(SignatureMethod::HmacSha1.to_string(), "HMAC-SHA1");
	}
}
