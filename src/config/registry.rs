// self
use crate::{
	_prelude::*,
	auth::{Environment, ServiceName},
	config::{ServiceConfig, ServiceSettings},
	error::ConfigError,
};

/// Name of the settings block every environment is layered over.
pub const DEFAULT_BLOCK: &str = "default";

type EnvironmentBlocks = HashMap<String, ServiceSettings>;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryDocument {
	services: HashMap<ServiceName, EnvironmentBlocks>,
}

/// Explicit configuration object holding every service's raw settings.
///
/// Resolution is lazy: the first [`resolve`](Self::resolve) of a `(service, environment)` pair
/// layers and validates its settings, later calls return the cached [`ServiceConfig`].
///
/// ```
/// use oauth_delegate::{
/// 	auth::{Environment, ServiceName},
/// 	config::ServiceRegistry,
/// };
///
/// let registry = ServiceRegistry::from_json_str(
/// 	r#"{ "services": { "svc": {
/// 		"default": { "consumer_key": "ck", "consumer_secret": "cs", "base": "api.example.com" },
/// 		"production": { "consumer_key": "prod-ck" }
/// 	} } }"#,
/// )?;
/// let config = registry.resolve(&ServiceName::new("svc")?, &Environment::new("production")?)?;
///
/// assert_eq!(config.consumer.key, "prod-ck");
/// assert!(config.is_two_legged());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default)]
pub struct ServiceRegistry {
	services: HashMap<ServiceName, EnvironmentBlocks>,
	resolved: RwLock<HashMap<(ServiceName, Environment), Arc<ServiceConfig>>>,
}
impl ServiceRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses a `{ "services": { <service>: { <environment>: {...} } } }` document.
	///
	/// Failures report the JSON path of the offending value.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let deserializer = &mut serde_json::Deserializer::from_str(json);
		let document: RegistryDocument =
			serde_path_to_error::deserialize(deserializer).map_err(|e| ConfigError::Parse {
				path: e.path().to_string(),
				message: e.inner().to_string(),
			})?;

		Ok(Self { services: document.services, resolved: Default::default() })
	}

	/// Adds (or replaces) the settings block of `service` for `environment`.
	///
	/// Use [`DEFAULT_BLOCK`] as the environment to set the shared base layer.
	pub fn with_settings(
		mut self,
		service: ServiceName,
		environment: impl Into<String>,
		settings: ServiceSettings,
	) -> Self {
		self.services.entry(service).or_default().insert(environment.into(), settings);
		self.resolved.get_mut().clear();

		self
	}

	/// Names of every configured service.
	pub fn services(&self) -> impl Iterator<Item = &ServiceName> {
		self.services.keys()
	}

	/// Returns the validated configuration of `service` in `environment`.
	pub fn resolve(
		&self,
		service: &ServiceName,
		environment: &Environment,
	) -> Result<Arc<ServiceConfig>, ConfigError> {
		let cache_key = (service.clone(), environment.clone());

		if let Some(config) = self.resolved.read().get(&cache_key) {
			return Ok(Arc::clone(config));
		}

		let config = Arc::new(self.layer(service, environment)?);

		Ok(Arc::clone(self.resolved.write().entry(cache_key).or_insert(config)))
	}

	fn layer(
		&self,
		service: &ServiceName,
		environment: &Environment,
	) -> Result<ServiceConfig, ConfigError> {
		let blocks = self
			.services
			.get(service)
			.ok_or_else(|| ConfigError::UnknownService { service: service.to_string() })?;
		let base = blocks.get(DEFAULT_BLOCK).cloned();
		let overrides = blocks.get(environment.as_ref()).cloned();
		let settings = match (base, overrides) {
			(Some(base), Some(overrides)) => base.layered(overrides),
			(Some(only), None) | (None, Some(only)) => only,
			(None, None) =>
				return Err(ConfigError::UnknownEnvironment {
					service: service.to_string(),
					environment: environment.to_string(),
				}),
		};

		settings.resolve(service.clone(), environment.clone())
	}
}
impl Debug for ServiceRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceRegistry")
			.field("services", &self.services.keys().collect::<Vec<_>>())
			.field("resolved", &self.resolved.read().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::TokenSecret;

	const DOCUMENT: &str = r#"{
		"services": {
			"svc": {
				"default": {
					"consumer_key": "ck",
					"consumer_secret": "cs",
					"base": "https://api.example.com",
					"request_token": "oauth/request_token",
					"access_token": "oauth/access_token",
					"authorize": "https://api.example.com/oauth/authorize"
				},
				"production": { "consumer_key": "prod-ck", "temp_ttl": 120 }
			}
		}
	}"#;

	fn names(service: &str, environment: &str) -> (ServiceName, Environment) {
		(
			ServiceName::new(service).expect("Service fixture should be valid."),
			Environment::new(environment).expect("Environment fixture should be valid."),
		)
	}

	#[test]
	fn environments_layer_over_default_and_are_cached() {
		let registry = ServiceRegistry::from_json_str(DOCUMENT).expect("Document should parse.");
		let (service, production) = names("svc", "production");
		let config = registry.resolve(&service, &production).expect("Production should resolve.");

		assert_eq!(config.consumer.key, "prod-ck");
		assert_eq!(config.consumer.secret, TokenSecret::new("cs"));
		assert_eq!(config.temp_ttl, Duration::minutes(2));

		let again = registry.resolve(&service, &production).expect("Cached lookup should work.");

		assert!(Arc::ptr_eq(&config, &again));

		let (_, staging) = names("svc", "staging");
		let fallback = registry.resolve(&service, &staging).expect("Default block applies.");

		assert_eq!(fallback.consumer.key, "ck");
		assert_eq!(fallback.environment, staging);
	}

	#[test]
	fn unknown_services_are_reported() {
		let registry = ServiceRegistry::from_json_str(DOCUMENT).expect("Document should parse.");
		let (service, environment) = names("other", "production");

		assert!(matches!(
			registry.resolve(&service, &environment),
			Err(ConfigError::UnknownService { .. })
		));
	}

	#[test]
	fn parse_errors_carry_the_json_path() {
		let err = ServiceRegistry::from_json_str(
			r#"{ "services": { "svc": { "default": { "signature_method": "RSA-SHA1" } } } }"#,
		)
		.expect_err("Unsupported signature methods must be rejected.");

		match err {
			ConfigError::Parse { path, .. } =>
				assert_eq!(path, "services.svc.default.signature_method"),
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn programmatic_settings_invalidate_cache() {
		let (service, environment) = names("svc", "test");
		let registry = ServiceRegistry::new().with_settings(
			service.clone(),
			DEFAULT_BLOCK,
			ServiceSettings { consumer_key: Some("ck".into()), ..Default::default() },
		);

		assert_eq!(
			registry.resolve(&service, &environment).expect("Should resolve.").consumer.key,
			"ck"
		);

		let registry = registry.with_settings(
			service.clone(),
			"test",
			ServiceSettings { consumer_key: Some("test-ck".into()), ..Default::default() },
		);

		assert_eq!(
			registry.resolve(&service, &environment).expect("Should resolve.").consumer.key,
			"test-ck"
		);
	}
}
