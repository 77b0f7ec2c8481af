//! Cache keys derived from `(service, environment, qualifier)`.

// self
use crate::{
	_prelude::*,
	auth::{Environment, ServiceName},
};

const DELIMITER: char = '-';
const DURABLE_QUALIFIER: &str = "token";
const TEMP_QUALIFIER: &str = "temp";

/// Key under which a [`TokenRecord`](crate::auth::TokenRecord) is stored.
///
/// Rendered as `<service>-<environment>-<qualifier>`, where the qualifier is `token` for the
/// durable credential and `temp<nonce>` for an in-flight authorization request. Backends see
/// this exact string, so it stays stable across releases.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);
impl CacheKey {
	/// Key of the durable credential for a service.
	pub fn durable(service: &ServiceName, environment: &Environment) -> Self {
		Self::compose(service, environment, DURABLE_QUALIFIER)
	}

	/// Key of an in-flight request; an empty nonce is allowed.
	pub fn temp(service: &ServiceName, environment: &Environment, nonce: &str) -> Self {
		Self::compose(service, environment, &format!("{TEMP_QUALIFIER}{nonce}"))
	}

	fn compose(service: &ServiceName, environment: &Environment, qualifier: &str) -> Self {
		Self(format!("{service}{DELIMITER}{environment}{DELIMITER}{qualifier}"))
	}

	/// Rendered key string.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for CacheKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Debug for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "CacheKey({})", self.0)
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
