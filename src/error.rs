//! Crate-level error types shared across the lifecycle manager, adapters, and stores.

// std
use std::borrow::Cow;
// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No durable credential exists for the service, or it is no longer authorized.
	#[error("No authorized credentials are stored for this service.")]
	MissingCredentials,
	/// Token is past its expiry and cannot be renewed.
	#[error("Token has expired and cannot be renewed.")]
	Expired,
	/// Provider callback references a different token than the one on file.
	#[error("Callback references a token that does not match the pending request.")]
	MismatchedToken,
	/// Callback arrived for a request that is unknown or was already completed differently.
	#[error("No matching authorization request is pending.")]
	UnknownRequest,
	/// Provider returned a non-success status or an explicit OAuth problem code.
	#[error("Provider rejected the request ({}): {detail}.", describe_status(.status))]
	Remote {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Human-readable problem description.
		detail: String,
	},
	/// Refresh contention outlasted the retry budget.
	#[error("Token refresh did not settle after {attempts} attempts.")]
	RefreshExhausted {
		/// Number of attempts that were made.
		attempts: u32,
	},
	/// A cache lock could not be acquired.
	#[error("Cache lock for `{key}` is held by another caller.")]
	LockUnavailable {
		/// Cache key whose lock was contended.
		key: String,
	},
	/// The selected adapter does not implement the operation.
	#[error("The {adapter} adapter does not implement {operation}.")]
	NotImplemented {
		/// Adapter label.
		adapter: Cow<'static, str>,
		/// Operation label.
		operation: Cow<'static, str>,
	},
}
impl Error {
	/// Builds a [`Error::Remote`] from a status code and detail message.
	pub fn remote(status: Option<u16>, detail: impl Into<String>) -> Self {
		Self::Remote { status, detail: detail.into() }
	}
}

fn describe_status(status: &Option<u16>) -> String {
	status.map_or_else(|| "no status".to_owned(), |code| code.to_string())
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Configuration document could not be parsed.
	#[error("Configuration is invalid at `{path}`: {message}.")]
	Parse {
		/// JSON path of the offending value.
		path: String,
		/// Parser message.
		message: String,
	},
	/// No configuration exists for the service.
	#[error("Service `{service}` is not configured.")]
	UnknownService {
		/// Requested service name.
		service: String,
	},
	/// Service has no settings for the environment and no `default` block.
	#[error("Service `{service}` has no settings for environment `{environment}`.")]
	UnknownEnvironment {
		/// Requested service name.
		service: String,
		/// Requested environment name.
		environment: String,
	},
	/// A mandatory setting is absent after layering.
	#[error("Service `{service}` is missing the `{setting}` setting.")]
	MissingSetting {
		/// Service name.
		service: String,
		/// Setting name.
		setting: &'static str,
	},
	/// Endpoint URL cannot be parsed.
	#[error("The {endpoint} endpoint is not a valid URL: {value}.")]
	InvalidEndpoint {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Raw configured value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configuration failure read back from a stored record.
	#[error("{message}")]
	Recorded {
		/// Rendered original error.
		message: String,
	},
	/// No adapter is registered for the configured kind.
	#[error("No signing adapter is registered for `{kind}`.")]
	UnregisteredAdapter {
		/// Configured adapter kind.
		kind: crate::adapter::AdapterKind,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
	/// Provider responded with a body that is not valid UTF-8.
	#[error("Provider response body is not valid UTF-8.")]
	InvalidBody(#[from] std::string::FromUtf8Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn remote_error_reports_status_and_detail() {
		let err = Error::remote(Some(401), "token rejected");

		assert_eq!(err.to_string(), "Provider rejected the request (401): token rejected.");

		let err = Error::remote(None, "signature invalid");

		assert_eq!(err.to_string(), "Provider rejected the request (no status): signature invalid.");
	}

	#[test]
	fn refresh_exhausted_mentions_attempts() {
		let err = Error::RefreshExhausted { attempts: 5 };

		assert!(err.to_string().contains("5 attempts"));
	}
}
