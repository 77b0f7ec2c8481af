//! Persisted token records and their lifecycle helpers.

// std
use std::borrow::Cow;
// self
use crate::{
	_prelude::*,
	auth::token::secret::TokenFields,
	error::{ConfigError, TransportError},
	store::StoreError,
};

/// Flat string map used for caller request context and provider callback data.
pub type Params = BTreeMap<String, String>;

/// Lifecycle status derived from a [`TokenRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Authorization was requested and is waiting for the provider callback.
	Pending,
	/// Credentials are usable.
	Authorized,
	/// Verification or renewal failed; the error message is kept on the record.
	Unauthorized,
	/// Credentials were released by the caller.
	Released,
}

/// Unit persisted in the token store for both in-flight and durable credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Protocol-specific credential fields, interpreted only by the signing adapter.
	pub token: TokenFields,
	/// Caller-supplied context echoed back after verification (e.g. a return URL).
	pub request: Params,
	/// Raw provider callback data, present once verification ran.
	pub response: Option<Params>,
	/// Whether the credentials are currently usable.
	pub authorized: bool,
	/// Last failure, if any.
	pub error: Option<StoredError>,
}
impl TokenRecord {
	/// Creates a pending record carrying the caller's request context.
	pub fn pending(request: Params) -> Self {
		Self { request, ..Default::default() }
	}

	/// Replaces the credential fields.
	pub fn with_token(mut self, token: TokenFields) -> Self {
		self.token = token;

		self
	}

	/// Computes the lifecycle status.
	pub fn status(&self) -> TokenStatus {
		if self.authorized {
			return TokenStatus::Authorized;
		}
		if self.error.is_some() {
			return TokenStatus::Unauthorized;
		}
		if self.response.is_some() {
			return TokenStatus::Released;
		}

		TokenStatus::Pending
	}

	/// Marks the record authorized with freshly issued credentials.
	pub fn authorize(&mut self, token: TokenFields) {
		self.token = token;
		self.authorized = true;
		self.error = None;
	}

	/// Marks the record unauthorized, remembering the failure.
	pub fn fail(&mut self, error: &Error) {
		self.authorized = false;
		self.error = Some(StoredError::from(error));
	}

	/// Marks the record released. Credential fields stay for inspection.
	pub fn release(&mut self) {
		self.authorized = false;
		self.error = None;
		self.response.get_or_insert_with(Params::new);
	}

	/// Converts a non-authorized record into the error callers should see.
	///
	/// A stored failure is rebuilt with its original category; a record without one reports
	/// [`Error::MissingCredentials`].
	pub fn unauthorized_error(&self) -> Error {
		self.error.as_ref().map_or(Error::MissingCredentials, StoredError::to_error)
	}
}

/// Serializable form of an [`Error`] kept on an unauthorized record.
///
/// Provider and protocol failures round-trip to the same [`Error`] variant. Configuration and
/// transport failures keep their category and rendered message; their sources are not
/// serializable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredError {
	/// See [`Error::MissingCredentials`].
	MissingCredentials,
	/// See [`Error::Expired`].
	Expired,
	/// See [`Error::MismatchedToken`].
	MismatchedToken,
	/// See [`Error::UnknownRequest`].
	UnknownRequest,
	/// See [`Error::Remote`].
	Remote {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Problem description.
		detail: String,
	},
	/// See [`Error::RefreshExhausted`].
	RefreshExhausted {
		/// Attempts made.
		attempts: u32,
	},
	/// See [`Error::LockUnavailable`].
	LockUnavailable {
		/// Contended key.
		key: String,
	},
	/// See [`Error::NotImplemented`].
	NotImplemented {
		/// Adapter label.
		adapter: String,
		/// Operation label.
		operation: String,
	},
	/// See [`Error::Storage`].
	Storage {
		/// Original storage error.
		error: StoreError,
	},
	/// See [`Error::Config`].
	Config {
		/// Rendered configuration error.
		message: String,
	},
	/// See [`Error::Transport`].
	Transport {
		/// Rendered transport error including its source.
		message: String,
	},
}
impl StoredError {
	/// Rebuilds the crate error this value was recorded from.
	pub fn to_error(&self) -> Error {
		match self {
			Self::MissingCredentials => Error::MissingCredentials,
			Self::Expired => Error::Expired,
			Self::MismatchedToken => Error::MismatchedToken,
			Self::UnknownRequest => Error::UnknownRequest,
			Self::Remote { status, detail } => Error::remote(*status, detail.clone()),
			Self::RefreshExhausted { attempts } => Error::RefreshExhausted { attempts: *attempts },
			Self::LockUnavailable { key } => Error::LockUnavailable { key: key.clone() },
			Self::NotImplemented { adapter, operation } => Error::NotImplemented {
				adapter: Cow::Owned(adapter.clone()),
				operation: Cow::Owned(operation.clone()),
			},
			Self::Storage { error } => Error::Storage(error.clone()),
			Self::Config { message } => ConfigError::Recorded { message: message.clone() }.into(),
			Self::Transport { message } =>
				TransportError::Network { source: message.clone().into() }.into(),
		}
	}
}
impl From<&Error> for StoredError {
	fn from(error: &Error) -> Self {
		match error {
			Error::MissingCredentials => Self::MissingCredentials,
			Error::Expired => Self::Expired,
			Error::MismatchedToken => Self::MismatchedToken,
			Error::UnknownRequest => Self::UnknownRequest,
			Error::Remote { status, detail } =>
				Self::Remote { status: *status, detail: detail.clone() },
			Error::RefreshExhausted { attempts } => Self::RefreshExhausted { attempts: *attempts },
			Error::LockUnavailable { key } => Self::LockUnavailable { key: key.clone() },
			Error::NotImplemented { adapter, operation } => Self::NotImplemented {
				adapter: adapter.to_string(),
				operation: operation.to_string(),
			},
			Error::Storage(error) => Self::Storage { error: error.clone() },
			Error::Config(ConfigError::Recorded { message }) =>
				Self::Config { message: message.clone() },
			Error::Config(error) => Self::Config { message: error.to_string() },
			Error::Transport(error) => Self::Transport { message: render_chain(error) },
		}
	}
}
impl Display for StoredError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.to_error(), f)
	}
}

fn render_chain(error: &dyn StdError) -> String {
	let mut rendered = error.to_string();
	let mut source = error.source();

	while let Some(inner) = source {
		rendered.push_str(&format!(": {inner}"));
		source = inner.source();
	}

	rendered
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn request() -> Params {
		Params::from([("nonce".to_owned(), "n1".to_owned())])
	}

	#[test]
	fn status_transitions_cover_all_states() {
		let mut record = TokenRecord::pending(request());

		assert_eq!(record.status(), TokenStatus::Pending);

		record.authorize([("oauth_token", "t")].into_iter().collect());

		assert_eq!(record.status(), TokenStatus::Authorized);

		record.fail(&Error::Expired);

		assert_eq!(record.status(), TokenStatus::Unauthorized);
		assert_eq!(record.error, Some(StoredError::Expired));

		record.authorize(TokenFields::new());
		record.release();

		assert_eq!(record.status(), TokenStatus::Released);
		assert_eq!(record.request, request());
	}

	#[test]
	fn unauthorized_error_rebuilds_the_stored_category() {
		let mut record = TokenRecord::pending(Params::new());

		assert!(matches!(record.unauthorized_error(), Error::MissingCredentials));

		record.fail(&Error::remote(Some(401), "token_rejected"));

		assert!(matches!(
			record.unauthorized_error(),
			Error::Remote { status: Some(401), detail } if detail == "token_rejected"
		));

		record.fail(&Error::MismatchedToken);

		assert!(matches!(record.unauthorized_error(), Error::MismatchedToken));

		record.fail(&Error::NotImplemented {
			adapter: "oauth2".into(),
			operation: "refresh".into(),
		});

		assert!(matches!(
			record.unauthorized_error(),
			Error::NotImplemented { operation, .. } if operation == "refresh"
		));
	}

	#[test]
	fn stored_errors_survive_serialization() {
		let mut record = TokenRecord::pending(Params::new());

		record.fail(&Error::Expired);

		let json = serde_json::to_string(&record).expect("Record should serialize.");

		assert!(json.contains(r#""error":{"kind":"expired"}"#));

		let decoded: TokenRecord = serde_json::from_str(&json).expect("Record should deserialize.");

		assert!(matches!(decoded.unauthorized_error(), Error::Expired));

		let transport =
			Error::from(TransportError::network(std::io::Error::other("connection reset")));

		record.fail(&transport);

		let rebuilt = record.unauthorized_error();

		assert!(matches!(rebuilt, Error::Transport(TransportError::Network { .. })));
		assert_eq!(
			record.error.map(|error| error.to_string()),
			Some("Network error occurred while calling the provider.".to_owned())
		);
	}
}
