//! Authorization start and provider-callback verification.

// self
use crate::{
	_prelude::*,
	adapter::{AuthorizationRequest, AuthorizationStart},
	auth::{Params, ServiceName, TokenRecord},
	lifecycle::{ServiceContext, TokenLifecycleManager, lock_error},
	obs::OperationKind,
	store::{LockHolder, ReadOptions, WriteOptions},
};

/// Request and callback parameter carrying the caller-chosen correlation nonce.
pub const NONCE_PARAM: &str = "nonce";

/// Result of [`TokenLifecycleManager::verify_authorization`].
///
/// `request` echoes the context the caller passed to
/// [`request_authorization`](TokenLifecycleManager::request_authorization) (e.g. a return URL),
/// whenever the pending record was found.
#[derive(Debug)]
pub struct Verification {
	/// Original request context, if the pending record exists.
	pub request: Option<Params>,
	/// Verification outcome.
	pub outcome: Result<()>,
}
impl Verification {
	/// Returns true when the durable credential is now authorized.
	pub fn is_verified(&self) -> bool {
		self.outcome.is_ok()
	}

	/// Converts into the echoed request context, surfacing the failure if there was one.
	pub fn into_result(self) -> Result<Params> {
		self.outcome.map(|_| self.request.unwrap_or_default())
	}
}

impl TokenLifecycleManager {
	/// Starts an authorization for `service`.
	///
	/// `request` is the caller's context; its `nonce` entry (empty if absent) names the temp
	/// record the provider callback will be matched against, `callback` overrides the
	/// out-of-band callback, and `scope` narrows the grant. The temp record is persisted whether
	/// or not the adapter succeeded, so a failed start is observable until the temp TTL lapses.
	/// Services without a user authorization step are authorized immediately and return
	/// [`AuthorizationStart::Granted`].
	pub async fn request_authorization(
		&self,
		service: &ServiceName,
		request: Params,
	) -> Result<AuthorizationStart> {
		self.observe(
			OperationKind::RequestAuthorization,
			"request_authorization",
			service,
			self.start_authorization(service, request),
		)
		.await
	}

	/// Completes an authorization from the provider callback parameters.
	///
	/// The callback's `nonce` locates the temp record written by
	/// [`request_authorization`](Self::request_authorization). Replaying the exact callback of
	/// an already verified request succeeds again without contacting the provider; any other
	/// callback for it fails with [`Error::UnknownRequest`].
	pub async fn verify_authorization(
		&self,
		service: &ServiceName,
		response: Params,
	) -> Verification {
		let mut request = None;
		let outcome = self
			.observe(
				OperationKind::VerifyAuthorization,
				"verify_authorization",
				service,
				self.complete_authorization(service, response, &mut request),
			)
			.await;

		Verification { request, outcome }
	}

	async fn start_authorization(
		&self,
		service: &ServiceName,
		request: Params,
	) -> Result<AuthorizationStart> {
		let ServiceContext { config, adapter, durable } = self.context(service)?;
		let nonce = request.get(NONCE_PARAM).cloned().unwrap_or_default();
		let temp = self.temp_key(service, &nonce);
		let holder = LockHolder::next();
		let outcome = adapter.request(&config, &request).await;
		let mut record = TokenRecord::pending(request);

		match outcome {
			Ok(AuthorizationRequest { token, start }) => {
				match start {
					AuthorizationStart::Granted => record.authorize(token),
					AuthorizationStart::Redirect(_) => record.token = token,
				}

				self.store
					.write(
						&config.temp_cache,
						&temp,
						holder,
						record.clone(),
						Some(config.temp_ttl),
						WriteOptions::locked(),
					)
					.await?;

				if record.authorized {
					self.store
						.write(
							&config.token_cache,
							&durable,
							holder,
							record,
							None,
							WriteOptions::locked(),
						)
						.await?;
				}

				Ok(start)
			},
			Err(e) => {
				record.fail(&e);
				self.store
					.write(
						&config.temp_cache,
						&temp,
						holder,
						record,
						Some(config.temp_ttl),
						WriteOptions::locked(),
					)
					.await?;

				Err(e)
			},
		}
	}

	async fn complete_authorization(
		&self,
		service: &ServiceName,
		response: Params,
		request: &mut Option<Params>,
	) -> Result<()> {
		let ServiceContext { config, adapter, durable } = self.context(service)?;
		let nonce = response.get(NONCE_PARAM).cloned().unwrap_or_default();
		let temp = self.temp_key(service, &nonce);
		let holder = LockHolder::next();
		let Some(mut record) = self
			.store
			.read(&config.temp_cache, &temp, holder, ReadOptions::block())
			.await
			.map_err(lock_error)?
		else {
			self.store.unblock(&config.temp_cache, &temp, holder).await?;

			return Err(Error::UnknownRequest);
		};

		*request = Some(record.request.clone());

		if record.authorized {
			self.store.unblock(&config.temp_cache, &temp, holder).await?;

			return if record.response.as_ref() == Some(&response) {
				Ok(())
			} else {
				Err(Error::UnknownRequest)
			};
		}

		let verified = adapter.verify(&config, &record, &response).await;

		record.response = Some(response);

		match verified {
			Ok(token) => {
				record.authorize(token);
				self.store
					.write(
						&config.temp_cache,
						&temp,
						holder,
						record.clone(),
						Some(config.temp_ttl),
						WriteOptions::locked(),
					)
					.await?;
				self.store
					.write(
						&config.token_cache,
						&durable,
						holder,
						record,
						None,
						WriteOptions::locked(),
					)
					.await?;

				Ok(())
			},
			Err(e) => {
				record.fail(&e);
				self.store
					.write(
						&config.temp_cache,
						&temp,
						holder,
						record,
						Some(config.temp_ttl),
						WriteOptions::locked(),
					)
					.await?;

				Err(e)
			},
		}
	}
}
