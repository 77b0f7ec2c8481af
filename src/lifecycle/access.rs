//! Access checks, signed resource calls, and credential release.

// self
use crate::{
	_prelude::*,
	adapter::{AccessRequest, HttpMethod, InvokeOptions},
	auth::{Params, ServiceName},
	lifecycle::{
		ACCESS_REFRESH_THRESHOLD, RefreshPolicy, ServiceContext, TokenLifecycleManager, lock_error,
	},
	obs::{self, OperationKind},
	store::{LockHolder, ReadOptions, WriteOptions},
};

impl TokenLifecycleManager {
	/// Returns true when `service` holds an authorized credential covering `request`.
	///
	/// Credentials close to expiry are renewed first. Any failure along the way (no record,
	/// failed renewal, contention) is logged and reported as `false`.
	pub async fn has_access(&self, service: &ServiceName, request: &Params) -> bool {
		let checked = self
			.observe(OperationKind::HasAccess, "has_access", service, async {
				let (ctx, record) =
					self.settle(service, RefreshPolicy::Within(ACCESS_REFRESH_THRESHOLD)).await?;

				Ok(ctx.adapter.has_access(&ctx.config, &record.token, request))
			})
			.await;

		match checked {
			Ok(granted) => granted,
			Err(e) => {
				obs::access_denied(service, &e);

				false
			},
		}
	}

	/// Issues a signed call to `path` (absolute, or relative to the service's `base`) and
	/// returns the response body.
	///
	/// The credential is renewed first when it is close to expiry.
	pub async fn invoke(
		&self,
		service: &ServiceName,
		method: HttpMethod,
		path: &str,
		data: Params,
		options: InvokeOptions,
	) -> Result<String> {
		self.observe(OperationKind::Invoke, method.as_str(), service, async {
			let (ctx, record) =
				self.settle(service, RefreshPolicy::Within(ACCESS_REFRESH_THRESHOLD)).await?;
			let request = AccessRequest { method, path: path.to_owned(), data, options };

			ctx.adapter.access(&ctx.config, &record.token, request).await
		})
		.await
	}

	/// Signed `GET`; `data` travels in the query string.
	pub async fn get(&self, service: &ServiceName, path: &str, data: Params) -> Result<String> {
		self.invoke(service, HttpMethod::Get, path, data, InvokeOptions::default()).await
	}

	/// Signed `POST`; `data` travels as a form body.
	pub async fn post(&self, service: &ServiceName, path: &str, data: Params) -> Result<String> {
		self.invoke(service, HttpMethod::Post, path, data, InvokeOptions::default()).await
	}

	/// Signed `PUT`; `data` travels as a form body.
	pub async fn put(&self, service: &ServiceName, path: &str, data: Params) -> Result<String> {
		self.invoke(service, HttpMethod::Put, path, data, InvokeOptions::default()).await
	}

	/// Signed `DELETE`; `data` travels in the query string.
	pub async fn delete(&self, service: &ServiceName, path: &str, data: Params) -> Result<String> {
		self.invoke(service, HttpMethod::Delete, path, data, InvokeOptions::default()).await
	}

	/// Releases the durable credential of `service`.
	///
	/// The record is marked released before the adapter is asked to revoke the token, so a
	/// failed revocation never leaves a usable credential behind. Releasing a missing or
	/// already released credential succeeds without contacting the provider.
	pub async fn release(&self, service: &ServiceName) -> Result<()> {
		self.observe(OperationKind::Release, "release", service, async {
			let ServiceContext { config, adapter, durable } = self.context(service)?;
			let holder = LockHolder::next();
			let stored = self
				.store
				.read(&config.token_cache, &durable, holder, ReadOptions::block())
				.await
				.map_err(lock_error)?;
			let Some(mut record) = stored.filter(|record| record.authorized) else {
				self.store.unblock(&config.token_cache, &durable, holder).await?;

				return Ok(());
			};
			let token = record.token.clone();

			record.release();
			self.store
				.write(&config.token_cache, &durable, holder, record, None, WriteOptions::locked())
				.await?;

			adapter.release(&config, &token).await
		})
		.await
	}
}
