//! Contention-safe token renewal.
//!
//! Renewal is a read-modify-write on the durable record. The manager reads the record, decides
//! whether it is stale, and only then tries to take the record's lock without waiting. The
//! winner re-reads under the lock (another caller may have renewed in the meantime), asks the
//! adapter for fresh credentials, and releases the lock with the final write. Losers wait for
//! the winner's lock to clear, re-read, and adopt the renewed token when it is no longer stale.
//! Each caller gives up after [`MAX_REFRESH_ATTEMPTS`] rounds, so permanent contention surfaces
//! as [`Error::RefreshExhausted`] instead of a livelock.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{ServiceName, TokenFields, TokenRecord},
	lifecycle::{ServiceContext, TokenLifecycleManager},
	obs::{self, OperationKind},
	store::{LockHolder, ReadOptions, StoreError, WriteOptions},
};

/// Rounds a caller spends on one renewal before giving up.
pub const MAX_REFRESH_ATTEMPTS: u32 = 5;
/// Tokens expiring within this window are renewed before use.
pub const ACCESS_REFRESH_THRESHOLD: Duration = Duration::minutes(5);

/// When a stored token counts as stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPolicy {
	/// Renew when the token expires within the given window (zero means "already expired").
	Within(Duration),
	/// Renew unless another caller replaced the token since it was first read.
	Force,
}

impl TokenLifecycleManager {
	/// Renews the durable credential of `service` regardless of its remaining lifetime.
	///
	/// Tokens without an expiry are left untouched. Concurrent forced renewals of the same
	/// token collapse into a single provider call.
	pub async fn refresh(&self, service: &ServiceName) -> Result<()> {
		self.observe(
			OperationKind::Refresh,
			"refresh",
			service,
			self.settle(service, RefreshPolicy::Force),
		)
		.await
		.map(|_| ())
	}

	/// Loads the authorized durable record of `service`, renewing it first when `policy` says it
	/// is stale.
	pub(crate) async fn settle(
		&self,
		service: &ServiceName,
		policy: RefreshPolicy,
	) -> Result<(ServiceContext, TokenRecord)> {
		let ctx = self.context(service)?;
		let holder = LockHolder::next();
		let record = self.authorized_record(&ctx, holder).await?;

		if !is_stale(&ctx, &record, &record.token, policy) {
			return Ok((ctx, record));
		}

		let original = record.token.clone();
		let renewed = self.renew(&ctx, holder, record, &original, policy).await;

		match &renewed {
			Ok(_) => self.refresh_metrics.record_success(),
			Err(_) => self.refresh_metrics.record_failure(),
		}

		renewed.map(|record| (ctx, record))
	}

	async fn renew(
		&self,
		ctx: &ServiceContext,
		holder: LockHolder,
		mut record: TokenRecord,
		original: &TokenFields,
		policy: RefreshPolicy,
	) -> Result<TokenRecord> {
		let namespace = ctx.config.token_cache.as_str();
		let mut attempts = 0;

		while is_stale(ctx, &record, original, policy) {
			if attempts == MAX_REFRESH_ATTEMPTS {
				return Err(Error::RefreshExhausted { attempts });
			}

			attempts += 1;
			self.refresh_metrics.record_attempt();

			match self.store.read(namespace, &ctx.durable, holder, ReadOptions::try_block()).await {
				Ok(current) => return self.renew_locked(ctx, holder, current, original, policy).await,
				// Someone else is renewing; a plain read waits for their lock to clear.
				Err(StoreError::LockUnavailable { .. }) =>
					record = self.authorized_record(ctx, holder).await?,
				Err(e) => return Err(e.into()),
			}
		}

		Ok(record)
	}

	// Runs with the durable lock held by `holder`; every path releases it.
	async fn renew_locked(
		&self,
		ctx: &ServiceContext,
		holder: LockHolder,
		current: Option<TokenRecord>,
		original: &TokenFields,
		policy: RefreshPolicy,
	) -> Result<TokenRecord> {
		let namespace = ctx.config.token_cache.as_str();
		let mut current = match current {
			Some(record) if record.authorized => record,
			other => {
				self.store.unblock(namespace, &ctx.durable, holder).await?;

				return Err(other.map_or(Error::MissingCredentials, |r| r.unauthorized_error()));
			},
		};

		if !is_stale(ctx, &current, original, policy) {
			self.store.unblock(namespace, &ctx.durable, holder).await?;

			return Ok(current);
		}

		self.refresh_metrics.record_provider_call();

		match ctx.adapter.refresh(&ctx.config, &current.token).await {
			Ok(token) => {
				current.authorize(token);
				self.store
					.write(
						namespace,
						&ctx.durable,
						holder,
						current.clone(),
						None,
						WriteOptions::locked(),
					)
					.await?;
				obs::token_refreshed(
					&ctx.config.service,
					&self.environment,
					ctx.adapter.expires(&ctx.config, &current.token),
				);

				Ok(current)
			},
			Err(e) => {
				current.fail(&e);
				self.store
					.write(namespace, &ctx.durable, holder, current, None, WriteOptions::locked())
					.await?;

				Err(e)
			},
		}
	}

	async fn authorized_record(
		&self,
		ctx: &ServiceContext,
		holder: LockHolder,
	) -> Result<TokenRecord> {
		match self
			.store
			.read(&ctx.config.token_cache, &ctx.durable, holder, ReadOptions::default())
			.await?
		{
			Some(record) if record.authorized => Ok(record),
			Some(record) => Err(record.unauthorized_error()),
			None => Err(Error::MissingCredentials),
		}
	}
}

fn is_stale(
	ctx: &ServiceContext,
	record: &TokenRecord,
	original: &TokenFields,
	policy: RefreshPolicy,
) -> bool {
	let Some(expires_at) = ctx.adapter.expires(&ctx.config, &record.token) else {
		return false;
	};

	match policy {
		RefreshPolicy::Within(window) =>
			expires_within(OffsetDateTime::now_utc().unix_timestamp(), window, expires_at),
		RefreshPolicy::Force => record.token == *original,
	}
}

// A zero window means "already expired" and includes the expiry instant itself; a positive
// window only covers tokens expiring strictly before `now + window`.
fn expires_within(now: i64, window: Duration, expires_at: i64) -> bool {
	let seconds = window.whole_seconds();

	if seconds <= 0 { now >= expires_at } else { now.saturating_add(seconds) > expires_at }
}
