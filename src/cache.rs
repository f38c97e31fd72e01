//! Bearer token cache with per-scope-set single-flight refresh.
//!
//! Each scope set owns one entry holding the last good token, the in-flight fetch (if any), and
//! the last refresh failure. Fresh tokens are served under a read lock. Otherwise the first caller
//! installs a shared fetch future and every concurrent caller awaits that same future, so the
//! credential is never called twice at once for one scope set. A failed fetch is remembered for
//! `retry_delay`; during that window callers get the previous token while it has not expired, or
//! the remembered error.

mod metrics;

pub use metrics::CacheMetrics;

// std
use std::{pin::pin, sync::Weak};
// crates.io
use futures::{
	FutureExt,
	future::{self, BoxFuture, Either, Shared},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenRequestContext},
	clock::{Clock, SystemClock},
	credential::TokenCredential,
	obs::{self, OperationKind},
};

type SharedFetch = Shared<BoxFuture<'static, Result<AccessToken, Arc<Error>>>>;

/// Refresh timing knobs for [`TokenCache`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenCacheOptions {
	/// How long before expiry a token is considered stale.
	pub refresh_offset: Duration,
	/// Minimum wait after a failed fetch before another fetch may start.
	pub retry_delay: Duration,
}
impl TokenCacheOptions {
	/// Default refresh offset (5 minutes).
	pub const DEFAULT_REFRESH_OFFSET: Duration = Duration::minutes(5);
	/// Default retry delay after a failed fetch (30 seconds).
	pub const DEFAULT_RETRY_DELAY: Duration = Duration::seconds(30);

	/// Overrides the refresh offset.
	pub fn with_refresh_offset(mut self, offset: Duration) -> Self {
		self.refresh_offset = offset;

		self
	}

	/// Overrides the retry delay.
	pub fn with_retry_delay(mut self, delay: Duration) -> Self {
		self.retry_delay = delay;

		self
	}
}
impl Default for TokenCacheOptions {
	fn default() -> Self {
		Self {
			refresh_offset: Self::DEFAULT_REFRESH_OFFSET,
			retry_delay: Self::DEFAULT_RETRY_DELAY,
		}
	}
}

/// Caches tokens from a [`TokenCredential`] per scope set.
pub struct TokenCache {
	credential: Arc<dyn TokenCredential>,
	clock: Arc<dyn Clock>,
	options: TokenCacheOptions,
	entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
	metrics: Arc<CacheMetrics>,
}
impl TokenCache {
	/// Creates a cache over `credential` with default options and the system clock.
	pub fn new(credential: Arc<dyn TokenCredential>) -> Self {
		Self {
			credential,
			clock: Arc::new(SystemClock),
			options: TokenCacheOptions::default(),
			entries: Default::default(),
			metrics: Default::default(),
		}
	}

	/// Replaces the clock used for freshness checks.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Replaces the refresh timing options.
	pub fn with_options(mut self, options: TokenCacheOptions) -> Self {
		self.options = options;

		self
	}

	/// Active options.
	pub fn options(&self) -> &TokenCacheOptions {
		&self.options
	}

	/// Cache activity counters.
	pub fn metrics(&self) -> &CacheMetrics {
		&self.metrics
	}

	/// Returns a token for `context`, refreshing it when missing or stale.
	pub async fn get_token(&self, context: &TokenRequestContext) -> Result<AccessToken> {
		self.acquire(context, false, future::pending()).await
	}

	/// Like [`TokenCache::get_token`], but gives up with [`Error::Cancelled`] once `cancel`
	/// resolves.
	///
	/// Cancelling only abandons this caller's wait. The fetch stays owned by the cache and its
	/// result is stored when the next waiter drives it to completion.
	pub async fn get_token_until<C>(
		&self,
		context: &TokenRequestContext,
		cancel: C,
	) -> Result<AccessToken>
	where
		C: Future<Output = ()>,
	{
		self.acquire(context, false, cancel).await
	}

	/// Fetches a new token even if the cached one is fresh or a failure backoff is active.
	///
	/// Joins a fetch that is already in flight instead of starting a second one.
	pub async fn force_refresh(&self, context: &TokenRequestContext) -> Result<AccessToken> {
		self.acquire(context, true, future::pending()).await
	}

	/// Blocking variant of [`TokenCache::get_token`].
	///
	/// Drives the fetch on the current thread, so the credential must not depend on an async
	/// runtime being entered. Do not call from inside an async context.
	pub fn get_token_blocking(&self, context: &TokenRequestContext) -> Result<AccessToken> {
		futures::executor::block_on(self.get_token(context))
	}

	/// Returns the cached token for `context` without refreshing, if one exists.
	pub fn cached(&self, context: &TokenRequestContext) -> Option<AccessToken> {
		let entries = self.entries.read();

		entries.get(&context.cache_key()).and_then(|entry| entry.state.read().token.clone())
	}

	/// Drops every cached token and failure record.
	pub fn clear(&self) {
		self.entries.write().clear();
	}

	async fn acquire<C>(
		&self,
		context: &TokenRequestContext,
		force: bool,
		cancel: C,
	) -> Result<AccessToken>
	where
		C: Future<Output = ()>,
	{
		let entry = self.entry(&context.cache_key());

		if !force {
			let fresh = self.fresh(&entry.state.read());

			if let Some(token) = fresh {
				self.metrics.record_hit();

				return Ok(token);
			}
		}

		let fetch = {
			let mut state = entry.state.write();
			let now = self.clock.now();

			if !force {
				if let Some(token) = self.fresh(&state) {
					self.metrics.record_hit();

					return Ok(token);
				}
				if let Some(backoff) = self.backoff(&state, now) {
					return backoff;
				}
			}

			match state.in_flight.clone() {
				Some(fetch) => fetch,
				None => {
					let fetch = self.start_fetch(&entry, context);

					state.in_flight = Some(fetch.clone());

					fetch
				},
			}
		};
		let outcome = match future::select(fetch, pin!(cancel)).await {
			Either::Left((outcome, _)) => outcome,
			Either::Right(((), _)) => return Err(Error::Cancelled),
		};
		let now = self.clock.now();

		match outcome {
			Ok(token) if !token.is_expired_at(now) => Ok(token),
			Ok(token) => Err(Error::token_acquisition(Error::TokenExpired {
				expires_on: token.expires_on,
			})),
			Err(e) => {
				let previous = entry.state.read().token.clone().filter(|t| !t.is_expired_at(now));

				match previous {
					Some(token) if !force => {
						#[cfg(feature = "tracing")]
						tracing::warn!(
							error = %e,
							remaining = %token.remaining_at(now),
							"Token refresh failed; serving the previous token."
						);

						Ok(token)
					},
					_ => Err(Error::token_acquisition(e)),
				}
			},
		}
	}

	fn entry(&self, key: &str) -> Arc<CacheEntry> {
		if let Some(entry) = self.entries.read().get(key) {
			return entry.clone();
		}

		self.entries.write().entry(key.to_owned()).or_default().clone()
	}

	fn fresh(&self, state: &EntryState) -> Option<AccessToken> {
		let now = self.clock.now();

		state
			.token
			.as_ref()
			.filter(|token| !token.needs_refresh_at(now, self.options.refresh_offset))
			.cloned()
	}

	// Only consulted while no fetch is in flight; a running fetch always wins.
	fn backoff(&self, state: &EntryState, now: OffsetDateTime) -> Option<Result<AccessToken>> {
		let failure = state.last_failure.as_ref()?;
		let retry_at = failure.at.checked_add(self.options.retry_delay);

		if state.in_flight.is_some() || retry_at.is_some_and(|retry_at| now >= retry_at) {
			return None;
		}

		Some(match state.token.as_ref().filter(|token| !token.is_expired_at(now)) {
			Some(token) => Ok(token.clone()),
			None => Err(Error::token_acquisition(failure.error.clone())),
		})
	}

	fn start_fetch(&self, entry: &Arc<CacheEntry>, context: &TokenRequestContext) -> SharedFetch {
		let entry = Arc::downgrade(entry);
		let credential = self.credential.clone();
		let clock = self.clock.clone();
		let metrics = self.metrics.clone();
		let context = context.clone();

		async move {
			metrics.record_attempt();

			let outcome = obs::observe(OperationKind::TokenRefresh, "get_token", async {
				let token = credential.get_token(&context).await?;

				// An expired result is a failed refresh.
				if token.is_expired_at(clock.now()) {
					return Err(Error::TokenExpired { expires_on: token.expires_on });
				}

				Ok(token)
			})
			.await
			.map_err(Arc::new);

			match &outcome {
				Ok(_) => metrics.record_success(),
				Err(_) => metrics.record_failure(),
			}

			settle(&entry, &outcome, clock.now());

			outcome
		}
		.boxed()
		.shared()
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("clock", &self.clock)
			.field("options", &self.options)
			.field("entries", &self.entries.read().len())
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[derive(Default)]
struct CacheEntry {
	state: RwLock<EntryState>,
}

#[derive(Default)]
struct EntryState {
	token: Option<AccessToken>,
	in_flight: Option<SharedFetch>,
	last_failure: Option<RefreshFailure>,
}

struct RefreshFailure {
	at: OffsetDateTime,
	error: Arc<Error>,
}

fn settle(entry: &Weak<CacheEntry>, outcome: &Result<AccessToken, Arc<Error>>, now: OffsetDateTime) {
	// Entry was evicted by `clear`; nobody can observe the result.
	let Some(entry) = entry.upgrade() else {
		return;
	};
	let mut state = entry.state.write();

	state.in_flight = None;

	match outcome {
		Ok(token) => {
			state.token = Some(token.clone());
			state.last_failure = None;
		},
		Err(error) => state.last_failure = Some(RefreshFailure { at: now, error: error.clone() }),
	}
}
