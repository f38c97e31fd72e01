//! Retry loop for transient service statuses.

// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	clock::Clock,
	http::{Request, Response},
	pipeline::{Next, Policy, PolicyFuture},
};

/// Boxed future returned by [`Sleep::sleep`].
pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Async timer used between retry attempts.
pub trait Sleep
where
	Self: Debug + Send + Sync,
{
	/// Resolves after `duration`.
	fn sleep(&self, duration: Duration) -> SleepFuture;
}

/// [`Sleep`] backed by the tokio timer.
#[cfg(feature = "reqwest")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleep;
#[cfg(feature = "reqwest")]
impl Sleep for TokioSleep {
	fn sleep(&self, duration: Duration) -> SleepFuture {
		Box::pin(tokio::time::sleep(duration.unsigned_abs()))
	}
}

/// Backoff growth between attempts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RetryMode {
	/// Same delay before every retry.
	Fixed,
	/// Delay doubles per retry, jittered by ±20% and capped at `max_delay`.
	#[default]
	Exponential,
}

/// Retry settings shared by every client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryOptions {
	/// Retries after the first attempt; `0` disables retrying.
	pub max_retries: u32,
	/// Base delay.
	pub delay: Duration,
	/// Upper bound for computed delays.
	pub max_delay: Duration,
	/// Backoff growth.
	pub mode: RetryMode,
	/// Per-request timeout applied by the default transport.
	pub network_timeout: Duration,
}
impl RetryOptions {
	/// Default retry count.
	pub const DEFAULT_MAX_RETRIES: u32 = 3;
	/// Default base delay (0.8 seconds).
	pub const DEFAULT_DELAY: Duration = Duration::milliseconds(800);
	/// Default delay cap (60 seconds).
	pub const DEFAULT_MAX_DELAY: Duration = Duration::seconds(60);
	/// Default network timeout (100 seconds).
	pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::seconds(100);

	/// Overrides the retry count.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the base delay.
	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = delay;

		self
	}

	/// Overrides the delay cap.
	pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
		self.max_delay = max_delay;

		self
	}

	/// Overrides the backoff mode.
	pub fn with_mode(mut self, mode: RetryMode) -> Self {
		self.mode = mode;

		self
	}

	/// Overrides the network timeout.
	pub fn with_network_timeout(mut self, timeout: Duration) -> Self {
		self.network_timeout = timeout;

		self
	}

	/// Delay before retry number `retry` (1-based), before jitter.
	pub fn base_delay(&self, retry: u32) -> Duration {
		let delay = match self.mode {
			RetryMode::Fixed => self.delay,
			RetryMode::Exponential =>
				self.delay.saturating_mul(2_i32.saturating_pow(retry.saturating_sub(1))),
		};

		delay.min(self.max_delay)
	}
}
impl Default for RetryOptions {
	fn default() -> Self {
		Self {
			max_retries: Self::DEFAULT_MAX_RETRIES,
			delay: Self::DEFAULT_DELAY,
			max_delay: Self::DEFAULT_MAX_DELAY,
			mode: RetryMode::default(),
			network_timeout: Self::DEFAULT_NETWORK_TIMEOUT,
		}
	}
}

/// Replays the inner chain on `408`, `429`, `500`, `502`, `503`, and `504`.
///
/// A `Retry-After` header replaces the computed delay but is still capped at `max_delay`.
/// Transport errors are returned to the caller untouched.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
	options: RetryOptions,
	sleep: Arc<dyn Sleep>,
	clock: Arc<dyn Clock>,
}
impl RetryPolicy {
	/// Statuses considered transient.
	pub const RETRIABLE_STATUSES: [StatusCode; 6] = [
		StatusCode::REQUEST_TIMEOUT,
		StatusCode::TOO_MANY_REQUESTS,
		StatusCode::INTERNAL_SERVER_ERROR,
		StatusCode::BAD_GATEWAY,
		StatusCode::SERVICE_UNAVAILABLE,
		StatusCode::GATEWAY_TIMEOUT,
	];

	/// Creates a retry policy.
	pub fn new(options: RetryOptions, sleep: Arc<dyn Sleep>, clock: Arc<dyn Clock>) -> Self {
		Self { options, sleep, clock }
	}

	/// Active options.
	pub fn options(&self) -> &RetryOptions {
		&self.options
	}

	/// Returns `true` for the statuses in [`RetryPolicy::RETRIABLE_STATUSES`].
	pub fn is_retriable(status: StatusCode) -> bool {
		Self::RETRIABLE_STATUSES.contains(&status)
	}

	fn delay_for(&self, response: &Response, retry: u32) -> Duration {
		if let Some(hint) = response.retry_after(self.clock.now()) {
			return hint.min(self.options.max_delay);
		}

		let base = self.options.base_delay(retry);

		match self.options.mode {
			RetryMode::Fixed => base,
			RetryMode::Exponential =>
				(base * rand::rng().random_range(0.8_f64..1.2)).min(self.options.max_delay),
		}
	}
}
impl Policy for RetryPolicy {
	fn name(&self) -> &'static str {
		"retry"
	}

	fn process<'a>(&'a self, request: Request, next: Next<'a>) -> PolicyFuture<'a> {
		Box::pin(async move {
			let mut retry = 0;

			loop {
				let response = next.run(request.clone()).await?;

				if retry >= self.options.max_retries || !Self::is_retriable(response.status) {
					return Ok(response);
				}

				retry += 1;

				let delay = self.delay_for(&response, retry);

				#[cfg(feature = "tracing")]
				tracing::debug!(
					status = response.status.as_u16(),
					retry,
					delay_ms = delay.whole_milliseconds() as u64,
					"Retrying transient response."
				);

				self.sleep.sleep(delay).await;
			}
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use ::http::header::{HeaderValue, RETRY_AFTER};
	// self
	use super::*;
	use crate::{
		_preludet::{
			RecordingSleep, RecordingTransport, ScriptedCredential, TEST_ACCESS_KEY, test_clock,
		},
		auth::TokenRequestContext,
		cache::TokenCache,
		clock::ManualClock,
		credential::KeyCredential,
		pipeline::{BearerTokenAuthenticationPolicy, HmacAuthenticationPolicy, Pipeline},
	};

	fn pipeline(
		transport: Arc<RecordingTransport>,
		options: RetryOptions,
	) -> (Pipeline, Arc<RecordingSleep>) {
		let sleeps = Arc::new(RecordingSleep::default());
		let retry = RetryPolicy::new(options, sleeps.clone(), test_clock());

		(Pipeline::builder(transport).with_retry(retry).build(), sleeps)
	}

	fn authenticated_pipeline(
		transport: Arc<RecordingTransport>,
		options: RetryOptions,
		clock: Arc<ManualClock>,
		auth: Arc<dyn Policy>,
	) -> Pipeline {
		let retry =
			RetryPolicy::new(options, Arc::new(RecordingSleep::advancing(clock.clone())), clock);

		Pipeline::builder(transport).with_retry(retry).with_auth(auth).build()
	}

	fn request() -> Request {
		Request::new(
			Method::POST,
			Url::parse("https://contoso.example/identities").expect("URL fixture should parse."),
		)
	}

	#[test]
	fn exponential_delays_double_and_cap() {
		let options = RetryOptions::default().with_max_delay(Duration::seconds(2));

		assert_eq!(options.base_delay(1), Duration::milliseconds(800));
		assert_eq!(options.base_delay(2), Duration::milliseconds(1_600));
		assert_eq!(options.base_delay(3), Duration::seconds(2));
		assert_eq!(options.base_delay(40), Duration::seconds(2));
		assert_eq!(
			options.with_mode(RetryMode::Fixed).base_delay(3),
			Duration::milliseconds(800)
		);
	}

	#[tokio::test]
	async fn retries_transient_statuses_until_success() {
		let transport = Arc::new(RecordingTransport::default());

		transport.respond(503, "");
		transport.respond(429, "");
		transport.respond(201, "{}");

		let (pipeline, sleeps) =
			pipeline(transport.clone(), RetryOptions::default().with_mode(RetryMode::Fixed));
		let response = pipeline.send(request()).await.expect("Third attempt should succeed.");

		assert_eq!(response.status, StatusCode::CREATED);
		assert_eq!(transport.requests().len(), 3);
		assert_eq!(sleeps.sleeps(), [Duration::milliseconds(800), Duration::milliseconds(800)]);
	}

	#[tokio::test]
	async fn gives_up_after_max_retries() {
		let transport = Arc::new(RecordingTransport::default());

		for _ in 0..4 {
			transport.respond(500, "");
		}

		let (pipeline, _) = pipeline(transport.clone(), RetryOptions::default().with_max_retries(2));
		let err = pipeline.send(request()).await.expect_err("Persistent 500 should fail.");

		assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
		assert_eq!(transport.requests().len(), 3);
	}

	#[tokio::test]
	async fn client_errors_are_not_retried() {
		let transport = Arc::new(RecordingTransport::default());

		transport.respond(400, "");

		let (pipeline, sleeps) = pipeline(transport.clone(), RetryOptions::default());

		assert!(pipeline.send(request()).await.is_err());
		assert_eq!(transport.requests().len(), 1);
		assert!(sleeps.sleeps().is_empty());
	}

	#[tokio::test]
	async fn exponential_delays_stay_within_jitter_bounds() {
		let transport = Arc::new(RecordingTransport::default());

		transport.respond(502, "");
		transport.respond(502, "");

		let (pipeline, sleeps) = pipeline(transport.clone(), RetryOptions::default());

		pipeline.send(request()).await.expect("Third attempt should succeed.");

		let sleeps = sleeps.sleeps();

		assert!((Duration::milliseconds(640)..=Duration::milliseconds(960)).contains(&sleeps[0]));
		assert!((Duration::milliseconds(1_280)..=Duration::milliseconds(1_920)).contains(&sleeps[1]));
	}

	#[tokio::test]
	async fn retry_after_hints_are_capped_at_max_delay() {
		let transport = Arc::new(RecordingTransport::default());
		let mut throttled = Response::new(StatusCode::TOO_MANY_REQUESTS, Vec::new());

		throttled.headers.insert(RETRY_AFTER, HeaderValue::from_static("18446744073709551615"));
		transport.respond_with(throttled);

		let mut short = Response::new(StatusCode::SERVICE_UNAVAILABLE, Vec::new());

		short.headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
		transport.respond_with(short);

		let (pipeline, sleeps) = pipeline(
			transport.clone(),
			RetryOptions::default().with_max_delay(Duration::seconds(10)),
		);

		pipeline.send(request()).await.expect("Third attempt should succeed.");

		assert_eq!(sleeps.sleeps(), [Duration::seconds(10), Duration::seconds(3)]);
	}

	#[tokio::test]
	async fn every_attempt_is_signed_again() {
		let clock = test_clock();
		let key = KeyCredential::from_base64(TEST_ACCESS_KEY).expect("Fixture key should decode.");
		let transport = Arc::new(RecordingTransport::default());

		transport.respond(503, "");

		let pipeline = authenticated_pipeline(
			transport.clone(),
			RetryOptions::default().with_mode(RetryMode::Fixed).with_delay(Duration::seconds(2)),
			clock.clone(),
			Arc::new(HmacAuthenticationPolicy::new(key, clock)),
		);

		pipeline.send(request()).await.expect("Retried request should succeed.");

		let requests = transport.requests();

		assert_eq!(requests.len(), 2);
		assert_eq!(requests[0].headers.get("x-ms-date"), Some("Mon, 02 Jan 2023 03:04:05 GMT"));
		assert_eq!(requests[1].headers.get("x-ms-date"), Some("Mon, 02 Jan 2023 03:04:07 GMT"));
		assert_ne!(
			requests[0].headers.get("authorization"),
			requests[1].headers.get("authorization")
		);
	}

	#[tokio::test]
	async fn retries_pick_up_a_refreshed_bearer_token() {
		let clock = test_clock();
		let credential = Arc::new(ScriptedCredential::new(clock.clone(), Duration::minutes(6)));
		let cache = Arc::new(TokenCache::new(credential.clone()).with_clock(clock.clone()));
		let transport = Arc::new(RecordingTransport::default());

		transport.respond(503, "");

		let pipeline = authenticated_pipeline(
			transport.clone(),
			RetryOptions::default()
				.with_mode(RetryMode::Fixed)
				.with_delay(Duration::minutes(2))
				.with_max_delay(Duration::minutes(5)),
			clock,
			Arc::new(BearerTokenAuthenticationPolicy::new(cache, TokenRequestContext::default())),
		);

		pipeline.send(request()).await.expect("Retried request should succeed.");

		let requests = transport.requests();

		// The delay moves the token into its refresh window before the second attempt.
		assert_eq!(requests[0].headers.get("authorization"), Some("Bearer token-1"));
		assert_eq!(requests[1].headers.get("authorization"), Some("Bearer token-2"));
		assert_eq!(credential.calls(), 2);
	}
}
