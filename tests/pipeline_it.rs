// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use httpmock::prelude::*;
// self
use acs_client::{
	_preludet::*,
	client::ClientOptions,
	http::Request,
	identity::CommunicationIdentityClient,
	pipeline::{Next, Policy, PolicyFuture, PolicyPosition, RetryMode, RetryOptions},
};

struct AttemptCounter {
	name: &'static str,
	hits: AtomicUsize,
}
impl AttemptCounter {
	fn new(name: &'static str) -> Arc<Self> {
		Arc::new(Self { name, hits: AtomicUsize::new(0) })
	}

	fn hits(&self) -> usize {
		self.hits.load(Ordering::SeqCst)
	}
}
impl Policy for AttemptCounter {
	fn name(&self) -> &'static str {
		self.name
	}

	fn process<'a>(&'a self, request: Request, next: Next<'a>) -> PolicyFuture<'a> {
		self.hits.fetch_add(1, Ordering::SeqCst);

		next.run(request)
	}
}

struct Harness {
	client: CommunicationIdentityClient,
	sleeps: Arc<RecordingSleep>,
	per_call: Arc<AttemptCounter>,
	per_retry: Arc<AttemptCounter>,
}

fn harness(endpoint: &str) -> Harness {
	let sleeps = Arc::new(RecordingSleep::default());
	let per_call = AttemptCounter::new("per_call_counter");
	let per_retry = AttemptCounter::new("per_retry_counter");
	let options = ClientOptions::default()
		.with_clock(test_clock())
		.with_sleep(sleeps.clone())
		.with_retry(RetryOptions::default().with_max_retries(2).with_mode(RetryMode::Fixed))
		.add_policy(per_call.clone(), PolicyPosition::PerCall)
		.add_policy(per_retry.clone(), PolicyPosition::PerRetry);
	let client = CommunicationIdentityClient::from_connection_string(
		&format!("endpoint={endpoint};accesskey={TEST_ACCESS_KEY}"),
		options,
	)
	.expect("Identity client should build.");

	Harness { client, sleeps, per_call, per_retry }
}

#[tokio::test]
async fn retry_after_seconds_override_backoff() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/identities");
			then.status(503).header("retry-after", "7");
		})
		.await;
	let harness = harness(&server.base_url());
	let err = harness.client.create_user().await.expect_err("Persistent 503 should fail.");

	mock.assert_hits_async(3).await;

	assert_eq!(err.status().map(|status| status.as_u16()), Some(503));
	assert_eq!(harness.sleeps.sleeps(), [Duration::seconds(7), Duration::seconds(7)]);
	assert_eq!(harness.per_call.hits(), 1);
	assert_eq!(harness.per_retry.hits(), 3);
	assert_eq!(
		harness.client.pipeline().policy_names(),
		[
			"status",
			"api_version",
			"per_call_counter",
			"retry",
			"hmac_authentication",
			"per_retry_counter",
			"logging",
		]
	);
}

#[tokio::test]
async fn retry_after_dates_are_measured_from_the_clock() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/identities");
			then.status(429).header("retry-after", "Mon, 02 Jan 2023 03:04:15 GMT");
		})
		.await;
	let harness = harness(&server.base_url());

	harness.client.create_user().await.expect_err("Persistent 429 should fail.");

	mock.assert_hits_async(3).await;

	assert_eq!(harness.sleeps.sleeps(), [Duration::seconds(10), Duration::seconds(10)]);
}

#[tokio::test]
async fn client_errors_are_returned_without_retrying() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/identities");
			then.status(400);
		})
		.await;
	let harness = harness(&server.base_url());
	let err = harness.client.create_user().await.expect_err("400 should fail.");

	mock.assert_hits_async(1).await;

	assert_eq!(err.status().map(|status| status.as_u16()), Some(400));
	assert!(harness.sleeps.sleeps().is_empty());
}

#[tokio::test]
async fn transport_failures_are_not_retried() {
	// Port 1 (tcpmux) is closed on test hosts, so the connection is refused.
	let harness = harness("http://127.0.0.1:1");
	let err = harness.client.create_user().await.expect_err("Refused connection should fail.");

	assert!(matches!(err, Error::Transport(_)), "Expected a transport error, got {err:?}.");
	assert_eq!(harness.per_retry.hits(), 1);
	assert!(harness.sleeps.sleeps().is_empty());
}
