//! Chat clients: thread management on [`ChatClient`] and per-thread operations on
//! [`ChatThreadClient`], both authenticated with bearer tokens from a shared cache.

pub mod models;
pub mod thread;

pub use models::*;
pub use thread::*;

// crates.io
use serde::de::DeserializeOwned;
use time::{UtcOffset, format_description::well_known::Rfc3339};
// self
use crate::{
	_prelude::*,
	client::{self, ClientOptions, ServiceClient},
	credential::{Credential, TokenCredential},
	error::ConfigError,
	http::Request,
	obs::OperationKind,
	pipeline::Pipeline,
};

/// Token scope requested for chat calls.
pub const CHAT_SCOPE: &str = "chat";

const CHAT: &str = "chat";
const THREADS: &str = "threads";

/// Client for creating, listing, and deleting chat threads.
#[derive(Clone, Debug)]
pub struct ChatClient {
	service: ServiceClient,
}
impl ChatClient {
	/// Builds a client for `endpoint` using user tokens from `credential`.
	///
	/// Tokens are cached per client; every [`ChatThreadClient`] it hands out shares that cache.
	pub fn new(
		endpoint: &str,
		credential: Arc<dyn TokenCredential>,
		options: ClientOptions,
	) -> Result<Self> {
		let endpoint = client::parse_endpoint(endpoint)?;
		let auth = options.auth_policy(Credential::Token(credential), CHAT_SCOPE)?;
		let pipeline = options.pipeline(auth)?;

		Ok(Self { service: ServiceClient::new(endpoint, pipeline, OperationKind::Chat) })
	}

	/// Resource endpoint.
	pub fn endpoint(&self) -> &Url {
		self.service.endpoint()
	}

	/// Pipeline used for every call.
	pub fn pipeline(&self) -> &Pipeline {
		self.service.pipeline()
	}

	/// Creates a thread with `topic` and initial `participants`.
	pub async fn create_thread(
		&self,
		topic: &str,
		participants: &[ChatParticipant],
	) -> Result<CreateChatThreadResult> {
		let request = self
			.service
			.request(Method::POST, &[CHAT, THREADS])
			.with_json(&CreateThreadRequest { topic, participants })?;

		self.service.json("create_thread", request).await
	}

	/// Lists threads the user belongs to, optionally only those active since `start_time`.
	pub async fn list_threads(
		&self,
		max_page_size: Option<u32>,
		start_time: Option<OffsetDateTime>,
	) -> Result<Page<ChatThreadItem>> {
		let request = with_paging(
			self.service.request(Method::GET, &[CHAT, THREADS]),
			max_page_size,
			start_time,
			None,
		)?;

		self.service.json("list_threads", request).await
	}

	/// Fetches the page after `page`, or `None` on the last page.
	///
	/// Links that resolve outside the client endpoint's origin fail with
	/// [`Error::UntrustedNextLink`] before any request is sent.
	pub async fn next_page<T>(&self, page: &Page<T>) -> Result<Option<Page<T>>>
	where
		T: DeserializeOwned,
	{
		next_page(&self.service, page).await
	}

	/// Deletes thread `thread_id`.
	pub async fn delete_thread(&self, thread_id: &str) -> Result<()> {
		let request = self.service.request(Method::DELETE, &[CHAT, THREADS, thread_id]);

		self.service.empty("delete_thread", request).await
	}

	/// Client scoped to thread `thread_id`, sharing this client's pipeline and token cache.
	pub fn thread_client(&self, thread_id: impl Into<String>) -> ChatThreadClient {
		ChatThreadClient::new(self.service.clone(), thread_id.into())
	}
}

/// Appends the listing query parameters that are set.
pub(crate) fn with_paging(
	mut request: Request,
	max_page_size: Option<u32>,
	start_time: Option<OffsetDateTime>,
	skip: Option<u32>,
) -> Result<Request> {
	let mut pairs = Vec::new();

	if let Some(size) = max_page_size {
		pairs.push(("maxPageSize", size.to_string()));
	}
	if let Some(start) = start_time {
		let start = start.to_offset(UtcOffset::UTC).format(&Rfc3339).map_err(ConfigError::from)?;

		pairs.push(("startTime", start));
	}
	if let Some(skip) = skip {
		pairs.push(("skip", skip.to_string()));
	}
	if !pairs.is_empty() {
		request.url.query_pairs_mut().extend_pairs(pairs);
	}

	Ok(request)
}

pub(crate) async fn next_page<T>(service: &ServiceClient, page: &Page<T>) -> Result<Option<Page<T>>>
where
	T: DeserializeOwned,
{
	let Some(link) = page.next_link.as_deref() else {
		return Ok(None);
	};
	let url = service.endpoint().join(link).map_err(|e| ConfigError::InvalidEndpoint {
		endpoint: link.into(),
		source: Some(e),
	})?;

	if url.origin() != service.endpoint().origin() {
		return Err(Error::UntrustedNextLink { link: link.into() });
	}

	service.json("next_page", Request::new(Method::GET, url)).await.map(Some)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::_preludet::{RecordingTransport, ScriptedCredential, test_clock};

	pub(crate) fn client(transport: Arc<RecordingTransport>) -> (ChatClient, Arc<ScriptedCredential>) {
		let clock = test_clock();
		let credential = Arc::new(ScriptedCredential::new(clock.clone(), Duration::hours(1)));
		let options = ClientOptions::default()
			.with_transport(transport)
			.with_clock(clock)
			.with_retry(crate::pipeline::RetryOptions::default().with_max_retries(0));
		let client = ChatClient::new("https://contoso.example", credential.clone(), options)
			.expect("Chat client should build.");

		(client, credential)
	}

	fn query(request: &Request) -> Vec<(String, String)> {
		request.url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect()
	}

	#[tokio::test]
	async fn create_thread_posts_topic_and_participants() {
		let transport = Arc::new(RecordingTransport::default());
		let (client, _) = client(transport.clone());

		transport.respond(
			201,
			r#"{"chatThread":{"id":"19:t","topic":"Lunch","createdOn":"2023-01-02T03:04:05Z"},"invalidParticipants":[{"code":"403","message":"Nope.","target":"8:acs:x"}]}"#,
		);

		let result = client
			.create_thread("Lunch", &[ChatParticipant::new("8:acs:a".into())])
			.await
			.expect("Thread should be created.");
		let sent = &transport.requests()[0];
		let body: serde_json::Value =
			serde_json::from_slice(sent.body_bytes()).expect("Body should be JSON.");

		assert_eq!(result.chat_thread.expect("Thread should be present.").id, "19:t");
		assert_eq!(result.invalid_participants[0].target.as_deref(), Some("8:acs:x"));
		assert_eq!(sent.url.path(), "/chat/threads");
		assert_eq!(body["topic"], "Lunch");
		assert_eq!(body["participants"][0]["communicationIdentifier"]["rawId"], "8:acs:a");
		assert_eq!(sent.headers.get("authorization"), Some("Bearer token-1"));
	}

	#[tokio::test]
	async fn list_threads_sends_paging_and_follows_next_link() {
		let transport = Arc::new(RecordingTransport::default());
		let (client, credential) = client(transport.clone());

		transport.respond(
			200,
			r#"{"value":[{"id":"19:a","topic":"A"}],"nextLink":"https://contoso.example/chat/threads?continuationToken=c1&api-version=2022-06-01"}"#,
		);
		transport.respond(200, r#"{"value":[{"id":"19:b","topic":"B"}]}"#);

		let first = client
			.list_threads(
				Some(1),
				Some(macros::datetime!(2023-01-02 11:04:05 +8)),
			)
			.await
			.expect("First page should load.");
		let second = client
			.next_page(&first)
			.await
			.expect("Second page should load.")
			.expect("Second page should exist.");
		let sent = transport.requests();

		assert_eq!(first.value[0].id, "19:a");
		assert_eq!(second.value[0].id, "19:b");
		assert!(!second.has_next());
		assert!(client.next_page(&second).await.expect("Last page should end.").is_none());
		assert_eq!(query(&sent[0]), [
			("maxPageSize".to_owned(), "1".to_owned()),
			("startTime".to_owned(), "2023-01-02T03:04:05Z".to_owned()),
			("api-version".to_owned(), "2022-06-01".to_owned()),
		]);
		assert_eq!(query(&sent[1]), [
			("continuationToken".to_owned(), "c1".to_owned()),
			("api-version".to_owned(), "2022-06-01".to_owned()),
		]);
		assert_eq!(credential.calls(), 1);
	}

	#[tokio::test]
	async fn next_links_off_the_endpoint_are_not_followed() {
		let transport = Arc::new(RecordingTransport::default());
		let (client, credential) = client(transport.clone());

		for link in [
			"https://attacker.example/chat/threads?continuationToken=c1",
			"http://contoso.example/chat/threads?continuationToken=c1",
			"https://contoso.example:8443/chat/threads?continuationToken=c1",
		] {
			let page = Page::<ChatThreadItem> { value: Vec::new(), next_link: Some(link.into()) };
			let err = client.next_page(&page).await.expect_err("Foreign link must be refused.");

			assert!(matches!(err, Error::UntrustedNextLink { link: ref refused } if refused == link));
		}

		let relative =
			Page::<ChatThreadItem> { value: Vec::new(), next_link: Some("/chat/threads?c=2".into()) };

		transport.respond(200, r#"{"value":[]}"#);
		client.next_page(&relative).await.expect("Relative link should resolve on the endpoint.");

		let sent = transport.requests();

		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].url.host_str(), Some("contoso.example"));
		assert_eq!(credential.calls(), 1);
	}

	#[tokio::test]
	async fn plaintext_endpoints_are_rejected_before_fetching_tokens() {
		let transport = Arc::new(RecordingTransport::default());
		let clock = test_clock();
		let credential = Arc::new(ScriptedCredential::new(clock.clone(), Duration::hours(1)));
		let client = ChatClient::new(
			"http://contoso.example",
			credential.clone(),
			ClientOptions::default().with_transport(transport.clone()).with_clock(clock),
		)
		.expect("Chat client should build.");
		let err = client.delete_thread("19:t").await.expect_err("Plain HTTP should be refused.");

		assert!(matches!(err, Error::TlsRequired { .. }));
		assert_eq!(credential.calls(), 0);
		assert!(transport.requests().is_empty());
	}
}
