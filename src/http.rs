//! Transport primitives: the request and response values policies pass around, and the
//! [`Transport`] trait that executes them.
//!
//! Requests are rebuilt or cloned per attempt so policies closer to the transport (signing,
//! logging) always see the final bytes. Header order is preserved so signed and logged requests
//! read the same way they were assembled.

// crates.io
use ::http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use serde::de::DeserializeOwned;
use time::{PrimitiveDateTime, format_description::well_known::Rfc2822};
// self
use crate::{_prelude::*, error::ConfigError, sign::RFC1123};

pub use ::http::{header, method, status};

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<Response>> + 'a + Send>>;

/// Executes fully-prepared requests.
///
/// Implementations report connection-level failures as [`Error::Transport`]; every HTTP status,
/// success or not, is returned as a [`Response`] and classified by the pipeline.
pub trait Transport
where
	Self: Send + Sync,
{
	/// Sends `request` and returns the raw response.
	fn send(&self, request: Request) -> TransportFuture<'_>;
}

/// Insertion-ordered header list; inserting an existing name replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers(Vec<(HeaderName, HeaderValue)>);
impl Headers {
	/// Sets `name` to `value`, validating both.
	pub fn insert(&mut self, name: &str, value: &str) -> Result<()> {
		let name = HeaderName::from_bytes(name.as_bytes())
			.map_err(|_| ConfigError::InvalidHeader { name: name.into() })?;
		let value = HeaderValue::from_str(value)
			.map_err(|_| ConfigError::InvalidHeader { name: name.as_str().into() })?;

		self.insert_typed(name, value);

		Ok(())
	}

	/// Sets an already-validated header.
	pub fn insert_typed(&mut self, name: HeaderName, value: HeaderValue) {
		match self.0.iter_mut().find(|(existing, _)| *existing == name) {
			Some((_, slot)) => *slot = value,
			None => self.0.push((name, value)),
		}
	}

	/// Value of `name` as a string, if present and visible ASCII.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0
			.iter()
			.find(|(existing, _)| existing.as_str().eq_ignore_ascii_case(name))
			.and_then(|(_, value)| value.to_str().ok())
	}

	/// Removes `name`, returning its previous value.
	pub fn remove(&mut self, name: &str) -> Option<HeaderValue> {
		let index =
			self.0.iter().position(|(existing, _)| existing.as_str().eq_ignore_ascii_case(name))?;

		Some(self.0.remove(index).1)
	}

	/// Header names in insertion order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(|(name, _)| name.as_str())
	}

	/// Name/value pairs in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
		self.0.iter().map(|(name, value)| (name, value))
	}

	/// Number of headers.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true when no headers are set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// Outbound request as seen by policies and the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL, query already encoded.
	pub url: Url,
	/// Headers in insertion order.
	pub headers: Headers,
	/// Body bytes; `None` for bodiless requests.
	pub body: Option<Vec<u8>>,
}
impl Request {
	/// Creates a bodiless request.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: Headers::default(), body: None }
	}

	/// Serializes `body` as JSON and sets `content-type`.
	pub fn with_json<T>(mut self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(body)
			.map_err(|e| Error::SigningFailed { reason: format!("request body: {e}") })?;

		self.headers.insert("content-type", "application/json")?;
		self.body = Some(bytes);

		Ok(self)
	}

	/// Sets a header, validating name and value.
	pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
		self.headers.insert(name, value)?;

		Ok(self)
	}

	/// Body bytes or an empty slice.
	pub fn body_bytes(&self) -> &[u8] {
		self.body.as_deref().unwrap_or_default()
	}
}

/// Response returned by the transport.
#[derive(Clone, Debug)]
pub struct Response {
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw body.
	pub body: Vec<u8>,
}
impl Response {
	/// Creates a response without headers.
	pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
		Self { status, headers: HeaderMap::new(), body }
	}

	/// Decodes the body as JSON, reporting the failing field path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| Error::ResponseParse { source, status: Some(self.status.as_u16()) })
	}

	/// `Retry-After` hint, if present and in the future.
	pub fn retry_after(&self, now: OffsetDateTime) -> Option<Duration> {
		parse_retry_after(&self.headers, now)
	}
}

/// Parses `Retry-After` as delta seconds or an HTTP date relative to `now`.
pub fn parse_retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs.min(i64::MAX as u64) as i64));
	}

	let moment = PrimitiveDateTime::parse(raw, RFC1123)
		.map(PrimitiveDateTime::assume_utc)
		.or_else(|_| OffsetDateTime::parse(raw, &Rfc2822))
		.ok()?;
	let delta = moment - now;

	delta.is_positive().then_some(delta)
}

/// [`Transport`] backed by a shared [`ReqwestClient`].
///
/// Redirects are not followed; every response is surfaced to the pipeline as-is.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a client with the given per-request timeout.
	pub fn new(timeout: std::time::Duration) -> Result<Self> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(ConfigError::from)?;

		Ok(Self(client))
	}

	/// Wraps an existing client.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn send(&self, request: Request) -> TransportFuture<'_> {
		Box::pin(async move {
			let mut builder = self.0.request(request.method, request.url);

			for (name, value) in request.headers.iter() {
				builder = builder.header(name, value);
			}
			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response =
				builder.send().await.map_err(crate::error::TransportError::from)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body =
				response.bytes().await.map_err(crate::error::TransportError::from)?.to_vec();

			Ok(Response { status, headers, body })
		})
	}
}
