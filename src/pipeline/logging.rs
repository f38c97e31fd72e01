//! Request/response logging with secret redaction.

// self
use crate::{
	_prelude::*,
	http::{Headers, Request},
	pipeline::{Next, Policy, PolicyFuture},
};

const REDACTED: &str = "REDACTED";

/// Innermost policy: emits a `tracing` event per attempt (when the `tracing` feature is enabled).
///
/// Header values and query values are replaced with `REDACTED` unless allow-listed. The
/// `authorization` header is always redacted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingPolicy {
	allowed_headers: Vec<String>,
	allowed_query: Vec<String>,
}
impl LoggingPolicy {
	/// Headers whose values are logged by default.
	pub const DEFAULT_ALLOWED_HEADERS: [&str; 7] = [
		"accept",
		"content-type",
		"retry-after",
		"x-ms-client-request-id",
		"x-ms-content-sha256",
		"x-ms-date",
		"user-agent",
	];
	/// Query parameters whose values are logged by default.
	pub const DEFAULT_ALLOWED_QUERY: [&str; 1] = ["api-version"];

	/// Allows logging the value of `header`.
	pub fn allow_header(mut self, header: impl Into<String>) -> Self {
		self.allowed_headers.push(header.into().to_ascii_lowercase());

		self
	}

	/// Allows logging the value of query parameter `name`.
	pub fn allow_query(mut self, name: impl Into<String>) -> Self {
		self.allowed_query.push(name.into());

		self
	}

	/// `url` with non-allow-listed query values redacted.
	pub fn redacted_url(&self, url: &Url) -> String {
		if url.query().is_none() {
			return url.to_string();
		}

		let pairs = url
			.query_pairs()
			.map(|(key, value)| {
				let value = if self.allowed_query.iter().any(|allowed| *allowed == key) {
					value.into_owned()
				} else {
					REDACTED.into()
				};

				(key.into_owned(), value)
			})
			.collect::<Vec<_>>();
		let mut redacted = url.clone();

		redacted.set_query(None);
		redacted.query_pairs_mut().extend_pairs(pairs);

		redacted.to_string()
	}

	/// Header pairs with non-allow-listed values redacted.
	pub fn redacted_headers(&self, headers: &Headers) -> Vec<(String, String)> {
		headers
			.iter()
			.map(|(name, value)| {
				let allowed = name.as_str() != "authorization"
					&& self.allowed_headers.iter().any(|allowed| allowed == name.as_str());
				let value = match value.to_str() {
					Ok(value) if allowed => value.to_owned(),
					_ => REDACTED.into(),
				};

				(name.as_str().to_owned(), value)
			})
			.collect()
	}
}
impl Default for LoggingPolicy {
	fn default() -> Self {
		Self {
			allowed_headers: Self::DEFAULT_ALLOWED_HEADERS.iter().map(|h| h.to_string()).collect(),
			allowed_query: Self::DEFAULT_ALLOWED_QUERY.iter().map(|q| q.to_string()).collect(),
		}
	}
}
impl Policy for LoggingPolicy {
	fn name(&self) -> &'static str {
		"logging"
	}

	#[cfg(feature = "tracing")]
	fn process<'a>(&'a self, request: Request, next: Next<'a>) -> PolicyFuture<'a> {
		Box::pin(async move {
			tracing::debug!(
				method = %request.method,
				url = %self.redacted_url(&request.url),
				headers = ?self.redacted_headers(&request.headers),
				body_len = request.body_bytes().len(),
				"Sending request."
			);

			let started = std::time::Instant::now();
			let result = next.run(request).await;
			let elapsed_ms = started.elapsed().as_millis() as u64;

			match &result {
				Ok(response) => tracing::debug!(
					status = response.status.as_u16(),
					elapsed_ms,
					"Received response."
				),
				Err(e) => tracing::warn!(error = %e, elapsed_ms, "Request failed."),
			}

			result
		})
	}

	#[cfg(not(feature = "tracing"))]
	fn process<'a>(&'a self, request: Request, next: Next<'a>) -> PolicyFuture<'a> {
		next.run(request)
	}
}
