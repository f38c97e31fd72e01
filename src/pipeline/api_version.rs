//! Stamps the service API version onto every request.

// self
use crate::{
	_prelude::*,
	http::Request,
	pipeline::{Next, Policy, PolicyFuture},
};

/// Query parameter carrying the API version.
pub const API_VERSION_PARAM: &str = "api-version";

/// Sets `api-version=<version>`, replacing any value already present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiVersionPolicy {
	version: String,
}
impl ApiVersionPolicy {
	/// Creates a policy stamping `version`.
	pub fn new(version: impl Into<String>) -> Self {
		Self { version: version.into() }
	}

	/// Rewrites `url` in place; other query pairs keep their order.
	pub fn apply(&self, url: &mut Url) {
		let retained = url
			.query_pairs()
			.filter(|(key, _)| key.as_ref() != API_VERSION_PARAM)
			.map(|(key, value)| (key.into_owned(), value.into_owned()))
			.collect::<Vec<_>>();

		url.set_query(None);
		url.query_pairs_mut().extend_pairs(retained).append_pair(API_VERSION_PARAM, &self.version);
	}
}
impl Policy for ApiVersionPolicy {
	fn name(&self) -> &'static str {
		"api_version"
	}

	fn process<'a>(&'a self, mut request: Request, next: Next<'a>) -> PolicyFuture<'a> {
		self.apply(&mut request.url);

		next.run(request)
	}
}
