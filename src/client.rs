//! Options and plumbing shared by the service clients.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenRequestContext},
	cache::{TokenCache, TokenCacheOptions},
	clock::{Clock, SystemClock},
	connection_string::ConnectionString,
	credential::Credential,
	error::ConfigError,
	http::{Request, Transport},
	obs::{self, OperationKind},
	pipeline::{
		BearerTokenAuthenticationPolicy, HmacAuthenticationPolicy, LoggingPolicy, Pipeline, Policy,
		PolicyPosition, RetryOptions, RetryPolicy, Sleep,
	},
};

/// Connection string keyword holding the resource endpoint.
pub const ENDPOINT_KEYWORD: &str = "endpoint";
/// Connection string keyword holding the base64 access key.
pub const ACCESS_KEY_KEYWORD: &str = "accesskey";

/// Service API versions understood by the clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ApiVersion {
	/// `2021-03-07`.
	V2021_03_07,
	/// `2022-06-01`.
	#[default]
	V2022_06_01,
}
impl ApiVersion {
	/// Newest supported version.
	pub const LATEST: Self = Self::V2022_06_01;

	/// Wire representation used in the `api-version` query parameter.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::V2021_03_07 => "2021-03-07",
			Self::V2022_06_01 => "2022-06-01",
		}
	}
}
impl Display for ApiVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ApiVersion {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"2021-03-07" => Ok(Self::V2021_03_07),
			"2022-06-01" => Ok(Self::V2022_06_01),
			_ => Err(ConfigError::UnsupportedApiVersion { version: s.into() }),
		}
	}
}

/// Client configuration: API version, retry, token caching, and pipeline extension points.
#[derive(Clone)]
pub struct ClientOptions {
	/// API version stamped on every request.
	pub api_version: ApiVersion,
	/// Retry behavior and network timeout.
	pub retry: RetryOptions,
	/// Refresh timing for bearer token caches.
	pub token_cache: TokenCacheOptions,
	/// Request logging and redaction.
	pub logging: LoggingPolicy,
	transport: Option<Arc<dyn Transport>>,
	clock: Arc<dyn Clock>,
	sleep: Option<Arc<dyn Sleep>>,
	policies: Vec<(PolicyPosition, Arc<dyn Policy>)>,
}
impl ClientOptions {
	/// Overrides the API version.
	pub fn with_api_version(mut self, version: ApiVersion) -> Self {
		self.api_version = version;

		self
	}

	/// Overrides retry behavior.
	pub fn with_retry(mut self, retry: RetryOptions) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides token cache timing.
	pub fn with_token_cache(mut self, options: TokenCacheOptions) -> Self {
		self.token_cache = options;

		self
	}

	/// Overrides request logging.
	pub fn with_logging(mut self, logging: LoggingPolicy) -> Self {
		self.logging = logging;

		self
	}

	/// Sends requests through `transport` instead of the default reqwest client.
	pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Uses `clock` for signing timestamps and token freshness.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Uses `sleep` between retry attempts.
	pub fn with_sleep(mut self, sleep: Arc<dyn Sleep>) -> Self {
		self.sleep = Some(sleep);

		self
	}

	/// Adds a caller policy at `position`.
	pub fn add_policy(mut self, policy: Arc<dyn Policy>, position: PolicyPosition) -> Self {
		self.policies.push((position, policy));

		self
	}

	/// Clock shared by signing and token caching.
	pub fn clock(&self) -> Arc<dyn Clock> {
		self.clock.clone()
	}

	/// Builds the pipeline for a client authenticating with `auth`.
	pub fn pipeline(&self, auth: Arc<dyn Policy>) -> Result<Pipeline> {
		let transport = match &self.transport {
			Some(transport) => transport.clone(),
			None => default_transport(&self.retry)?,
		};
		let mut builder = Pipeline::builder(transport)
			.with_api_version(self.api_version.as_str())
			.with_auth(auth)
			.with_logging(self.logging.clone());

		if self.retry.max_retries > 0 {
			let sleep = match &self.sleep {
				Some(sleep) => sleep.clone(),
				None => default_sleep()?,
			};

			builder =
				builder.with_retry(RetryPolicy::new(self.retry.clone(), sleep, self.clock.clone()));
		}
		for (position, policy) in &self.policies {
			builder = builder.add_policy(policy.clone(), *position);
		}

		Ok(builder.build())
	}

	/// Authentication policy for `credential`; bearer tokens are requested for `scope`.
	pub(crate) fn auth_policy(&self, credential: Credential, scope: &str) -> Result<Arc<dyn Policy>> {
		Ok(match credential {
			Credential::Key(key) => Arc::new(HmacAuthenticationPolicy::new(key, self.clock())),
			Credential::Token(credential) => {
				let scopes = ScopeSet::new([scope]).map_err(ConfigError::from)?;
				let cache = TokenCache::new(credential)
					.with_clock(self.clock())
					.with_options(self.token_cache.clone());

				Arc::new(BearerTokenAuthenticationPolicy::new(
					Arc::new(cache),
					TokenRequestContext::new(scopes),
				))
			},
		})
	}
}
impl Default for ClientOptions {
	fn default() -> Self {
		Self {
			api_version: ApiVersion::LATEST,
			retry: RetryOptions::default(),
			token_cache: TokenCacheOptions::default(),
			logging: LoggingPolicy::default(),
			transport: None,
			clock: Arc::new(SystemClock),
			sleep: None,
			policies: Vec::new(),
		}
	}
}
impl Debug for ClientOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientOptions")
			.field("api_version", &self.api_version)
			.field("retry", &self.retry)
			.field("token_cache", &self.token_cache)
			.field("custom_transport", &self.transport.is_some())
			.field("clock", &self.clock)
			.field("sleep", &self.sleep)
			.field("policies", &self.policies.len())
			.finish()
	}
}

#[cfg(feature = "reqwest")]
fn default_transport(retry: &RetryOptions) -> Result<Arc<dyn Transport>> {
	Ok(Arc::new(crate::http::ReqwestTransport::new(retry.network_timeout.unsigned_abs())?))
}
#[cfg(not(feature = "reqwest"))]
fn default_transport(_retry: &RetryOptions) -> Result<Arc<dyn Transport>> {
	Err(ConfigError::MissingComponent { component: "transport" }.into())
}

#[cfg(feature = "reqwest")]
fn default_sleep() -> Result<Arc<dyn Sleep>> {
	Ok(Arc::new(crate::pipeline::TokioSleep))
}
#[cfg(not(feature = "reqwest"))]
fn default_sleep() -> Result<Arc<dyn Sleep>> {
	Err(ConfigError::MissingComponent { component: "sleep" }.into())
}

/// Parses and validates a service endpoint (`http` or `https`, with a host).
pub fn parse_endpoint(raw: &str) -> Result<Url> {
	let invalid = |source| ConfigError::InvalidEndpoint { endpoint: raw.into(), source };
	let url = Url::parse(raw.trim()).map_err(|e| invalid(Some(e)))?;

	if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
		return Err(invalid(None).into());
	}

	Ok(url)
}

/// Splits a connection string into its endpoint and access key.
pub fn endpoint_and_key(connection_string: &str) -> Result<(Url, String)> {
	let cs = ConnectionString::parse(connection_string)?;
	let endpoint = parse_endpoint(cs.get_required(ENDPOINT_KEYWORD)?)?;

	Ok((endpoint, cs.get_required(ACCESS_KEY_KEYWORD)?.to_owned()))
}

/// Endpoint plus pipeline; the common core of every service client.
#[derive(Clone, Debug)]
pub(crate) struct ServiceClient {
	endpoint: Url,
	pipeline: Pipeline,
	kind: OperationKind,
}
impl ServiceClient {
	pub(crate) fn new(endpoint: Url, pipeline: Pipeline, kind: OperationKind) -> Self {
		Self { endpoint, pipeline, kind }
	}

	pub(crate) fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	pub(crate) fn pipeline(&self) -> &Pipeline {
		&self.pipeline
	}

	/// Endpoint with `segments` appended as percent-encoded path segments.
	pub(crate) fn url(&self, segments: &[&str]) -> Url {
		let mut url = self.endpoint.clone();

		url.set_query(None);
		url.set_fragment(None);

		// `parse_endpoint` guarantees a base URL, which always has path segments.
		if let Ok(mut path) = url.path_segments_mut() {
			path.pop_if_empty().extend(segments);
		}

		url
	}

	pub(crate) fn request(&self, method: Method, segments: &[&str]) -> Request {
		Request::new(method, self.url(segments))
	}

	/// Sends `request` and decodes the JSON body.
	pub(crate) async fn json<T>(&self, stage: &'static str, request: Request) -> Result<T>
	where
		T: DeserializeOwned,
	{
		obs::observe(self.kind, stage, async move { self.pipeline.send(request).await?.json() })
			.await
	}

	/// Sends `request` and discards the body.
	pub(crate) async fn empty(&self, stage: &'static str, request: Request) -> Result<()> {
		obs::observe(self.kind, stage, async move {
			self.pipeline.send(request).await.map(|_| ())
		})
		.await
	}
}
