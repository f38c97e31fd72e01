//! Onion-model request pipeline.
//!
//! A [`Pipeline`] owns an ordered slice of policies and a transport. Each policy receives the
//! request plus a [`Next`] cursor over the remaining policies; calling [`Next::run`] hands the
//! request inward and yields the response on the way back out. Policies may rewrite the request,
//! short-circuit with their own response or error, or inspect the response.
//!
//! Built pipelines always assemble in this order, outermost first:
//!
//! 1. [`StatusPolicy`]
//! 2. [`ApiVersionPolicy`]
//! 3. caller policies at [`PolicyPosition::PerCall`]
//! 4. [`RetryPolicy`]
//! 5. authentication ([`HmacAuthenticationPolicy`] or [`BearerTokenAuthenticationPolicy`])
//! 6. caller policies at [`PolicyPosition::PerRetry`]
//! 7. caller policies at [`PolicyPosition::BeforeTransport`]
//! 8. [`LoggingPolicy`]
//!
//! Retry wraps authentication, so every attempt is signed again with a fresh timestamp or token.

pub mod api_version;
pub mod auth;
pub mod logging;
pub mod retry;
pub mod status;

pub use api_version::*;
pub use auth::*;
pub use logging::*;
pub use retry::*;
pub use status::*;

// self
use crate::{
	_prelude::*,
	http::{Request, Response, Transport},
};

/// Boxed future returned by [`Policy::process`].
pub type PolicyFuture<'a> = Pin<Box<dyn Future<Output = Result<Response>> + 'a + Send>>;

/// One step of the pipeline.
pub trait Policy
where
	Self: Send + Sync,
{
	/// Stable name used in logs and [`Pipeline::policy_names`].
	fn name(&self) -> &'static str;

	/// Processes `request`, usually by forwarding it through `next`.
	fn process<'a>(&'a self, request: Request, next: Next<'a>) -> PolicyFuture<'a>;
}

/// Where a caller-supplied policy is inserted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolicyPosition {
	/// Runs once per logical call, outside the retry loop.
	PerCall,
	/// Runs on every attempt, after authentication.
	PerRetry,
	/// Runs on every attempt, just before request logging and the transport.
	BeforeTransport,
}

/// Cursor over the policies that have not run yet.
#[derive(Clone, Copy)]
pub struct Next<'a> {
	policies: &'a [Arc<dyn Policy>],
	transport: &'a dyn Transport,
}
impl<'a> Next<'a> {
	/// Runs the remaining policies, then the transport.
	pub fn run(self, request: Request) -> PolicyFuture<'a> {
		match self.policies.split_first() {
			Some((policy, rest)) =>
				policy.process(request, Next { policies: rest, transport: self.transport }),
			None => self.transport.send(request),
		}
	}

	/// Number of policies still ahead of the transport.
	pub fn remaining(&self) -> usize {
		self.policies.len()
	}
}
impl Debug for Next<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Next")
			.field("policies", &self.policies.iter().map(|p| p.name()).collect::<Vec<_>>())
			.finish()
	}
}

/// Immutable, shareable policy chain plus transport.
#[derive(Clone)]
pub struct Pipeline {
	policies: Arc<[Arc<dyn Policy>]>,
	transport: Arc<dyn Transport>,
}
impl Pipeline {
	/// Starts a builder that sends through `transport`.
	pub fn builder(transport: Arc<dyn Transport>) -> PipelineBuilder {
		PipelineBuilder::new(transport)
	}

	/// Sends `request` through every policy and the transport.
	pub async fn send(&self, request: Request) -> Result<Response> {
		Next { policies: &self.policies, transport: self.transport.as_ref() }.run(request).await
	}

	/// Policy names, outermost first.
	pub fn policy_names(&self) -> Vec<&'static str> {
		self.policies.iter().map(|policy| policy.name()).collect()
	}
}
impl Debug for Pipeline {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Pipeline").field("policies", &self.policy_names()).finish()
	}
}

/// Assembles a [`Pipeline`] in the fixed policy order.
pub struct PipelineBuilder {
	transport: Arc<dyn Transport>,
	api_version: Option<String>,
	retry: Option<Arc<dyn Policy>>,
	auth: Option<Arc<dyn Policy>>,
	logging: Option<Arc<dyn Policy>>,
	classify_status: bool,
	custom: Vec<(PolicyPosition, Arc<dyn Policy>)>,
}
impl PipelineBuilder {
	/// Creates a builder with status classification and request logging enabled.
	pub fn new(transport: Arc<dyn Transport>) -> Self {
		Self {
			transport,
			api_version: None,
			retry: None,
			auth: None,
			logging: Some(Arc::new(LoggingPolicy::default())),
			classify_status: true,
			custom: Vec::new(),
		}
	}

	/// Appends `api-version=<version>` to every request.
	pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
		self.api_version = Some(version.into());

		self
	}

	/// Installs the retry policy.
	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = Some(Arc::new(retry));

		self
	}

	/// Installs the authentication policy.
	pub fn with_auth(mut self, auth: Arc<dyn Policy>) -> Self {
		self.auth = Some(auth);

		self
	}

	/// Replaces the request logging policy.
	pub fn with_logging(mut self, logging: LoggingPolicy) -> Self {
		self.logging = Some(Arc::new(logging));

		self
	}

	/// Returns raw non-2xx responses instead of converting them into [`Error::Http`].
	pub fn without_status_classification(mut self) -> Self {
		self.classify_status = false;

		self
	}

	/// Adds a caller policy; policies sharing a position keep insertion order.
	pub fn add_policy(mut self, policy: Arc<dyn Policy>, position: PolicyPosition) -> Self {
		self.custom.push((position, policy));

		self
	}

	/// Freezes the chain.
	pub fn build(self) -> Pipeline {
		let Self { transport, api_version, retry, auth, logging, classify_status, custom } = self;
		let at = |position: PolicyPosition| {
			custom.iter().filter(move |(p, _)| *p == position).map(|(_, policy)| policy.clone())
		};
		let mut policies = Vec::<Arc<dyn Policy>>::new();

		if classify_status {
			policies.push(Arc::new(StatusPolicy));
		}
		if let Some(version) = api_version {
			policies.push(Arc::new(ApiVersionPolicy::new(version)));
		}

		policies.extend(at(PolicyPosition::PerCall));
		policies.extend(retry);
		policies.extend(auth);
		policies.extend(at(PolicyPosition::PerRetry));
		policies.extend(at(PolicyPosition::BeforeTransport));
		policies.extend(logging);

		Pipeline { policies: policies.into(), transport }
	}
}
