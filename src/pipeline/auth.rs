//! Authentication policies: HMAC-SHA256 signing for access keys and bearer tokens for user
//! credentials.

// self
use crate::{
	_prelude::*,
	auth::TokenRequestContext,
	cache::TokenCache,
	clock::Clock,
	credential::KeyCredential,
	http::Request,
	pipeline::{Next, Policy, PolicyFuture},
	sign,
};

/// Signs each attempt with the access key and the clock's current instant.
#[derive(Clone, Debug)]
pub struct HmacAuthenticationPolicy {
	key: KeyCredential,
	clock: Arc<dyn Clock>,
}
impl HmacAuthenticationPolicy {
	/// Creates a policy signing with `key`.
	pub fn new(key: KeyCredential, clock: Arc<dyn Clock>) -> Self {
		Self { key, clock }
	}

	/// Attaches `x-ms-content-sha256`, `x-ms-date`, and `Authorization` to `request`.
	pub fn authorize(&self, request: &mut Request) -> Result<()> {
		let signed = sign::sign_url(
			&self.key.bytes(),
			&request.method,
			&request.url,
			request.body.as_deref(),
			self.clock.now(),
		)?;

		for (name, value) in signed.pairs() {
			request.headers.insert(name, value).map_err(|_| Error::SigningFailed {
				reason: format!("`{name}` value is not a valid header"),
			})?;
		}

		Ok(())
	}
}
impl Policy for HmacAuthenticationPolicy {
	fn name(&self) -> &'static str {
		"hmac_authentication"
	}

	fn process<'a>(&'a self, mut request: Request, next: Next<'a>) -> PolicyFuture<'a> {
		Box::pin(async move {
			self.authorize(&mut request)?;

			next.run(request).await
		})
	}
}

/// Attaches `Authorization: Bearer <token>` using a shared [`TokenCache`].
///
/// Requests to non-`https` URLs fail with [`Error::TlsRequired`] before the cache is consulted.
#[derive(Debug)]
pub struct BearerTokenAuthenticationPolicy {
	cache: Arc<TokenCache>,
	context: TokenRequestContext,
}
impl BearerTokenAuthenticationPolicy {
	/// Creates a policy requesting tokens for `context`.
	pub fn new(cache: Arc<TokenCache>, context: TokenRequestContext) -> Self {
		Self { cache, context }
	}

	/// Cache backing the policy.
	pub fn cache(&self) -> &Arc<TokenCache> {
		&self.cache
	}

	/// Fetches a token (cached when fresh) and attaches it to `request`.
	pub async fn authorize(&self, request: &mut Request) -> Result<()> {
		if request.url.scheme() != "https" {
			return Err(Error::TlsRequired { url: request.url.to_string() });
		}

		let token = self.cache.get_token(&self.context).await?;

		request
			.headers
			.insert("authorization", &format!("Bearer {}", token.token.expose()))
			.map_err(|_| Error::SigningFailed {
				reason: "bearer token is not a valid header value".into(),
			})
	}
}
impl Policy for BearerTokenAuthenticationPolicy {
	fn name(&self) -> &'static str {
		"bearer_token_authentication"
	}

	fn process<'a>(&'a self, mut request: Request, next: Next<'a>) -> PolicyFuture<'a> {
		Box::pin(async move {
			self.authorize(&mut request).await?;

			next.run(request).await
		})
	}
}
