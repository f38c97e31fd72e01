//! Token credential that delegates to a caller-supplied async callback.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenRequestContext},
	credential::{CredentialFuture, TokenCredential},
};

/// Adapts an async closure into a [`TokenCredential`].
///
/// The closure receives an owned copy of the request context so the returned future can be
/// `'static`.
pub struct CallbackTokenCredential<F>(F);
impl<F, Fut> CallbackTokenCredential<F>
where
	F: Fn(TokenRequestContext) -> Fut,
	Fut: Future<Output = Result<AccessToken>>,
{
	/// Wraps `callback`.
	pub fn new(callback: F) -> Self {
		Self(callback)
	}
}
impl<F, Fut> TokenCredential for CallbackTokenCredential<F>
where
	F: Send + Sync + Fn(TokenRequestContext) -> Fut,
	Fut: 'static + Send + Future<Output = Result<AccessToken>>,
{
	fn get_token<'a>(&'a self, context: &'a TokenRequestContext) -> CredentialFuture<'a> {
		Box::pin((self.0)(context.clone()))
	}
}
impl<F> Debug for CallbackTokenCredential<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CallbackTokenCredential(..)")
	}
}
