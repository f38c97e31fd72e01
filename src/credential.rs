//! Credential sources: long-lived access keys for HMAC signing and token credentials for bearer
//! auth.

pub mod callback;
pub mod key;
pub mod static_token;

pub use callback::*;
pub use key::*;
pub use static_token::*;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenRequestContext},
};

/// Boxed future returned by [`TokenCredential::get_token`].
pub type CredentialFuture<'a> = Pin<Box<dyn Future<Output = Result<AccessToken>> + 'a + Send>>;

/// Provider of short-lived bearer tokens.
///
/// Implementations are called by the token cache only when the cached token is missing or inside
/// its refresh window, and never concurrently for the same scope set.
pub trait TokenCredential
where
	Self: Send + Sync,
{
	/// Fetches a token satisfying `context`.
	fn get_token<'a>(&'a self, context: &'a TokenRequestContext) -> CredentialFuture<'a>;
}

/// Credential a client authenticates with.
#[derive(Clone)]
pub enum Credential {
	/// Shared access key; requests are HMAC-SHA256 signed.
	Key(KeyCredential),
	/// Token provider; requests carry `Authorization: Bearer`.
	Token(Arc<dyn TokenCredential>),
}
impl From<KeyCredential> for Credential {
	fn from(key: KeyCredential) -> Self {
		Self::Key(key)
	}
}
impl<T> From<Arc<T>> for Credential
where
	T: 'static + TokenCredential,
{
	fn from(credential: Arc<T>) -> Self {
		Self::Token(credential)
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Key(key) => f.debug_tuple("Credential::Key").field(key).finish(),
			Self::Token(_) => f.write_str("Credential::Token(..)"),
		}
	}
}
