//! Token request context passed to credentials and used to key the token cache.

// self
use crate::{_prelude::*, auth::ScopeSet};

/// Describes the token a caller needs.
///
/// Only the scope set participates in cache keying; the remaining fields travel to the credential
/// untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenRequestContext {
	/// Scopes the token must carry.
	pub scopes: ScopeSet,
	/// Client request id of the call that needs the token, if any.
	pub parent_request_id: Option<String>,
	/// Additional claims to embed in the token request.
	pub claims: Option<String>,
	/// Tenant to issue the token for.
	pub tenant_id: Option<String>,
}
impl TokenRequestContext {
	/// Creates a context for the provided scope set.
	pub fn new(scopes: ScopeSet) -> Self {
		Self { scopes, ..Default::default() }
	}

	/// Sets the parent request id.
	pub fn with_parent_request_id(mut self, id: impl Into<String>) -> Self {
		self.parent_request_id = Some(id.into());

		self
	}

	/// Sets additional claims.
	pub fn with_claims(mut self, claims: impl Into<String>) -> Self {
		self.claims = Some(claims.into());

		self
	}

	/// Sets the tenant id.
	pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
		self.tenant_id = Some(tenant_id.into());

		self
	}

	/// Key identifying this context's scope set inside the token cache.
	pub fn cache_key(&self) -> String {
		self.scopes.fingerprint()
	}
}
