//! Access tokens handed out by token credentials and held by the token cache.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Bearer token plus its absolute expiry.
///
/// Tokens are immutable; the cache replaces them wholesale on refresh. The serde shape matches the
/// service's `{"token":..,"expiresOn":..}` payload so identity responses decode straight into it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
	/// Bearer token value; callers must avoid logging it.
	pub token: TokenSecret,
	/// Instant after which the token is rejected by the service.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_on: OffsetDateTime,
}
impl AccessToken {
	/// Creates a token expiring at `expires_on`.
	pub fn new(token: impl Into<String>, expires_on: OffsetDateTime) -> Self {
		Self { token: TokenSecret::new(token), expires_on }
	}

	/// Returns `true` once `now` has reached the hard expiry.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_on
	}

	/// Returns `true` once `now` is inside the refresh window ahead of expiry.
	pub fn needs_refresh_at(&self, now: OffsetDateTime, refresh_offset: Duration) -> bool {
		self.expires_on - now <= refresh_offset
	}

	/// Time left until hard expiry; negative once expired.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		self.expires_on - now
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("token", &"<redacted>")
			.field("expires_on", &self.expires_on)
			.finish()
	}
}
