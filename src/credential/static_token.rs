//! Token credential backed by a single user token issued by the identity service.

// crates.io
use base64::{
	Engine as _,
	alphabet::URL_SAFE,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenRequestContext},
	credential::{CredentialFuture, TokenCredential},
};

const JWT_PAYLOAD: GeneralPurpose = GeneralPurpose::new(
	&URL_SAFE,
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims the client reads from a user token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JwtPayload {
	/// Expiry taken from the `exp` claim.
	pub expires_on: OffsetDateTime,
	/// Scopes listed in the comma-separated `acsScope` claim.
	pub scopes: Vec<String>,
}
impl JwtPayload {
	/// Decodes the payload segment of `token` without verifying its signature.
	pub fn decode(token: &str) -> Result<Self> {
		#[derive(Deserialize)]
		struct Claims {
			exp: i64,
			#[serde(rename = "acsScope", default)]
			acs_scope: Option<String>,
		}

		let malformed = |reason: &str, source: Option<crate::error::BoxError>| {
			Error::MalformedCredential { reason: format!("user token {reason}"), source }
		};
		let mut parts = token.split('.');
		let payload = match (parts.next(), parts.next()) {
			(Some(_), Some(payload)) => payload,
			_ => return Err(malformed("is not formatted correctly", None)),
		};
		let bytes = JWT_PAYLOAD
			.decode(payload)
			.map_err(|e| malformed("payload is not valid base64url", Some(e.into())))?;
		let claims = serde_json::from_slice::<Claims>(&bytes)
			.map_err(|e| malformed("payload is not valid JSON", Some(e.into())))?;
		let expires_on = OffsetDateTime::from_unix_timestamp(claims.exp)
			.map_err(|e| malformed("expiry is out of range", Some(e.into())))?;
		let scopes = claims
			.acs_scope
			.map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(Into::into).collect())
			.unwrap_or_default();

		Ok(Self { expires_on, scopes })
	}
}

/// Credential that always hands out the same user token.
///
/// The token's expiry comes from its `exp` claim, so the token cache still refuses to hand it out
/// once it has expired.
#[derive(Clone)]
pub struct StaticTokenCredential {
	token: AccessToken,
	payload: JwtPayload,
}
impl StaticTokenCredential {
	/// Parses a user token.
	pub fn new(token: impl Into<String>) -> Result<Self> {
		let token = token.into();
		let payload = JwtPayload::decode(&token)?;

		Ok(Self { token: AccessToken::new(token, payload.expires_on), payload })
	}

	/// Claims decoded from the token.
	pub fn payload(&self) -> &JwtPayload {
		&self.payload
	}
}
impl TokenCredential for StaticTokenCredential {
	fn get_token<'a>(&'a self, _context: &'a TokenRequestContext) -> CredentialFuture<'a> {
		let token = self.token.clone();

		Box::pin(async move { Ok(token) })
	}
}
impl Debug for StaticTokenCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StaticTokenCredential").field("token", &self.token).finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::engine::general_purpose::URL_SAFE_NO_PAD;
	use time::macros;
	// self
	use super::*;

	fn jwt(payload: &str) -> String {
		format!("eyJhbGciOiJSUzI1NiJ9.{}.c2lnbmF0dXJl", URL_SAFE_NO_PAD.encode(payload))
	}

	#[tokio::test]
	async fn reads_expiry_and_scopes() {
		let credential =
			StaticTokenCredential::new(jwt(r#"{"exp":1672628645,"acsScope":"chat, voip"}"#))
				.expect("Well-formed user token should parse.");
		let token = credential
			.get_token(&TokenRequestContext::default())
			.await
			.expect("Static credential should always succeed.");

		assert_eq!(token.expires_on, macros::datetime!(2023-01-02 03:04:05 UTC));
		assert_eq!(credential.payload().scopes, vec!["chat".to_string(), "voip".to_string()]);
	}

	#[test]
	fn rejects_malformed_tokens() {
		for raw in ["no-dots", "a.!!!.c", &jwt("not json"), &jwt(r#"{"acsScope":"chat"}"#)] {
			assert!(
				matches!(StaticTokenCredential::new(raw), Err(Error::MalformedCredential { .. })),
				"`{raw}` should be rejected."
			);
		}
	}
}
