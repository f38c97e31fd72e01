//! Identity service payloads.

// self
use crate::{_prelude::*, auth::AccessToken};

/// Communication user identifier (`8:acs:...`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommunicationUser {
	/// Raw identifier string.
	pub id: String,
}
impl CommunicationUser {
	/// Wraps an identifier string.
	pub fn new(id: impl Into<String>) -> Self {
		Self { id: id.into() }
	}
}
impl Display for CommunicationUser {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.id)
	}
}
impl From<&str> for CommunicationUser {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

/// Token scopes the identity service can grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
	/// Chat access.
	Chat,
	/// Voice and video calling.
	Voip,
}
impl TokenScope {
	/// Wire representation.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Chat => "chat",
			Self::Voip => "voip",
		}
	}
}
impl Display for TokenScope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// User created together with its first token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommunicationUserAndToken {
	/// Newly created user.
	pub user: CommunicationUser,
	/// Token issued for `user`.
	pub access_token: AccessToken,
}

/// Inputs for exchanging a Teams user's Azure AD token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamsUserExchangeOptions {
	/// Azure AD access token of the Teams user.
	pub token: String,
	/// Azure AD application id.
	pub app_id: String,
	/// Object id of the Teams user.
	pub user_id: String,
}
impl TeamsUserExchangeOptions {
	/// Bundles the three exchange inputs.
	pub fn new(
		token: impl Into<String>,
		app_id: impl Into<String>,
		user_id: impl Into<String>,
	) -> Self {
		Self { token: token.into(), app_id: app_id.into(), user_id: user_id.into() }
	}
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateIdentityRequest<'a> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub(crate) create_token_with_scopes: Option<&'a [TokenScope]>,
}

#[derive(Debug, Serialize)]
pub(crate) struct IssueTokenRequest<'a> {
	pub(crate) scopes: &'a [TokenScope],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IdentityResponse {
	pub(crate) identity: CommunicationUser,
	#[serde(default)]
	pub(crate) access_token: Option<AccessToken>,
}

/// Serde adapter for the service's `CommunicationIdentifierModel`
/// (`{"rawId":..,"communicationUser":{"id":..}}`).
pub(crate) mod identifier {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as DeError};
	// self
	use super::*;

	#[derive(Serialize, Deserialize)]
	#[serde(rename_all = "camelCase")]
	struct Wire {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		raw_id: Option<String>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		communication_user: Option<CommunicationUser>,
	}
	impl Wire {
		fn into_user(self) -> Option<CommunicationUser> {
			self.communication_user.or_else(|| self.raw_id.map(CommunicationUser::new))
		}
	}

	pub(crate) fn wire(user: &CommunicationUser) -> impl Serialize {
		Wire { raw_id: Some(user.id.clone()), communication_user: Some(user.clone()) }
	}

	pub(crate) fn serialize<S>(user: &CommunicationUser, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		wire(user).serialize(serializer)
	}

	pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<CommunicationUser, D::Error>
	where
		D: Deserializer<'de>,
	{
		Wire::deserialize(deserializer)?
			.into_user()
			.ok_or_else(|| D::Error::missing_field("communicationUser"))
	}

	pub(crate) mod option {
		// self
		use super::*;

		pub(crate) fn deserialize<'de, D>(
			deserializer: D,
		) -> Result<Option<CommunicationUser>, D::Error>
		where
			D: Deserializer<'de>,
		{
			Ok(Option::<Wire>::deserialize(deserializer)?.and_then(Wire::into_user))
		}
	}
}
