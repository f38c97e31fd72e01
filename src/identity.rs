//! Communication identity client: user lifecycle and access token issuance.
//!
//! The client signs requests with the resource access key (HMAC) or, when handed a token
//! credential, authenticates with Azure AD bearer tokens for [`IDENTITY_SCOPE`].

pub mod models;

pub use models::*;

// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	client::{self, ClientOptions, ServiceClient},
	credential::{Credential, KeyCredential},
	obs::OperationKind,
	pipeline::Pipeline,
};

/// Azure AD scope requested when the identity client authenticates with a token credential.
pub const IDENTITY_SCOPE: &str = "https://communication.azure.com//.default";

const IDENTITIES: &str = "identities";

/// Client for the identity service.
#[derive(Clone, Debug)]
pub struct CommunicationIdentityClient {
	service: ServiceClient,
	credential: Credential,
}
impl CommunicationIdentityClient {
	/// Builds a client for `endpoint` authenticated with `credential`.
	pub fn new(
		endpoint: &str,
		credential: impl Into<Credential>,
		options: ClientOptions,
	) -> Result<Self> {
		let credential = credential.into();
		let endpoint = client::parse_endpoint(endpoint)?;
		let pipeline = options.pipeline(options.auth_policy(credential.clone(), IDENTITY_SCOPE)?)?;

		Ok(Self {
			service: ServiceClient::new(endpoint, pipeline, OperationKind::Identity),
			credential,
		})
	}

	/// Builds a client from an `endpoint=...;accesskey=...` connection string.
	pub fn from_connection_string(connection_string: &str, options: ClientOptions) -> Result<Self> {
		let (endpoint, key) = client::endpoint_and_key(connection_string)?;

		Self::new(endpoint.as_str(), KeyCredential::from_base64(&key)?, options)
	}

	/// Resource endpoint.
	pub fn endpoint(&self) -> &Url {
		self.service.endpoint()
	}

	/// Credential the client authenticates with; rotating a key affects every clone.
	pub fn credential(&self) -> &Credential {
		&self.credential
	}

	/// Pipeline used for every call.
	pub fn pipeline(&self) -> &Pipeline {
		self.service.pipeline()
	}

	/// Creates a new user.
	pub async fn create_user(&self) -> Result<CommunicationUser> {
		let request = self
			.service
			.request(Method::POST, &[IDENTITIES])
			.with_json(&CreateIdentityRequest::default())?;
		let response: IdentityResponse = self.service.json("create_user", request).await?;

		Ok(response.identity)
	}

	/// Creates a new user and issues its first token for `scopes`.
	pub async fn create_user_and_token(
		&self,
		scopes: &[TokenScope],
	) -> Result<CommunicationUserAndToken> {
		let request = self
			.service
			.request(Method::POST, &[IDENTITIES])
			.with_json(&CreateIdentityRequest { create_token_with_scopes: Some(scopes) })?;
		let response: IdentityResponse =
			self.service.json("create_user_and_token", request).await?;
		let Some(access_token) = response.access_token else {
			return Err(Error::MalformedCredential {
				reason: "identity response did not include the requested access token".into(),
				source: None,
			});
		};

		Ok(CommunicationUserAndToken { user: response.identity, access_token })
	}

	/// Deletes `user` and revokes all of its tokens.
	pub async fn delete_user(&self, user: &CommunicationUser) -> Result<()> {
		let request = self.service.request(Method::DELETE, &[IDENTITIES, user.id.as_str()]);

		self.service.empty("delete_user", request).await
	}

	/// Issues a token for an existing `user`.
	pub async fn get_token(
		&self,
		user: &CommunicationUser,
		scopes: &[TokenScope],
	) -> Result<AccessToken> {
		let request = self
			.service
			.request(Method::POST, &[IDENTITIES, user.id.as_str(), ":issueAccessToken"])
			.with_json(&IssueTokenRequest { scopes })?;

		self.service.json("get_token", request).await
	}

	/// Revokes every token previously issued to `user`.
	pub async fn revoke_tokens(&self, user: &CommunicationUser) -> Result<()> {
		let request =
			self.service.request(Method::POST, &[IDENTITIES, user.id.as_str(), ":revokeAccessTokens"]);

		self.service.empty("revoke_tokens", request).await
	}

	/// Exchanges a Teams user's Azure AD token for a communication token.
	pub async fn get_token_for_teams_user(
		&self,
		options: &TeamsUserExchangeOptions,
	) -> Result<AccessToken> {
		let request = self
			.service
			.request(Method::POST, &["teamsUser", ":exchangeAccessToken"])
			.with_json(options)?;

		self.service.json("get_token_for_teams_user", request).await
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{RecordingTransport, ScriptedCredential, TEST_ACCESS_KEY, test_clock},
		pipeline::RetryOptions,
		sign,
	};

	fn client(transport: Arc<RecordingTransport>) -> CommunicationIdentityClient {
		let options = ClientOptions::default()
			.with_transport(transport)
			.with_clock(test_clock())
			.with_retry(RetryOptions::default().with_max_retries(0));

		CommunicationIdentityClient::from_connection_string(
			&format!("endpoint=https://contoso.example/;accesskey={TEST_ACCESS_KEY}"),
			options,
		)
		.expect("Client should build.")
	}

	#[tokio::test]
	async fn create_user_posts_signed_empty_object() {
		let transport = Arc::new(RecordingTransport::default());

		transport.respond(201, r#"{"identity":{"id":"8:acs:new"}}"#);

		let user = client(transport.clone()).create_user().await.expect("User should be created.");
		let sent = &transport.requests()[0];

		assert_eq!(user, CommunicationUser::new("8:acs:new"));
		assert_eq!(sent.method, Method::POST);
		assert_eq!(sent.url.as_str(), "https://contoso.example/identities?api-version=2022-06-01");
		assert_eq!(sent.body_bytes(), b"{}");
		assert_eq!(sent.headers.get(sign::DATE_HEADER), Some("Mon, 02 Jan 2023 03:04:05 GMT"));
		assert!(
			sent.headers
				.get("authorization")
				.is_some_and(|value| value.starts_with("HMAC-SHA256 SignedHeaders="))
		);
	}

	#[tokio::test]
	async fn token_operations_target_action_paths() {
		let transport = Arc::new(RecordingTransport::default());
		let client = client(transport.clone());
		let user = CommunicationUser::new("8:acs:u");

		transport.respond(200, r#"{"token":"t","expiresOn":"2023-01-03T03:04:05Z"}"#);
		transport.respond(204, "");

		let token = client
			.get_token(&user, &[TokenScope::Chat, TokenScope::Voip])
			.await
			.expect("Token should be issued.");

		client.revoke_tokens(&user).await.expect("Revocation should succeed.");

		let sent = transport.requests();

		assert_eq!(token.token.expose(), "t");
		assert_eq!(sent[0].url.path(), "/identities/8:acs:u/:issueAccessToken");
		assert_eq!(sent[0].body_bytes(), br#"{"scopes":["chat","voip"]}"#);
		assert_eq!(sent[1].url.path(), "/identities/8:acs:u/:revokeAccessTokens");
		assert!(sent[1].body.is_none());
	}

	#[tokio::test]
	async fn missing_token_in_create_response_is_reported() {
		let transport = Arc::new(RecordingTransport::default());

		transport.respond(201, r#"{"identity":{"id":"8:acs:new"}}"#);

		let err = client(transport)
			.create_user_and_token(&[TokenScope::Chat])
			.await
			.expect_err("Missing token should fail.");

		assert!(matches!(err, Error::MalformedCredential { .. }));
	}

	#[tokio::test]
	async fn token_credentials_switch_to_bearer_auth() {
		let transport = Arc::new(RecordingTransport::default());
		let clock = test_clock();
		let credential = Arc::new(ScriptedCredential::new(clock.clone(), Duration::hours(1)));
		let client = CommunicationIdentityClient::new(
			"https://contoso.example",
			credential.clone(),
			ClientOptions::default().with_transport(transport.clone()).with_clock(clock),
		)
		.expect("Client should build.");

		transport.respond(204, "");
		client
			.delete_user(&CommunicationUser::new("8:acs:gone"))
			.await
			.expect("Deletion should succeed.");

		let sent = &transport.requests()[0];

		assert_eq!(sent.method, Method::DELETE);
		assert_eq!(sent.headers.get("authorization"), Some("Bearer token-1"));
		assert!(sent.headers.get(sign::DATE_HEADER).is_none());
		assert!(matches!(client.credential(), Credential::Token(_)));
	}

	#[test]
	fn bad_access_keys_fail_construction() {
		let err = CommunicationIdentityClient::from_connection_string(
			"endpoint=https://contoso.example/;accesskey=***",
			ClientOptions::default().with_transport(Arc::new(RecordingTransport::default())),
		)
		.expect_err("Invalid base64 should fail.");

		assert!(matches!(err, Error::MalformedCredential { .. }));
	}
}
