//! Creates a user together with a chat token, issues a second token, then revokes and deletes
//! the user again.
//!
//! Reads the resource connection string from `ACS_CONNECTION_STRING`.

// std
use std::env;
// crates.io
use color_eyre::Result;
// self
use acs_client::{
	client::ClientOptions,
	identity::{CommunicationIdentityClient, TokenScope},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let connection_string = env::var("ACS_CONNECTION_STRING")?;
	let client = CommunicationIdentityClient::from_connection_string(
		&connection_string,
		ClientOptions::default(),
	)?;
	let created = client.create_user_and_token(&[TokenScope::Chat]).await?;

	println!(
		"Created {} with a chat token valid until {}.",
		created.user, created.access_token.expires_on
	);

	let voip = client.get_token(&created.user, &[TokenScope::Chat, TokenScope::Voip]).await?;

	println!("Issued a chat + VoIP token valid until {}.", voip.expires_on);

	client.revoke_tokens(&created.user).await?;
	client.delete_user(&created.user).await?;

	println!("Revoked every token of {0} and deleted {0}.", created.user);

	Ok(())
}
