//! Walks a chat thread end to end: provisions a user through the identity service, hands its
//! token to a chat client, posts a few messages and pages through them before cleaning up.
//!
//! Reads the resource connection string from `ACS_CONNECTION_STRING`.

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
// self
use acs_client::{
	chat::{ChatClient, ChatParticipant, SendMessageOptions},
	client::ClientOptions,
	credential::StaticTokenCredential,
	identity::{CommunicationIdentityClient, TokenScope},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let connection_string = env::var("ACS_CONNECTION_STRING")?;
	let identity = CommunicationIdentityClient::from_connection_string(
		&connection_string,
		ClientOptions::default(),
	)?;
	let created = identity.create_user_and_token(&[TokenScope::Chat]).await?;
	let credential = StaticTokenCredential::new(created.access_token.token.expose())?;
	let chat = ChatClient::new(
		identity.endpoint().as_str(),
		Arc::new(credential),
		ClientOptions::default(),
	)?;
	let participant = ChatParticipant::new(created.user.clone()).with_display_name("Demo user");
	let thread = chat
		.create_thread("Lunch plans", &[participant])
		.await?
		.chat_thread
		.ok_or_else(|| eyre!("Service created no thread."))?;
	let thread_client = chat.thread_client(&thread.id);

	println!("Created thread {} (`{}`).", thread.id, thread.topic);

	for text in ["Noodles?", "Dumplings?", "Both."] {
		let id = thread_client
			.send_message(&SendMessageOptions::new(text).with_sender_display_name("Demo user"))
			.await?;

		println!("Sent message {id}.");
	}

	let mut page = Some(thread_client.list_messages(Some(2), None).await?);

	while let Some(current) = page {
		for message in &current.value {
			let body = message.content.as_ref().and_then(|content| content.message.as_deref());

			println!("{} {:?}: {}", message.sequence_id, message.kind, body.unwrap_or("-"));
		}

		page = thread_client.next_page(&current).await?;
	}

	chat.delete_thread(&thread.id).await?;
	identity.delete_user(&created.user).await?;

	println!("Deleted thread {} and user {}.", thread.id, created.user);

	Ok(())
}
