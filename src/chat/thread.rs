//! Operations scoped to a single chat thread.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	chat::{self, models::*},
	client::ServiceClient,
	http::Request,
	identity::{CommunicationUser, models::identifier},
};

const MERGE_PATCH: &str = "application/merge-patch+json";

/// Client bound to one thread.
///
/// Obtained from [`ChatClient::thread_client`](crate::chat::ChatClient::thread_client).
#[derive(Clone, Debug)]
pub struct ChatThreadClient {
	service: ServiceClient,
	thread_id: String,
}
impl ChatThreadClient {
	pub(crate) fn new(service: ServiceClient, thread_id: String) -> Self {
		Self { service, thread_id }
	}

	/// Thread this client operates on.
	pub fn thread_id(&self) -> &str {
		&self.thread_id
	}

	fn request(&self, method: Method, tail: &[&str]) -> Request {
		let mut segments = vec!["chat", "threads", self.thread_id.as_str()];

		segments.extend_from_slice(tail);

		self.service.request(method, &segments)
	}

	/// Fetches thread metadata.
	pub async fn properties(&self) -> Result<ChatThreadProperties> {
		self.service.json("get_properties", self.request(Method::GET, &[])).await
	}

	/// Changes the thread topic.
	pub async fn update_topic(&self, topic: &str) -> Result<()> {
		let request = self
			.request(Method::PATCH, &[])
			.with_json(&UpdateTopicRequest { topic })?
			.with_header("content-type", MERGE_PATCH)?;

		self.service.empty("update_topic", request).await
	}

	/// Posts a message and returns its id.
	pub async fn send_message(&self, options: &SendMessageOptions) -> Result<String> {
		let request = self.request(Method::POST, &["messages"]).with_json(options)?;
		let response: SendMessageResponse = self.service.json("send_message", request).await?;

		Ok(response.id)
	}

	/// Fetches one message.
	pub async fn get_message(&self, message_id: &str) -> Result<ChatMessage> {
		let request = self.request(Method::GET, &["messages", message_id]);

		self.service.json("get_message", request).await
	}

	/// Lists messages, newest first, optionally only those since `start_time`.
	pub async fn list_messages(
		&self,
		max_page_size: Option<u32>,
		start_time: Option<OffsetDateTime>,
	) -> Result<Page<ChatMessage>> {
		let request = self.request(Method::GET, &["messages"]);
		let request = chat::with_paging(request, max_page_size, start_time, None)?;

		self.service.json("list_messages", request).await
	}

	/// Edits a message's content or metadata.
	pub async fn update_message(
		&self,
		message_id: &str,
		options: &UpdateMessageOptions,
	) -> Result<()> {
		let request = self
			.request(Method::PATCH, &["messages", message_id])
			.with_json(options)?
			.with_header("content-type", MERGE_PATCH)?;

		self.service.empty("update_message", request).await
	}

	/// Deletes a message.
	pub async fn delete_message(&self, message_id: &str) -> Result<()> {
		let request = self.request(Method::DELETE, &["messages", message_id]);

		self.service.empty("delete_message", request).await
	}

	/// Adds `participants`, returning the ones the service rejected.
	pub async fn add_participants(
		&self,
		participants: &[ChatParticipant],
	) -> Result<Vec<ChatError>> {
		let request = self
			.request(Method::POST, &["participants", ":add"])
			.with_json(&ParticipantsRequest { participants })?;
		let response: InvalidParticipantsResponse =
			self.service.json("add_participants", request).await?;

		Ok(response.invalid_participants)
	}

	/// Lists participants.
	pub async fn list_participants(
		&self,
		max_page_size: Option<u32>,
		skip: Option<u32>,
	) -> Result<Page<ChatParticipant>> {
		let request = self.request(Method::GET, &["participants"]);
		let request = chat::with_paging(request, max_page_size, None, skip)?;

		self.service.json("list_participants", request).await
	}

	/// Removes `user` from the thread.
	pub async fn remove_participant(&self, user: &CommunicationUser) -> Result<()> {
		let request = self
			.request(Method::POST, &["participants", ":remove"])
			.with_json(&identifier::wire(user))?;

		self.service.empty("remove_participant", request).await
	}

	/// Signals that the user is typing.
	pub async fn send_typing_notification(&self, sender_display_name: Option<&str>) -> Result<()> {
		let request = self
			.request(Method::POST, &["typing"])
			.with_json(&TypingRequest { sender_display_name })?;

		self.service.empty("send_typing_notification", request).await
	}

	/// Marks `message_id` (and everything before it) as read.
	pub async fn send_read_receipt(&self, message_id: &str) -> Result<()> {
		let request = self
			.request(Method::POST, &["readReceipts"])
			.with_json(&ReadReceiptRequest { chat_message_id: message_id })?;

		self.service.empty("send_read_receipt", request).await
	}

	/// Lists read receipts.
	pub async fn list_read_receipts(
		&self,
		max_page_size: Option<u32>,
		skip: Option<u32>,
	) -> Result<Page<ChatMessageReadReceipt>> {
		let request = self.request(Method::GET, &["readReceipts"]);
		let request = chat::with_paging(request, max_page_size, None, skip)?;

		self.service.json("list_read_receipts", request).await
	}

	/// Fetches the page after `page`, or `None` on the last page.
	pub async fn next_page<T>(&self, page: &Page<T>) -> Result<Option<Page<T>>>
	where
		T: DeserializeOwned,
	{
		chat::next_page(&self.service, page).await
	}
}
