//! Chat service payloads.

// self
use crate::{
	_prelude::*,
	identity::{CommunicationUser, models::identifier},
};

/// One page of a listing plus the link to the next page.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
	/// Items on this page.
	#[serde(default = "Vec::new")]
	pub value: Vec<T>,
	/// Absolute URL of the next page; `None` on the last page.
	#[serde(default)]
	pub next_link: Option<String>,
}
impl<T> Page<T> {
	/// Returns `true` when another page follows.
	pub fn has_next(&self) -> bool {
		self.next_link.is_some()
	}
}

/// Per-item failure reported by batch operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatError {
	/// Service error code.
	pub code: String,
	/// Human-readable message.
	pub message: String,
	/// Offending input (typically a participant raw id).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target: Option<String>,
}

/// Thread member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParticipant {
	/// Participant identity.
	#[serde(rename = "communicationIdentifier", with = "identifier")]
	pub user: CommunicationUser,
	/// Name shown to other participants.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub display_name: Option<String>,
	/// Earliest message the participant can see.
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		with = "time::serde::rfc3339::option"
	)]
	pub share_history_time: Option<OffsetDateTime>,
}
impl ChatParticipant {
	/// Creates a participant without display name or history window.
	pub fn new(user: CommunicationUser) -> Self {
		Self { user, display_name: None, share_history_time: None }
	}

	/// Sets the display name.
	pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
		self.display_name = Some(display_name.into());

		self
	}

	/// Shares history starting at `time`.
	pub fn with_share_history_time(mut self, time: OffsetDateTime) -> Self {
		self.share_history_time = Some(time);

		self
	}
}

/// Thread metadata.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThreadProperties {
	/// Thread id.
	pub id: String,
	/// Thread topic.
	pub topic: String,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_on: OffsetDateTime,
	/// Creator identity.
	#[serde(
		default,
		rename = "createdByCommunicationIdentifier",
		deserialize_with = "identifier::option::deserialize"
	)]
	pub created_by: Option<CommunicationUser>,
	/// Deletion instant, for deleted threads.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub deleted_on: Option<OffsetDateTime>,
}

/// Result of [`ChatClient::create_thread`](crate::chat::ChatClient::create_thread).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatThreadResult {
	/// Created thread; absent when the service rejected the request wholesale.
	#[serde(default)]
	pub chat_thread: Option<ChatThreadProperties>,
	/// Participants that could not be added.
	#[serde(default)]
	pub invalid_participants: Vec<ChatError>,
}

/// Thread summary returned by thread listings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThreadItem {
	/// Thread id.
	pub id: String,
	/// Thread topic.
	pub topic: String,
	/// Deletion instant, for deleted threads.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub deleted_on: Option<OffsetDateTime>,
	/// Instant of the most recent message.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub last_message_received_on: Option<OffsetDateTime>,
}

/// Message kinds; user messages are `Text` or `Html`, the rest are system events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatMessageType {
	/// Plain text.
	#[default]
	Text,
	/// HTML content.
	Html,
	/// Topic change event.
	TopicUpdated,
	/// Participants joined.
	ParticipantAdded,
	/// Participants left or were removed.
	ParticipantRemoved,
	/// Kind this client does not know yet.
	#[serde(other)]
	Unknown,
}

/// Message body; which fields are set depends on [`ChatMessageType`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageContent {
	/// Text or HTML body.
	#[serde(default)]
	pub message: Option<String>,
	/// New topic, for topic updates.
	#[serde(default)]
	pub topic: Option<String>,
	/// Affected participants, for membership events.
	#[serde(default)]
	pub participants: Vec<ChatParticipant>,
	/// Who triggered a membership event.
	#[serde(
		default,
		rename = "initiatorCommunicationIdentifier",
		deserialize_with = "identifier::option::deserialize"
	)]
	pub initiator: Option<CommunicationUser>,
}

/// Chat message.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
	/// Message id.
	pub id: String,
	/// Message kind.
	#[serde(rename = "type")]
	pub kind: ChatMessageType,
	/// Position within the thread.
	pub sequence_id: String,
	/// Version, bumped on edits.
	pub version: String,
	/// Body.
	#[serde(default)]
	pub content: Option<ChatMessageContent>,
	/// Sender display name.
	#[serde(default)]
	pub sender_display_name: Option<String>,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_on: OffsetDateTime,
	/// Sender; absent for system messages.
	#[serde(
		default,
		rename = "senderCommunicationIdentifier",
		deserialize_with = "identifier::option::deserialize"
	)]
	pub sender: Option<CommunicationUser>,
	/// Deletion instant.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub deleted_on: Option<OffsetDateTime>,
	/// Last edit instant.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub edited_on: Option<OffsetDateTime>,
	/// Caller-defined metadata.
	#[serde(default)]
	pub metadata: HashMap<String, String>,
}

/// Inputs for [`ChatThreadClient::send_message`](crate::chat::ChatThreadClient::send_message).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageOptions {
	/// Message body.
	pub content: String,
	/// Sender display name shown with the message.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sender_display_name: Option<String>,
	/// Message kind; only `Text` and `Html` are accepted by the service.
	#[serde(rename = "type")]
	pub kind: ChatMessageType,
	/// Caller-defined metadata.
	#[serde(skip_serializing_if = "HashMap::is_empty")]
	pub metadata: HashMap<String, String>,
}
impl SendMessageOptions {
	/// Text message with `content`.
	pub fn new(content: impl Into<String>) -> Self {
		Self { content: content.into(), ..Default::default() }
	}

	/// Sets the sender display name.
	pub fn with_sender_display_name(mut self, name: impl Into<String>) -> Self {
		self.sender_display_name = Some(name.into());

		self
	}

	/// Sets the message kind.
	pub fn with_kind(mut self, kind: ChatMessageType) -> Self {
		self.kind = kind;

		self
	}

	/// Adds a metadata entry.
	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.metadata.insert(key.into(), value.into());

		self
	}
}

/// Inputs for [`ChatThreadClient::update_message`](crate::chat::ChatThreadClient::update_message).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessageOptions {
	/// Replacement body.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub content: Option<String>,
	/// Metadata entries to merge.
	#[serde(skip_serializing_if = "HashMap::is_empty")]
	pub metadata: HashMap<String, String>,
}
impl UpdateMessageOptions {
	/// Replaces the message body.
	pub fn with_content(mut self, content: impl Into<String>) -> Self {
		self.content = Some(content.into());

		self
	}

	/// Merges a metadata entry.
	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.metadata.insert(key.into(), value.into());

		self
	}
}

/// Read receipt for a message.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageReadReceipt {
	/// Reader.
	#[serde(rename = "senderCommunicationIdentifier", with = "identifier")]
	pub sender: CommunicationUser,
	/// Message that was read.
	pub chat_message_id: String,
	/// Read instant.
	#[serde(with = "time::serde::rfc3339")]
	pub read_on: OffsetDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateThreadRequest<'a> {
	pub(crate) topic: &'a str,
	pub(crate) participants: &'a [ChatParticipant],
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateTopicRequest<'a> {
	pub(crate) topic: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ParticipantsRequest<'a> {
	pub(crate) participants: &'a [ChatParticipant],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InvalidParticipantsResponse {
	#[serde(default)]
	pub(crate) invalid_participants: Vec<ChatError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendMessageResponse {
	pub(crate) id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TypingRequest<'a> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub(crate) sender_display_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReadReceiptRequest<'a> {
	pub(crate) chat_message_id: &'a str,
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn participants_use_identifier_envelope() {
		let participant = ChatParticipant::new(CommunicationUser::new("8:acs:p"))
			.with_display_name("Pat")
			.with_share_history_time(macros::datetime!(2023-01-02 03:04:05 UTC));
		let json = serde_json::to_value(&participant).expect("Participant should serialize.");

		assert_eq!(
			json,
			serde_json::json!({
				"communicationIdentifier": {
					"rawId": "8:acs:p",
					"communicationUser": { "id": "8:acs:p" }
				},
				"displayName": "Pat",
				"shareHistoryTime": "2023-01-02T03:04:05Z"
			})
		);
		assert_eq!(
			serde_json::from_value::<ChatParticipant>(json).expect("Participant should decode."),
			participant
		);
	}

	#[test]
	fn system_messages_decode_with_optional_fields() {
		let message: ChatMessage = serde_json::from_str(
			r#"{
				"id": "1",
				"type": "participantAdded",
				"sequenceId": "2",
				"version": "1",
				"createdOn": "2023-01-02T03:04:05Z",
				"content": {
					"participants": [{ "communicationIdentifier": { "rawId": "8:acs:p" } }],
					"initiatorCommunicationIdentifier": { "communicationUser": { "id": "8:acs:i" } }
				}
			}"#,
		)
		.expect("System message should decode.");
		let content = message.content.expect("Content should be present.");

		assert_eq!(message.kind, ChatMessageType::ParticipantAdded);
		assert!(message.sender.is_none());
		assert_eq!(content.participants[0].user, CommunicationUser::new("8:acs:p"));
		assert_eq!(content.initiator, Some(CommunicationUser::new("8:acs:i")));
	}

	#[test]
	fn unknown_message_kinds_are_tolerated() {
		let kind: ChatMessageType =
			serde_json::from_str(r#""somethingNew""#).expect("Unknown kinds should decode.");

		assert_eq!(kind, ChatMessageType::Unknown);
	}

	#[test]
	fn send_options_skip_empty_fields() {
		assert_eq!(
			serde_json::to_string(&SendMessageOptions::new("hi")).expect("Should serialize."),
			r#"{"content":"hi","type":"text"}"#
		);
		assert_eq!(
			serde_json::to_string(&UpdateMessageOptions::default().with_content("edited"))
				.expect("Should serialize."),
			r#"{"content":"edited"}"#
		);
	}
}
