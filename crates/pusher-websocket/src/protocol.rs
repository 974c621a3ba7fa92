//! Wire vocabulary: frame builders for egress, frame parsing for ingress.
//!
//! Outbound frames are assembled with `json!`; inbound frames are read as
//! `serde_json::Value` by key. The server encodes some `data` members as
//! JSON strings, so [`InboundFrame::decoded_data`] accepts both the inline
//! and the string-encoded form.

use serde_json::{json, Value};
use thiserror::Error;

pub const CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
pub const SERVER_ERROR: &str = "pusher:error";
pub const PING: &str = "pusher:ping";
pub const PONG: &str = "pusher:pong";
pub const SUBSCRIBE: &str = "pusher:subscribe";
pub const UNSUBSCRIBE: &str = "pusher:unsubscribe";
pub const SUBSCRIPTION_SUCCEEDED: &str = "pusher_internal:subscription_succeeded";
pub const MEMBER_ADDED: &str = "pusher_internal:member_added";
pub const MEMBER_REMOVED: &str = "pusher_internal:member_removed";

pub const PUSHER_PREFIX: &str = "pusher:";
pub const PUSHER_INTERNAL_PREFIX: &str = "pusher_internal:";
pub const PRIVATE_CHANNEL_PREFIX: &str = "private-";
pub const PRESENCE_CHANNEL_PREFIX: &str = "presence-";
pub const CLIENT_EVENT_PREFIX: &str = "client-";

#[derive(Error, Debug)]
pub enum FrameError {
	#[error("frame is not valid JSON: {0}")]
	Json(#[from] serde_json::Error),

	#[error("frame is missing the `{0}` field")]
	MissingField(&'static str),
}

/// Event names carrying the protocol prefixes are reserved for the server.
#[must_use]
pub fn is_reserved_event(event: &str) -> bool {
	event.starts_with(PUSHER_PREFIX) || event.starts_with(PUSHER_INTERNAL_PREFIX)
}

#[must_use]
pub fn ping_frame() -> String {
	json!({ "event": PING, "data": {} }).to_string()
}

#[must_use]
pub fn subscribe_frame(channel: &str, auth: Option<&str>, channel_data: Option<&str>) -> String {
	let mut data = json!({ "channel": channel });
	if let Some(auth) = auth {
		data["auth"] = json!(auth);
	}
	if let Some(channel_data) = channel_data {
		data["channel_data"] = json!(channel_data);
	}
	json!({ "event": SUBSCRIBE, "data": data }).to_string()
}

#[must_use]
pub fn unsubscribe_frame(channel: &str) -> String {
	json!({ "event": UNSUBSCRIBE, "data": { "channel": channel } }).to_string()
}

#[must_use]
pub fn client_event_frame(channel: &str, event: &str, data: &Value) -> String {
	json!({ "event": event, "channel": channel, "data": data }).to_string()
}

/// A parsed inbound frame: the `event` discriminator, the optional `channel`
/// it is addressed to, and the raw `data` member.
#[derive(Debug, Clone)]
pub struct InboundFrame {
	pub event: String,
	pub channel: Option<String>,
	pub data: Value,
}

impl InboundFrame {
	pub fn parse(text: &str) -> Result<Self, FrameError> {
		let value: Value = serde_json::from_str(text)?;
		let event = value
			.get("event")
			.and_then(Value::as_str)
			.ok_or(FrameError::MissingField("event"))?
			.to_string();
		let channel = value.get("channel").and_then(Value::as_str).map(str::to_string);
		let data = value.get("data").cloned().unwrap_or(Value::Null);

		Ok(Self { event, channel, data })
	}

	/// The `data` member as an object, re-parsing the string-encoded form.
	///
	/// Falls back to the raw value when the inner string is not JSON.
	#[must_use]
	pub fn decoded_data(&self) -> Value {
		match &self.data {
			Value::String(inner) => serde_json::from_str(inner).unwrap_or_else(|_| self.data.clone()),
			other => other.clone(),
		}
	}

	/// The `data` member as the string handed to event listeners.
	#[must_use]
	pub fn data_string(&self) -> String {
		match &self.data {
			Value::String(inner) => inner.clone(),
			other => other.to_string(),
		}
	}
}

/// Payload of `pusher:connection_established`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstablishedPayload {
	pub socket_id: String,
	pub activity_timeout: Option<u64>,
}

pub fn parse_established(frame: &InboundFrame) -> Result<EstablishedPayload, FrameError> {
	let data = frame.decoded_data();
	let socket_id = data
		.get("socket_id")
		.and_then(Value::as_str)
		.ok_or(FrameError::MissingField("socket_id"))?
		.to_string();
	let activity_timeout = data.get("activity_timeout").and_then(Value::as_u64);

	Ok(EstablishedPayload { socket_id, activity_timeout })
}

/// Extracts `(message, code)` from a `pusher:error` frame.
///
/// The server sends `code` as a number; listeners receive it as a string.
#[must_use]
pub fn parse_server_error(frame: &InboundFrame) -> (String, Option<String>) {
	let data = frame.decoded_data();
	let message = data.get("message").and_then(Value::as_str).map(str::to_string).unwrap_or_default();
	let code = match data.get("code") {
		Some(Value::Number(n)) => Some(n.to_string()),
		Some(Value::String(s)) => Some(s.clone()),
		_ => None,
	};

	(message, code)
}
