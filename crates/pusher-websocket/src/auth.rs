use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
#[error("channel authorization failed: {message}")]
pub struct AuthorizationError {
	pub message: String,
}

impl AuthorizationError {
	#[must_use]
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}
}

/// Proves to the server that this socket may subscribe to a private or
/// presence channel.
///
/// Called on the executor immediately before the subscribe frame is emitted,
/// with the socket id of the current connection. Implementations that reach
/// over the network must not block the executor indefinitely.
pub trait Authorizer: Send + Sync {
	fn authorize(&self, channel: &str, socket_id: &str) -> Result<String, AuthorizationError>;
}

/// Parsed authorizer response: `{"auth":"<key>:<hmac>","channel_data":...}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthResponse {
	pub auth: String,
	#[serde(default)]
	pub channel_data: Option<String>,
}

impl AuthResponse {
	pub fn parse(raw: &str) -> Result<Self, AuthorizationError> {
		serde_json::from_str(raw).map_err(|e| AuthorizationError::new(format!("unparseable authorizer response: {e}")))
	}

	/// The local member id carried in `channel_data.user_id`, if any.
	#[must_use]
	pub fn user_id(&self) -> Option<String> {
		let channel_data = self.channel_data.as_deref()?;
		let value: Value = serde_json::from_str(channel_data).ok()?;
		match value.get("user_id") {
			Some(Value::String(id)) => Some(id.clone()),
			Some(Value::Number(id)) => Some(id.to_string()),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_auth_only() {
		let response = AuthResponse::parse(r#"{"auth":"key:deadbeef"}"#).unwrap();

		assert_eq!(response.auth, "key:deadbeef");
		assert_eq!(response.channel_data, None);
		assert_eq!(response.user_id(), None);
	}

	#[test]
	fn test_parse_with_channel_data() {
		let response = AuthResponse::parse(r#"{"auth":"key:deadbeef","channel_data":"{\"user_id\":\"me\",\"user_info\":{\"name\":\"M\"}}"}"#).unwrap();

		assert_eq!(response.channel_data.as_deref(), Some(r#"{"user_id":"me","user_info":{"name":"M"}}"#));
		assert_eq!(response.user_id().as_deref(), Some("me"));
	}

	#[test]
	fn test_numeric_user_id_is_stringified() {
		let response = AuthResponse::parse(r#"{"auth":"k:s","channel_data":"{\"user_id\":7}"}"#).unwrap();

		assert_eq!(response.user_id().as_deref(), Some("7"));
	}

	#[test]
	fn test_parse_rejects_garbage() {
		assert!(AuthResponse::parse("not json").is_err());
		assert!(AuthResponse::parse(r#"{"channel_data":"{}"}"#).is_err());
	}
}
