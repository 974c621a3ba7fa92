use std::fmt;
use std::sync::Arc;

use super::state::ConnectionStateChange;

type StateChangeFn = dyn Fn(&ConnectionStateChange) + Send + Sync;
type ErrorFn = dyn Fn(&ErrorEvent) + Send + Sync;

/// An error delivered to connection listeners.
///
/// `code` is only present for server-sent error frames; `cause` only when a
/// transport or send failure carried an underlying error.
#[derive(Clone)]
pub struct ErrorEvent {
	pub message: String,
	pub code: Option<String>,
	pub cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ErrorEvent {
	#[must_use]
	pub fn new(message: impl Into<String>, code: Option<String>, cause: Option<Arc<dyn std::error::Error + Send + Sync>>) -> Self {
		Self {
			message: message.into(),
			code,
			cause,
		}
	}
}

impl fmt::Debug for ErrorEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ErrorEvent")
			.field("message", &self.message)
			.field("code", &self.code)
			.field("cause", &self.cause.as_ref().map(std::string::ToString::to_string))
			.finish()
	}
}

/// Capability record for connection callbacks.
///
/// Each slot is optional; the dispatcher invokes a slot only when present.
/// Listeners are bound by `Arc` identity, so keep the same `Arc` around to
/// unbind later.
#[derive(Default)]
pub struct ConnectionEventListener {
	state_change: Option<Box<StateChangeFn>>,
	error: Option<Box<ErrorFn>>,
}

impl ConnectionEventListener {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn on_state_change(mut self, handler: impl Fn(&ConnectionStateChange) + Send + Sync + 'static) -> Self {
		self.state_change = Some(Box::new(handler));
		self
	}

	#[must_use]
	pub fn on_error(mut self, handler: impl Fn(&ErrorEvent) + Send + Sync + 'static) -> Self {
		self.error = Some(Box::new(handler));
		self
	}

	pub(crate) fn notify_state_change(&self, change: &ConnectionStateChange) {
		if let Some(handler) = &self.state_change {
			handler(change);
		}
	}

	pub(crate) fn notify_error(&self, event: &ErrorEvent) {
		if let Some(handler) = &self.error {
			handler(event);
		}
	}
}
