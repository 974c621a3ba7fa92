use crate::auth::AuthorizationError;

use super::presence::Member;

type EventFn = dyn Fn(&str, &str) + Send + Sync;
type SubscribedFn = dyn Fn(&str) + Send + Sync;
type AuthFailureFn = dyn Fn(&str, &AuthorizationError) + Send + Sync;
type UsersFn = dyn Fn(&str, &[Member]) + Send + Sync;
type MemberFn = dyn Fn(&str, &Member) + Send + Sync;

/// Capability record for channel callbacks.
///
/// One listener value carries optional slots for the public, private and
/// presence capabilities; the dispatcher invokes a slot only when present.
/// `on_event` receives `(event_name, data_json)`; the presence slots
/// receive the channel name plus the member(s) involved.
#[derive(Default)]
pub struct ChannelEventListener {
	event: Option<Box<EventFn>>,
	subscription_succeeded: Option<Box<SubscribedFn>>,
	authentication_failure: Option<Box<AuthFailureFn>>,
	users_information_received: Option<Box<UsersFn>>,
	user_added: Option<Box<MemberFn>>,
	user_removed: Option<Box<MemberFn>>,
}

impl ChannelEventListener {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn on_event(mut self, handler: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
		self.event = Some(Box::new(handler));
		self
	}

	#[must_use]
	pub fn on_subscription_succeeded(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
		self.subscription_succeeded = Some(Box::new(handler));
		self
	}

	#[must_use]
	pub fn on_authentication_failure(mut self, handler: impl Fn(&str, &AuthorizationError) + Send + Sync + 'static) -> Self {
		self.authentication_failure = Some(Box::new(handler));
		self
	}

	#[must_use]
	pub fn on_users_information_received(mut self, handler: impl Fn(&str, &[Member]) + Send + Sync + 'static) -> Self {
		self.users_information_received = Some(Box::new(handler));
		self
	}

	#[must_use]
	pub fn on_user_added(mut self, handler: impl Fn(&str, &Member) + Send + Sync + 'static) -> Self {
		self.user_added = Some(Box::new(handler));
		self
	}

	#[must_use]
	pub fn on_user_removed(mut self, handler: impl Fn(&str, &Member) + Send + Sync + 'static) -> Self {
		self.user_removed = Some(Box::new(handler));
		self
	}

	pub(crate) fn notify_event(&self, event: &str, data: &str) {
		if let Some(handler) = &self.event {
			handler(event, data);
		}
	}

	pub(crate) fn notify_subscription_succeeded(&self, channel: &str) {
		if let Some(handler) = &self.subscription_succeeded {
			handler(channel);
		}
	}

	pub(crate) fn notify_authentication_failure(&self, message: &str, cause: &AuthorizationError) {
		if let Some(handler) = &self.authentication_failure {
			handler(message, cause);
		}
	}

	pub(crate) fn notify_users_information_received(&self, channel: &str, members: &[Member]) {
		if let Some(handler) = &self.users_information_received {
			handler(channel, members);
		}
	}

	pub(crate) fn notify_user_added(&self, channel: &str, member: &Member) {
		if let Some(handler) = &self.user_added {
			handler(channel, member);
		}
	}

	pub(crate) fn notify_user_removed(&self, channel: &str, member: &Member) {
		if let Some(handler) = &self.user_removed {
			handler(channel, member);
		}
	}
}
