use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, error};

use super::channel::{Callback, Channel, ChannelType};
use super::listener::ChannelEventListener;
use super::presence::Member;
use super::state::ChannelState;
use crate::auth::{AuthResponse, AuthorizationError, Authorizer};
use crate::connection::core::ConnectionCore;
use crate::connection::state::{ConnectionState, ConnectionStateChange};
use crate::errors::{PusherError, Result};
use crate::executor::Executor;
use crate::lock;
use crate::protocol::{self, InboundFrame};

/// Sole owner of all channels, indexed by name.
///
/// Routes inbound frames to the right channel, emits the subscribe and
/// unsubscribe frames, and keeps channel state consistent with the
/// connection: subscribes queued while offline are replayed, in insertion
/// order, on the next transition to connected.
pub struct ChannelRegistry {
	inner: Mutex<RegistryInner>,
	connection: Arc<ConnectionCore>,
	executor: Arc<dyn Executor>,
	authorizer: Option<Arc<dyn Authorizer>>,
}

struct RegistryInner {
	channels: HashMap<String, Channel>,
	order: Vec<String>,
}

impl ChannelRegistry {
	pub(crate) fn new(connection: Arc<ConnectionCore>, executor: Arc<dyn Executor>, authorizer: Option<Arc<dyn Authorizer>>) -> Arc<Self> {
		Arc::new(Self {
			inner: Mutex::new(RegistryInner {
				channels: HashMap::new(),
				order: Vec::new(),
			}),
			connection,
			executor,
			authorizer,
		})
	}

	/// Register a subscription and, once connected, dispatch its subscribe
	/// frame. Duplicate detection only considers active entries, so a dead
	/// (unsubscribed or failed) channel of the same name is replaced.
	pub(crate) fn subscribe(self: &Arc<Self>, channel_type: ChannelType, name: &str, listener: Option<Arc<ChannelEventListener>>, events: &[&str]) -> Result<()> {
		validate_channel_name(channel_type, name)?;
		for event in events {
			validate_event_name(event)?;
		}

		{
			let mut inner = lock(&self.inner);
			if let Some(existing) = inner.channels.get(name) {
				if existing.is_active() {
					return Err(PusherError::argument(format!("already subscribed to channel {name}")));
				}
				inner.channels.remove(name);
				inner.order.retain(|queued| queued != name);
			}
			inner.order.push(name.to_string());
			inner.channels.insert(name.to_string(), Channel::new(channel_type, name, listener, events));
		}
		debug!(channel = name, kind = ?channel_type, "subscription registered");

		let registry = Arc::clone(self);
		self.executor.submit(Box::new(move || registry.flush_pending()));
		Ok(())
	}

	/// Drop a subscription and emit the unsubscribe frame. Requires a live
	/// connection; unknown names are ignored.
	pub(crate) fn unsubscribe(self: &Arc<Self>, name: &str) -> Result<()> {
		let connection_state = self.connection.state();
		if connection_state != ConnectionState::Connected {
			return Err(PusherError::state(format!(
				"cannot unsubscribe from {name} while the connection is {connection_state}"
			)));
		}

		let removed = {
			let mut inner = lock(&self.inner);
			inner.order.retain(|queued| queued != name);
			inner.channels.remove(name)
		};
		if removed.is_none() {
			debug!(channel = name, "unsubscribe ignored, no such subscription");
			return Ok(());
		}

		let registry = Arc::clone(self);
		let frame = protocol::unsubscribe_frame(name);
		self.executor.submit(Box::new(move || registry.connection.send_now(frame)));
		Ok(())
	}

	/// Send a client event on a subscribed private or presence channel.
	pub(crate) fn trigger(self: &Arc<Self>, channel_name: &str, event: &str, data: Value) -> Result<()> {
		if !event.starts_with(protocol::CLIENT_EVENT_PREFIX) {
			return Err(PusherError::argument(format!(
				"client event names must begin with {}",
				protocol::CLIENT_EVENT_PREFIX
			)));
		}
		{
			let inner = lock(&self.inner);
			let Some(channel) = inner.channels.get(channel_name) else {
				return Err(PusherError::argument(format!("no subscription named {channel_name}")));
			};
			if channel.channel_type() == ChannelType::Public {
				return Err(PusherError::argument("client events require a private or presence channel"));
			}
			if channel.state() != ChannelState::Subscribed {
				return Err(PusherError::state(format!("channel {channel_name} is not subscribed")));
			}
		}

		let registry = Arc::clone(self);
		let frame = protocol::client_event_frame(channel_name, event, &data);
		self.executor.submit(Box::new(move || registry.connection.send_now(frame)));
		Ok(())
	}

	pub(crate) fn bind(&self, channel_name: &str, event: &str, listener: Arc<ChannelEventListener>) -> Result<()> {
		validate_event_name(event)?;
		let mut inner = lock(&self.inner);
		let Some(channel) = inner.channels.get_mut(channel_name) else {
			return Err(PusherError::argument(format!("no subscription named {channel_name}")));
		};
		channel.bind(event, listener);
		Ok(())
	}

	pub(crate) fn unbind(&self, channel_name: &str, event: &str, listener: &Arc<ChannelEventListener>) -> Result<bool> {
		validate_event_name(event)?;
		let mut inner = lock(&self.inner);
		let Some(channel) = inner.channels.get_mut(channel_name) else {
			return Err(PusherError::argument(format!("no subscription named {channel_name}")));
		};
		Ok(channel.unbind(event, listener))
	}

	pub(crate) fn channel_state(&self, name: &str) -> Option<ChannelState> {
		lock(&self.inner).channels.get(name).map(Channel::state)
	}

	pub(crate) fn members(&self, name: &str) -> Option<Vec<Member>> {
		lock(&self.inner).channels.get(name).and_then(Channel::roster).map(super::presence::MemberRoster::members)
	}

	pub(crate) fn me(&self, name: &str) -> Option<Member> {
		lock(&self.inner).channels.get(name).and_then(Channel::roster).and_then(super::presence::MemberRoster::me)
	}

	/// Connection transitions drive channel state: connected replays the
	/// pending queue, a clean disconnect retires every active channel, and
	/// a dropped connection re-queues live channels for the next connect.
	pub(crate) fn on_connection_state_change(&self, change: &ConnectionStateChange) {
		match change.current {
			ConnectionState::Connected => self.flush_pending(),
			ConnectionState::Disconnecting => {
				let mut inner = lock(&self.inner);
				for channel in inner.channels.values_mut() {
					if channel.is_active() {
						channel.set_state(ChannelState::Unsubscribed);
					}
				}
			}
			ConnectionState::Disconnected => {
				let mut inner = lock(&self.inner);
				for channel in inner.channels.values_mut() {
					if matches!(channel.state(), ChannelState::SubscribeSent | ChannelState::Subscribed) {
						channel.set_state(ChannelState::Initial);
					}
				}
			}
			ConnectionState::Connecting => {}
		}
	}

	/// Route one inbound frame to the channel it names. Frames for unknown
	/// channels are dropped.
	pub(crate) fn on_message(&self, frame: &InboundFrame) {
		let Some(channel_name) = frame.channel.as_deref() else { return };
		let callbacks: Vec<Callback> = {
			let mut inner = lock(&self.inner);
			let Some(channel) = inner.channels.get_mut(channel_name) else {
				debug!(channel = channel_name, event = %frame.event, "dropping frame for unknown channel");
				return;
			};
			match frame.event.as_str() {
				protocol::SUBSCRIPTION_SUCCEEDED => channel.handle_subscription_succeeded(frame),
				protocol::MEMBER_ADDED => channel.handle_member_added(frame),
				protocol::MEMBER_REMOVED => channel.handle_member_removed(frame),
				event if protocol::is_reserved_event(event) => {
					debug!(channel = channel_name, event, "ignoring reserved event");
					Vec::new()
				}
				_ => channel.handle_event(frame),
			}
		};
		for callback in callbacks {
			callback();
		}
	}

	fn flush_pending(&self) {
		if self.connection.state() != ConnectionState::Connected {
			debug!("not connected, subscribe frames stay queued");
			return;
		}
		let Some(socket_id) = self.connection.socket_id() else {
			return;
		};

		let pending: Vec<String> = {
			let inner = lock(&self.inner);
			inner
				.order
				.iter()
				.filter(|name| inner.channels.get(*name).is_some_and(|channel| channel.state() == ChannelState::Initial))
				.cloned()
				.collect()
		};
		for name in pending {
			self.send_subscribe(&name, &socket_id);
		}
	}

	/// Authorize (for private and presence channels) and dispatch one
	/// subscribe frame. The authorizer runs here, on the executor, right
	/// before the frame goes out.
	fn send_subscribe(&self, name: &str, socket_id: &str) {
		let channel_type = {
			let inner = lock(&self.inner);
			match inner.channels.get(name) {
				Some(channel) => channel.channel_type(),
				None => return,
			}
		};

		let frame = match channel_type {
			ChannelType::Public => protocol::subscribe_frame(name, None, None),
			ChannelType::Private | ChannelType::Presence => match self.authorize(name, socket_id, channel_type) {
				Ok((auth, channel_data)) => protocol::subscribe_frame(name, Some(&auth), channel_data.as_deref()),
				Err(cause) => {
					self.fail_authorization(name, &cause);
					return;
				}
			},
		};

		self.connection.send_now(frame);
		{
			let mut inner = lock(&self.inner);
			if let Some(channel) = inner.channels.get_mut(name) {
				channel.set_state(ChannelState::SubscribeSent);
			}
		}
		debug!(channel = name, "subscribe frame dispatched");
	}

	fn authorize(&self, name: &str, socket_id: &str, channel_type: ChannelType) -> std::result::Result<(String, Option<String>), AuthorizationError> {
		let Some(authorizer) = &self.authorizer else {
			return Err(AuthorizationError::new("no authorizer configured"));
		};
		let response = AuthResponse::parse(&authorizer.authorize(name, socket_id)?)?;

		if channel_type == ChannelType::Presence {
			if response.channel_data.is_none() {
				return Err(AuthorizationError::new("authorizer response is missing channel_data"));
			}
			if let Some(user_id) = response.user_id() {
				let mut inner = lock(&self.inner);
				if let Some(roster) = inner.channels.get_mut(name).and_then(Channel::roster_mut) {
					roster.set_my_id(user_id);
				}
			}
		}
		Ok((response.auth, response.channel_data))
	}

	fn fail_authorization(&self, name: &str, cause: &AuthorizationError) {
		error!(channel = name, error = %cause, "channel authorization failed");
		let callbacks = {
			let mut inner = lock(&self.inner);
			inner.channels.get_mut(name).map(|channel| channel.mark_failed(cause)).unwrap_or_default()
		};
		for callback in callbacks {
			callback();
		}
	}
}

fn validate_channel_name(channel_type: ChannelType, name: &str) -> Result<()> {
	if name.is_empty() {
		return Err(PusherError::argument("channel name cannot be empty"));
	}
	let private = name.starts_with(protocol::PRIVATE_CHANNEL_PREFIX);
	let presence = name.starts_with(protocol::PRESENCE_CHANNEL_PREFIX);
	match channel_type {
		ChannelType::Public if private || presence => Err(PusherError::argument(format!(
			"{name} is not a public channel, use the matching subscribe variant"
		))),
		ChannelType::Private if !private => Err(PusherError::argument(format!(
			"private channel names must begin with {}",
			protocol::PRIVATE_CHANNEL_PREFIX
		))),
		ChannelType::Presence if !presence => Err(PusherError::argument(format!(
			"presence channel names must begin with {}",
			protocol::PRESENCE_CHANNEL_PREFIX
		))),
		_ => Ok(()),
	}
}

fn validate_event_name(event: &str) -> Result<()> {
	if protocol::is_reserved_event(event) {
		return Err(PusherError::argument(format!("event name {event} uses a reserved prefix")));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_public_names_reject_reserved_prefixes() {
		assert!(validate_channel_name(ChannelType::Public, "my-channel").is_ok());
		assert!(validate_channel_name(ChannelType::Public, "private-ch").is_err());
		assert!(validate_channel_name(ChannelType::Public, "presence-ch").is_err());
	}

	#[test]
	fn test_private_names_require_prefix() {
		assert!(validate_channel_name(ChannelType::Private, "private-ch").is_ok());
		assert!(validate_channel_name(ChannelType::Private, "my-channel").is_err());
	}

	#[test]
	fn test_presence_names_require_prefix() {
		assert!(validate_channel_name(ChannelType::Presence, "presence-room").is_ok());
		assert!(validate_channel_name(ChannelType::Presence, "private-room").is_err());
	}

	#[test]
	fn test_empty_name_is_rejected() {
		assert!(validate_channel_name(ChannelType::Public, "").is_err());
	}

	#[test]
	fn test_reserved_event_names_are_rejected() {
		assert!(validate_event_name("my-event").is_ok());
		assert!(validate_event_name("pusher:ping").is_err());
		assert!(validate_event_name("pusher_internal:member_added").is_err());
	}
}
