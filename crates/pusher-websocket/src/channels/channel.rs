use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::listener::ChannelEventListener;
use super::presence::MemberRoster;
use super::state::ChannelState;
use crate::auth::AuthorizationError;
use crate::protocol::InboundFrame;

/// Channel flavor, determining the subscribe handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
	Public,
	Private,
	Presence,
}

/// Variant payload: presence channels carry the member roster.
pub(crate) enum ChannelKind {
	Public,
	Private,
	Presence(MemberRoster),
}

/// A deferred listener callback, run only after registry locks are released.
pub(crate) type Callback = Box<dyn FnOnce() + Send>;

/// One named subscription: its lifecycle state, the channel-wide listener
/// and the per-event-name binding table.
pub(crate) struct Channel {
	name: String,
	kind: ChannelKind,
	state: ChannelState,
	listener: Option<Arc<ChannelEventListener>>,
	bindings: HashMap<String, Vec<Arc<ChannelEventListener>>>,
	catch_all: Vec<Arc<ChannelEventListener>>,
}

impl Channel {
	/// Create the channel and wire the subscribe-time listener: to each
	/// named event, or to the channel as a whole when no names are given.
	pub(crate) fn new(channel_type: ChannelType, name: &str, listener: Option<Arc<ChannelEventListener>>, events: &[&str]) -> Self {
		let kind = match channel_type {
			ChannelType::Public => ChannelKind::Public,
			ChannelType::Private => ChannelKind::Private,
			ChannelType::Presence => ChannelKind::Presence(MemberRoster::new()),
		};
		let mut channel = Self {
			name: name.to_string(),
			kind,
			state: ChannelState::Initial,
			listener: listener.clone(),
			bindings: HashMap::new(),
			catch_all: Vec::new(),
		};
		if let Some(listener) = listener {
			if events.is_empty() {
				channel.catch_all.push(listener);
			} else {
				for event in events {
					channel.bind(event, Arc::clone(&listener));
				}
			}
		}
		channel
	}

	pub(crate) fn channel_type(&self) -> ChannelType {
		match self.kind {
			ChannelKind::Public => ChannelType::Public,
			ChannelKind::Private => ChannelType::Private,
			ChannelKind::Presence(_) => ChannelType::Presence,
		}
	}

	pub(crate) fn state(&self) -> ChannelState {
		self.state
	}

	pub(crate) fn set_state(&mut self, state: ChannelState) {
		self.state = state;
	}

	pub(crate) fn is_active(&self) -> bool {
		self.state.is_active()
	}

	pub(crate) fn roster(&self) -> Option<&MemberRoster> {
		match &self.kind {
			ChannelKind::Presence(roster) => Some(roster),
			_ => None,
		}
	}

	pub(crate) fn roster_mut(&mut self) -> Option<&mut MemberRoster> {
		match &mut self.kind {
			ChannelKind::Presence(roster) => Some(roster),
			_ => None,
		}
	}

	pub(crate) fn bind(&mut self, event: &str, listener: Arc<ChannelEventListener>) {
		let bound = self.bindings.entry(event.to_string()).or_default();
		if !bound.iter().any(|existing| Arc::ptr_eq(existing, &listener)) {
			bound.push(listener);
		}
	}

	pub(crate) fn unbind(&mut self, event: &str, listener: &Arc<ChannelEventListener>) -> bool {
		let Some(bound) = self.bindings.get_mut(event) else {
			return false;
		};
		let Some(position) = bound.iter().position(|existing| Arc::ptr_eq(existing, listener)) else {
			return false;
		};
		bound.remove(position);
		if bound.is_empty() {
			self.bindings.remove(event);
		}
		true
	}

	pub(crate) fn handle_subscription_succeeded(&mut self, frame: &InboundFrame) -> Vec<Callback> {
		if self.state != ChannelState::SubscribeSent {
			debug!(channel = %self.name, state = ?self.state, "ignoring subscription ack");
			return Vec::new();
		}
		self.state = ChannelState::Subscribed;
		debug!(channel = %self.name, "subscribed");

		let mut callbacks = Vec::new();
		if let Some(listener) = self.listener.clone() {
			let name = self.name.clone();
			callbacks.push(Box::new(move || listener.notify_subscription_succeeded(&name)) as Callback);
		}

		if let ChannelKind::Presence(roster) = &mut self.kind {
			let data = frame.decoded_data();
			match data.get("presence").and_then(|p| p.get("hash")).and_then(Value::as_object) {
				Some(hash) => roster.replace_all(hash),
				None => warn!(channel = %self.name, "subscription ack is missing the presence hash"),
			}
			if let Some(listener) = self.listener.clone() {
				let name = self.name.clone();
				let members = roster.members();
				callbacks.push(Box::new(move || listener.notify_users_information_received(&name, &members)) as Callback);
			}
		}
		callbacks
	}

	pub(crate) fn handle_member_added(&mut self, frame: &InboundFrame) -> Vec<Callback> {
		let data = frame.decoded_data();
		let Some(user_id) = member_id(&data) else {
			warn!(channel = %self.name, "member_added frame is missing user_id");
			return Vec::new();
		};
		let info = data.get("user_info").cloned().unwrap_or(Value::Null);

		let listener = self.listener.clone();
		let name = self.name.clone();
		let Some(roster) = self.roster_mut() else {
			return Vec::new();
		};
		let member = roster.insert(user_id, info);

		match listener {
			Some(listener) => vec![Box::new(move || listener.notify_user_added(&name, &member)) as Callback],
			None => Vec::new(),
		}
	}

	pub(crate) fn handle_member_removed(&mut self, frame: &InboundFrame) -> Vec<Callback> {
		let data = frame.decoded_data();
		let Some(user_id) = member_id(&data) else {
			warn!(channel = %self.name, "member_removed frame is missing user_id");
			return Vec::new();
		};

		let listener = self.listener.clone();
		let name = self.name.clone();
		let Some(roster) = self.roster_mut() else {
			return Vec::new();
		};
		let Some(member) = roster.remove(&user_id) else {
			return Vec::new();
		};

		match listener {
			Some(listener) => vec![Box::new(move || listener.notify_user_removed(&name, &member)) as Callback],
			None => Vec::new(),
		}
	}

	/// Dispatch a user event to every listener bound to its name, plus the
	/// whole-channel bindings.
	pub(crate) fn handle_event(&self, frame: &InboundFrame) -> Vec<Callback> {
		let mut targets: Vec<Arc<ChannelEventListener>> = Vec::new();
		for listener in self.bindings.get(&frame.event).into_iter().flatten().chain(self.catch_all.iter()) {
			if !targets.iter().any(|seen| Arc::ptr_eq(seen, listener)) {
				targets.push(Arc::clone(listener));
			}
		}

		let event = frame.event.clone();
		let data = frame.data_string();
		targets
			.into_iter()
			.map(|listener| {
				let event = event.clone();
				let data = data.clone();
				Box::new(move || listener.notify_event(&event, &data)) as Callback
			})
			.collect()
	}

	pub(crate) fn mark_failed(&mut self, cause: &AuthorizationError) -> Vec<Callback> {
		self.state = ChannelState::Failed;
		match self.listener.clone() {
			Some(listener) => {
				let cause = cause.clone();
				vec![Box::new(move || listener.notify_authentication_failure(&cause.message, &cause)) as Callback]
			}
			None => Vec::new(),
		}
	}
}

/// `user_id` arrives as a string, but some backends emit numbers.
fn member_id(data: &Value) -> Option<String> {
	match data.get("user_id") {
		Some(Value::String(id)) => Some(id.clone()),
		Some(Value::Number(id)) => Some(id.to_string()),
		_ => None,
	}
}
