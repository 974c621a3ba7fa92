use std::sync::Arc;

use serde_json::Value;

use crate::channels::registry::ChannelRegistry;
use crate::channels::{ChannelEventListener, ChannelState, ChannelType, Member};
use crate::clock::{Clock, SystemClock};
use crate::config::PusherOptions;
use crate::connection::{ConnectionCore, ConnectionEventListener, ConnectionState, StateFilter};
use crate::errors::{PusherError, Result};
use crate::executor::{Executor, TokioExecutor};
use crate::socket::SocketFactory;
use crate::transport::WsSocketFactory;

/// The client entry point.
///
/// Wires the connection core and the channel registry together and validates
/// arguments; the protocol logic lives below it. Methods may be called from
/// any thread: each one hands its work to the executor and returns, so
/// observable effects (transitions, callbacks) land on the executor's
/// serial queue.
pub struct Pusher {
	connection: Arc<ConnectionCore>,
	registry: Arc<ChannelRegistry>,
	has_authorizer: bool,
}

impl Pusher {
	/// Build a client against the production websocket transport.
	///
	/// # Errors
	/// `Argument` when the api key is empty.
	///
	/// # Panics
	/// Panics when called outside a tokio runtime context; use
	/// [`Pusher::with_components`] to supply your own executor.
	pub fn new(api_key: &str, options: PusherOptions) -> Result<Self> {
		Self::with_components(api_key, options, Arc::new(WsSocketFactory), Arc::new(TokioExecutor::start()), Arc::new(SystemClock))
	}

	/// Build a client from explicitly supplied collaborators. Tests inject
	/// an in-memory socket factory, an inline executor and a manual clock.
	///
	/// # Errors
	/// `Argument` when the api key is empty.
	pub fn with_components(
		api_key: &str,
		options: PusherOptions,
		factory: Arc<dyn SocketFactory>,
		executor: Arc<dyn Executor>,
		clock: Arc<dyn Clock>,
	) -> Result<Self> {
		if api_key.is_empty() {
			return Err(PusherError::argument("api key cannot be empty"));
		}

		let connection = ConnectionCore::new(
			options.endpoint(api_key),
			options.activity_timeout,
			options.pong_timeout,
			factory,
			Arc::clone(&executor),
			clock,
		);
		let registry = ChannelRegistry::new(Arc::clone(&connection), executor, options.authorizer.clone());
		connection.set_router(&registry);

		Ok(Self {
			connection,
			registry,
			has_authorizer: options.authorizer.is_some(),
		})
	}

	/// Open the connection. A no-op unless disconnected.
	pub fn connect(&self) {
		self.connection.connect();
	}

	/// Bind a listener, then connect.
	///
	/// With no filters the listener is bound to every transition; passing
	/// filters without a listener is an error.
	pub fn connect_with_listener(&self, listener: Option<Arc<ConnectionEventListener>>, filters: &[StateFilter]) -> Result<()> {
		match listener {
			Some(listener) => {
				if filters.is_empty() {
					self.connection.bind(StateFilter::All, listener);
				} else {
					for filter in filters {
						self.connection.bind(*filter, Arc::clone(&listener));
					}
				}
			}
			None if !filters.is_empty() => {
				return Err(PusherError::argument("state filters require a listener"));
			}
			None => {}
		}
		self.connection.connect();
		Ok(())
	}

	/// Close the connection. A no-op unless connected.
	pub fn disconnect(&self) {
		self.connection.disconnect();
	}

	/// Subscribe to a public channel, optionally binding `listener` to the
	/// named events (or to the whole channel when no events are given).
	pub fn subscribe(&self, channel: &str, listener: Option<Arc<ChannelEventListener>>, events: &[&str]) -> Result<()> {
		self.registry.subscribe(ChannelType::Public, channel, listener, events)
	}

	/// Subscribe to a `private-` channel. Requires an authorizer.
	pub fn subscribe_private(&self, channel: &str, listener: Option<Arc<ChannelEventListener>>, events: &[&str]) -> Result<()> {
		self.require_authorizer()?;
		self.registry.subscribe(ChannelType::Private, channel, listener, events)
	}

	/// Subscribe to a `presence-` channel. Requires an authorizer.
	pub fn subscribe_presence(&self, channel: &str, listener: Option<Arc<ChannelEventListener>>, events: &[&str]) -> Result<()> {
		self.require_authorizer()?;
		self.registry.subscribe(ChannelType::Presence, channel, listener, events)
	}

	/// Drop a subscription. Requires a live connection.
	pub fn unsubscribe(&self, channel: &str) -> Result<()> {
		self.registry.unsubscribe(channel)
	}

	/// Send a `client-` event on a subscribed private or presence channel.
	pub fn trigger(&self, channel: &str, event: &str, data: Value) -> Result<()> {
		self.registry.trigger(channel, event, data)
	}

	/// Bind a listener to one event on a subscribed channel.
	pub fn bind(&self, channel: &str, event: &str, listener: Arc<ChannelEventListener>) -> Result<()> {
		self.registry.bind(channel, event, listener)
	}

	/// Remove a per-event listener; reports whether it was bound.
	pub fn unbind(&self, channel: &str, event: &str, listener: &Arc<ChannelEventListener>) -> Result<bool> {
		self.registry.unbind(channel, event, listener)
	}

	/// The connection half of the client, for state-change bindings and
	/// raw sends.
	#[must_use]
	pub fn connection(&self) -> &Arc<ConnectionCore> {
		&self.connection
	}

	#[must_use]
	pub fn connection_state(&self) -> ConnectionState {
		self.connection.state()
	}

	#[must_use]
	pub fn socket_id(&self) -> Option<String> {
		self.connection.socket_id()
	}

	#[must_use]
	pub fn channel_state(&self, channel: &str) -> Option<ChannelState> {
		self.registry.channel_state(channel)
	}

	/// Current roster of a presence channel, ordered by member id.
	#[must_use]
	pub fn members(&self, channel: &str) -> Option<Vec<Member>> {
		self.registry.members(channel)
	}

	/// This client's own member entry on a presence channel.
	#[must_use]
	pub fn me(&self, channel: &str) -> Option<Member> {
		self.registry.me(channel)
	}

	fn require_authorizer(&self) -> Result<()> {
		if self.has_authorizer {
			Ok(())
		} else {
			Err(PusherError::state("private and presence channels require an authorizer"))
		}
	}
}
