use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use super::listener::{ConnectionEventListener, ErrorEvent};
use super::state::{ConnectionState, ConnectionStateChange, StateFilter};
use crate::channels::registry::ChannelRegistry;
use crate::clock::Clock;
use crate::executor::Executor;
use crate::lock;
use crate::protocol::{self, InboundFrame};
use crate::socket::{SocketAdapter, SocketFactory, SocketObserver, TransportError};

const WEBSOCKET_EXCEPTION: &str = "An exception was thrown by the websocket";

type SharedSocket = Arc<Mutex<Box<dyn SocketAdapter>>>;

/// The connection state machine.
///
/// Owns the socket adapter, the socket id issued by the server handshake,
/// the heartbeat deadlines and the bound connection listeners. All
/// transitions and listener callbacks run as jobs on the executor; the
/// binding table and state reads are safe from any thread.
pub struct ConnectionCore {
	url: String,
	executor: Arc<dyn Executor>,
	clock: Arc<dyn Clock>,
	factory: Arc<dyn SocketFactory>,
	router: RwLock<Weak<ChannelRegistry>>,
	inner: Mutex<Inner>,
}

struct Inner {
	state: ConnectionState,
	socket: Option<SharedSocket>,
	socket_id: Option<String>,
	listeners: HashMap<StateFilter, Vec<Arc<ConnectionEventListener>>>,
	configured_activity_timeout: Duration,
	activity_timeout: Duration,
	pong_timeout: Duration,
	activity_deadline: Option<Instant>,
	pong_deadline: Option<Instant>,
}

enum HeartbeatAction {
	Idle,
	Ping(Duration),
	PongTimedOut,
	Reschedule(Duration),
}

impl ConnectionCore {
	pub(crate) fn new(
		url: String,
		activity_timeout: Duration,
		pong_timeout: Duration,
		factory: Arc<dyn SocketFactory>,
		executor: Arc<dyn Executor>,
		clock: Arc<dyn Clock>,
	) -> Arc<Self> {
		Arc::new(Self {
			url,
			executor,
			clock,
			factory,
			router: RwLock::new(Weak::new()),
			inner: Mutex::new(Inner {
				state: ConnectionState::Disconnected,
				socket: None,
				socket_id: None,
				listeners: HashMap::new(),
				configured_activity_timeout: activity_timeout,
				activity_timeout,
				pong_timeout,
				activity_deadline: None,
				pong_deadline: None,
			}),
		})
	}

	pub(crate) fn set_router(&self, registry: &Arc<ChannelRegistry>) {
		*self.router.write().unwrap_or_else(std::sync::PoisonError::into_inner) = Arc::downgrade(registry);
	}

	pub fn state(&self) -> ConnectionState {
		lock(&self.inner).state
	}

	pub fn socket_id(&self) -> Option<String> {
		lock(&self.inner).socket_id.clone()
	}

	/// Add a listener under the given filter. Binding the same listener
	/// twice under one filter is a no-op.
	pub fn bind(&self, filter: StateFilter, listener: Arc<ConnectionEventListener>) {
		let mut inner = lock(&self.inner);
		let bound = inner.listeners.entry(filter).or_default();
		if !bound.iter().any(|existing| Arc::ptr_eq(existing, &listener)) {
			bound.push(listener);
		}
	}

	/// Remove a listener from the given filter; reports whether it was bound.
	pub fn unbind(&self, filter: StateFilter, listener: &Arc<ConnectionEventListener>) -> bool {
		let mut inner = lock(&self.inner);
		let Some(bound) = inner.listeners.get_mut(&filter) else {
			return false;
		};
		let Some(position) = bound.iter().position(|existing| Arc::ptr_eq(existing, listener)) else {
			return false;
		};
		bound.remove(position);
		if bound.is_empty() {
			inner.listeners.remove(&filter);
		}
		true
	}

	/// Open the connection. A no-op unless currently disconnected.
	pub fn connect(self: &Arc<Self>) {
		let core = Arc::clone(self);
		self.executor.submit(Box::new(move || core.do_connect()));
	}

	/// Close the connection. A no-op unless currently connected.
	pub fn disconnect(self: &Arc<Self>) {
		let core = Arc::clone(self);
		self.executor.submit(Box::new(move || core.do_disconnect()));
	}

	/// Send a raw frame once connected; otherwise listeners bound under
	/// `All` receive an error event.
	pub fn send(self: &Arc<Self>, message: impl Into<String>) {
		let core = Arc::clone(self);
		let message = message.into();
		self.executor.submit(Box::new(move || core.send_now(message)));
	}

	fn do_connect(self: &Arc<Self>) {
		let change = {
			let mut inner = lock(&self.inner);
			if inner.state != ConnectionState::Disconnected {
				debug!(state = %inner.state, "connect ignored, already underway");
				return;
			}
			Self::apply_transition(&mut inner, ConnectionState::Connecting)
		};
		self.fire_state_change(change);

		info!(url = %self.url, "opening websocket");
		let observer: Arc<dyn SocketObserver> = Arc::new(CoreObserver { core: Arc::downgrade(self) });
		let socket = match self.factory.create(&self.url, observer) {
			Ok(socket) => Arc::new(Mutex::new(socket)),
			Err(cause) => {
				self.socket_failed(cause);
				return;
			}
		};
		lock(&self.inner).socket = Some(Arc::clone(&socket));

		let opened = lock(&socket).open();
		if let Err(cause) = opened {
			self.socket_failed(cause);
		}
	}

	fn do_disconnect(&self) {
		let (change, socket) = {
			let mut inner = lock(&self.inner);
			if inner.state != ConnectionState::Connected {
				debug!(state = %inner.state, "disconnect ignored");
				return;
			}
			let change = Self::apply_transition(&mut inner, ConnectionState::Disconnecting);
			(change, inner.socket.clone())
		};
		self.fire_state_change(change);
		if let Some(socket) = socket {
			lock(&socket).close();
		}
	}

	pub(crate) fn send_now(&self, message: String) {
		let (state, socket) = {
			let inner = lock(&self.inner);
			(inner.state, inner.socket.clone())
		};
		if state != ConnectionState::Connected {
			self.emit_error(format!("Cannot send a message while in {state} state"), None, None);
			return;
		}
		let Some(socket) = socket else {
			self.emit_error(format!("Cannot send a message while in {state} state"), None, None);
			return;
		};

		trace!(frame = %message, "sending frame");
		let sent = lock(&socket).send(&message);
		if let Err(cause) = sent {
			self.emit_error(
				format!("An exception occurred while sending message [{message}]"),
				None,
				Some(transport_cause(cause)),
			);
		}
	}

	fn handle_open(&self) {
		debug!("websocket opened, awaiting handshake");
	}

	fn handle_frame(self: &Arc<Self>, text: &str) {
		{
			let mut inner = lock(&self.inner);
			let now = self.clock.now();
			inner.activity_deadline = Some(now + inner.activity_timeout);
			inner.pong_deadline = None;
		}

		let frame = match InboundFrame::parse(text) {
			Ok(frame) => frame,
			Err(cause) => {
				warn!(error = %cause, "discarding malformed frame");
				return;
			}
		};

		match frame.event.as_str() {
			protocol::CONNECTION_ESTABLISHED => self.handle_established(&frame),
			protocol::SERVER_ERROR => {
				let (message, code) = protocol::parse_server_error(&frame);
				self.emit_error(message, code, None);
			}
			protocol::PONG => trace!("pong received"),
			_ => {
				if frame.channel.is_some() {
					if let Some(registry) = self.registry() {
						registry.on_message(&frame);
					}
				} else {
					debug!(event = %frame.event, "ignoring frame without channel");
				}
			}
		}
	}

	fn handle_established(self: &Arc<Self>, frame: &InboundFrame) {
		let payload = match protocol::parse_established(frame) {
			Ok(payload) => payload,
			Err(cause) => {
				warn!(error = %cause, "discarding malformed handshake frame");
				return;
			}
		};

		let (change, already_connected, activity_timeout) = {
			let mut inner = lock(&self.inner);
			match inner.state {
				ConnectionState::Connecting => {
					inner.socket_id = Some(payload.socket_id.clone());
					if let Some(seconds) = payload.activity_timeout {
						inner.activity_timeout = Duration::from_secs(seconds);
					}
					inner.activity_deadline = Some(self.clock.now() + inner.activity_timeout);
					let change = Self::apply_transition(&mut inner, ConnectionState::Connected);
					(change, false, inner.activity_timeout)
				}
				ConnectionState::Connected => (None, true, inner.activity_timeout),
				_ => {
					debug!(state = %inner.state, "ignoring handshake frame");
					return;
				}
			}
		};

		if already_connected {
			self.emit_error("connection_established received while already connected", None, None);
			return;
		}

		info!(socket_id = %payload.socket_id, "connection established");
		self.fire_state_change(change);
		self.schedule_heartbeat(activity_timeout);
	}

	fn handle_close(&self, code: u16, reason: &str, remote: bool) {
		if lock(&self.inner).state == ConnectionState::Disconnected {
			return;
		}
		info!(code, reason, remote, "websocket closed");
		self.drop_connection(false);
	}

	fn handle_transport_error(&self, cause: TransportError) {
		self.emit_error(WEBSOCKET_EXCEPTION, None, Some(transport_cause(cause)));
		let (state, socket) = {
			let inner = lock(&self.inner);
			(inner.state, inner.socket.clone())
		};
		match state {
			ConnectionState::Connecting => self.drop_connection(true),
			ConnectionState::Connected => {
				// Request close; the terminal transition arrives via on_close.
				if let Some(socket) = socket {
					lock(&socket).close();
				}
			}
			_ => {}
		}
	}

	fn socket_failed(&self, cause: TransportError) {
		self.emit_error(WEBSOCKET_EXCEPTION, None, Some(transport_cause(cause)));
		self.drop_connection(false);
	}

	/// Transition to disconnected, dropping the socket and all deadlines.
	fn drop_connection(&self, close_socket: bool) {
		let (change, socket) = {
			let mut inner = lock(&self.inner);
			let socket = inner.socket.take();
			inner.activity_deadline = None;
			inner.pong_deadline = None;
			inner.activity_timeout = inner.configured_activity_timeout;
			let change = Self::apply_transition(&mut inner, ConnectionState::Disconnected);
			(change, socket)
		};
		if close_socket {
			if let Some(socket) = socket {
				lock(&socket).close();
			}
		}
		self.fire_state_change(change);
	}

	fn heartbeat_check(self: &Arc<Self>) {
		let action = {
			let mut inner = lock(&self.inner);
			if inner.state != ConnectionState::Connected {
				return;
			}
			let now = self.clock.now();
			if let Some(pong_deadline) = inner.pong_deadline {
				if now >= pong_deadline {
					HeartbeatAction::PongTimedOut
				} else {
					HeartbeatAction::Reschedule(pong_deadline - now)
				}
			} else if let Some(activity_deadline) = inner.activity_deadline {
				if now >= activity_deadline {
					inner.pong_deadline = Some(now + inner.pong_timeout);
					inner.activity_deadline = Some(now + inner.activity_timeout);
					HeartbeatAction::Ping(inner.pong_timeout)
				} else {
					HeartbeatAction::Reschedule(activity_deadline - now)
				}
			} else {
				HeartbeatAction::Idle
			}
		};

		match action {
			HeartbeatAction::Ping(pong_timeout) => {
				debug!("activity timeout expired, sending ping");
				self.send_now(protocol::ping_frame());
				self.schedule_heartbeat(pong_timeout);
			}
			HeartbeatAction::PongTimedOut => {
				warn!("pong timeout expired, closing connection");
				self.drop_connection(true);
			}
			HeartbeatAction::Reschedule(delay) => self.schedule_heartbeat(delay),
			HeartbeatAction::Idle => {}
		}
	}

	fn schedule_heartbeat(self: &Arc<Self>, delay: Duration) {
		let weak = Arc::downgrade(self);
		self.executor.schedule(
			delay,
			Box::new(move || {
				if let Some(core) = weak.upgrade() {
					core.heartbeat_check();
				}
			}),
		);
	}

	/// Set the new state and report the change, or `None` on a no-op.
	/// The socket id only survives while the connection does.
	fn apply_transition(inner: &mut Inner, next: ConnectionState) -> Option<ConnectionStateChange> {
		if inner.state == next {
			return None;
		}
		let change = ConnectionStateChange::new(inner.state, next);
		inner.state = next;
		if next == ConnectionState::Disconnected {
			inner.socket_id = None;
		}
		Some(change)
	}

	fn fire_state_change(&self, change: Option<ConnectionStateChange>) {
		let Some(change) = change else { return };
		debug!(previous = %change.previous, current = %change.current, "connection state changed");

		if let Some(registry) = self.registry() {
			registry.on_connection_state_change(&change);
		}

		let listeners = {
			let inner = lock(&self.inner);
			let mut listeners: Vec<Arc<ConnectionEventListener>> = Vec::new();
			for filter in [StateFilter::Only(change.current), StateFilter::All] {
				for listener in inner.listeners.get(&filter).into_iter().flatten() {
					if !listeners.iter().any(|seen| Arc::ptr_eq(seen, listener)) {
						listeners.push(Arc::clone(listener));
					}
				}
			}
			listeners
		};
		for listener in listeners {
			listener.notify_state_change(&change);
		}
	}

	/// Deliver an error event to every listener bound under `All`.
	pub(crate) fn emit_error(&self, message: impl Into<String>, code: Option<String>, cause: Option<Arc<dyn std::error::Error + Send + Sync>>) {
		let event = ErrorEvent::new(message, code, cause);
		error!(message = %event.message, code = ?event.code, "connection error");

		let listeners = {
			let inner = lock(&self.inner);
			inner.listeners.get(&StateFilter::All).cloned().unwrap_or_default()
		};
		for listener in listeners {
			listener.notify_error(&event);
		}
	}

	fn registry(&self) -> Option<Arc<ChannelRegistry>> {
		self.router.read().unwrap_or_else(std::sync::PoisonError::into_inner).upgrade()
	}
}

fn transport_cause(cause: TransportError) -> Arc<dyn std::error::Error + Send + Sync> {
	Arc::new(cause)
}

/// Marshals transport callbacks onto the executor before they touch state.
struct CoreObserver {
	core: Weak<ConnectionCore>,
}

impl CoreObserver {
	fn dispatch(&self, job: impl FnOnce(Arc<ConnectionCore>) + Send + 'static) {
		if let Some(core) = self.core.upgrade() {
			let target = Arc::clone(&core);
			core.executor.submit(Box::new(move || job(target)));
		}
	}
}

impl SocketObserver for CoreObserver {
	fn on_open(&self) {
		self.dispatch(|core| core.handle_open());
	}

	fn on_message(&self, text: &str) {
		let text = text.to_string();
		self.dispatch(move |core| core.handle_frame(&text));
	}

	fn on_close(&self, code: u16, reason: &str, remote: bool) {
		let reason = reason.to_string();
		self.dispatch(move |core| core.handle_close(code, &reason, remote));
	}

	fn on_error(&self, cause: TransportError) {
		self.dispatch(move |core| core.handle_transport_error(cause));
	}
}
