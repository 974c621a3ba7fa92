#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pusher_websocket::{
	AuthorizationError, Authorizer, ChannelEventListener, Clock, ConnectionEventListener, ConnectionStateChange, Executor, Job, Pusher,
	PusherOptions, SocketAdapter, SocketFactory, SocketObserver, SocketResult, TransportError,
};

pub type Recorded<T> = Arc<Mutex<Vec<T>>>;

fn recorded<T>() -> Recorded<T> {
	Arc::new(Mutex::new(Vec::new()))
}

/// Runs submitted jobs inline; delayed jobs queue until the test fires them.
pub struct TestExecutor {
	scheduled: Mutex<Vec<(Duration, Job)>>,
}

impl TestExecutor {
	pub fn new() -> Arc<Self> {
		Arc::new(Self { scheduled: Mutex::new(Vec::new()) })
	}

	pub fn run_scheduled(&self) {
		let due: Vec<(Duration, Job)> = std::mem::take(&mut *self.scheduled.lock().unwrap());
		for (_, job) in due {
			job();
		}
	}

	pub fn scheduled_len(&self) -> usize {
		self.scheduled.lock().unwrap().len()
	}
}

impl Executor for TestExecutor {
	fn submit(&self, job: Job) {
		job();
	}

	fn schedule(&self, delay: Duration, job: Job) {
		self.scheduled.lock().unwrap().push((delay, job));
	}
}

/// Clock that only moves when the test advances it.
pub struct ManualClock {
	base: Instant,
	offset: Mutex<Duration>,
}

impl ManualClock {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			base: Instant::now(),
			offset: Mutex::new(Duration::ZERO),
		})
	}

	pub fn advance(&self, by: Duration) {
		*self.offset.lock().unwrap() += by;
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Instant {
		self.base + *self.offset.lock().unwrap()
	}
}

/// Shared recorder for everything the client did to its socket.
#[derive(Default)]
pub struct SocketSpy {
	opens: AtomicUsize,
	closes: AtomicUsize,
	sent: Mutex<Vec<String>>,
	fail_sends: Mutex<bool>,
	observer: Mutex<Option<Arc<dyn SocketObserver>>>,
}

impl SocketSpy {
	pub fn observer(&self) -> Arc<dyn SocketObserver> {
		self.observer.lock().unwrap().clone().expect("no socket created yet")
	}

	pub fn open_count(&self) -> usize {
		self.opens.load(Ordering::SeqCst)
	}

	pub fn close_count(&self) -> usize {
		self.closes.load(Ordering::SeqCst)
	}

	pub fn sent(&self) -> Vec<String> {
		self.sent.lock().unwrap().clone()
	}

	pub fn sent_frames(&self) -> Vec<serde_json::Value> {
		self.sent().iter().map(|raw| serde_json::from_str(raw).unwrap()).collect()
	}

	/// Frames whose `event` matches, in send order.
	pub fn sent_with_event(&self, event: &str) -> Vec<serde_json::Value> {
		self.sent_frames().into_iter().filter(|frame| frame["event"] == event).collect()
	}

	pub fn fail_sends(&self, fail: bool) {
		*self.fail_sends.lock().unwrap() = fail;
	}

	pub fn deliver(&self, text: &str) {
		self.observer().on_message(text);
	}
}

pub struct MockSocketFactory {
	pub spy: Arc<SocketSpy>,
}

impl SocketFactory for MockSocketFactory {
	fn create(&self, _url: &str, observer: Arc<dyn SocketObserver>) -> SocketResult<Box<dyn SocketAdapter>> {
		*self.spy.observer.lock().unwrap() = Some(observer);
		Ok(Box::new(MockSocket { spy: Arc::clone(&self.spy) }))
	}
}

struct MockSocket {
	spy: Arc<SocketSpy>,
}

impl SocketAdapter for MockSocket {
	fn open(&mut self) -> SocketResult<()> {
		self.spy.opens.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	fn send(&mut self, text: &str) -> SocketResult<()> {
		if *self.spy.fail_sends.lock().unwrap() {
			return Err(TransportError::Send("spy send failure".to_string()));
		}
		self.spy.sent.lock().unwrap().push(text.to_string());
		Ok(())
	}

	fn close(&mut self) {
		self.spy.closes.fetch_add(1, Ordering::SeqCst);
	}
}

/// Authorizer double that records its calls and replays a canned response.
pub struct RecordingAuthorizer {
	pub response: std::result::Result<String, String>,
	pub calls: Recorded<(String, String)>,
}

impl RecordingAuthorizer {
	pub fn ok(response: &str) -> Arc<Self> {
		Arc::new(Self {
			response: Ok(response.to_string()),
			calls: recorded(),
		})
	}

	pub fn failing(message: &str) -> Arc<Self> {
		Arc::new(Self {
			response: Err(message.to_string()),
			calls: recorded(),
		})
	}
}

impl Authorizer for RecordingAuthorizer {
	fn authorize(&self, channel: &str, socket_id: &str) -> std::result::Result<String, AuthorizationError> {
		self.calls.lock().unwrap().push((channel.to_string(), socket_id.to_string()));
		match &self.response {
			Ok(response) => Ok(response.clone()),
			Err(message) => Err(AuthorizationError::new(message.clone())),
		}
	}
}

pub struct Harness {
	pub pusher: Pusher,
	pub spy: Arc<SocketSpy>,
	pub executor: Arc<TestExecutor>,
	pub clock: Arc<ManualClock>,
}

pub fn harness() -> Harness {
	harness_with_options(PusherOptions::default())
}

pub fn harness_with_options(options: PusherOptions) -> Harness {
	let spy = Arc::new(SocketSpy::default());
	let executor = TestExecutor::new();
	let clock = ManualClock::new();
	let factory = Arc::new(MockSocketFactory { spy: Arc::clone(&spy) });
	let pusher = Pusher::with_components("test-key", options, factory, executor.clone(), clock.clone()).unwrap();

	Harness { pusher, spy, executor, clock }
}

impl Harness {
	pub fn establish(&self, socket_id: &str) {
		self.spy.deliver(&format!(
			r#"{{"event":"pusher:connection_established","data":"{{\"socket_id\":\"{socket_id}\"}}"}}"#
		));
	}

	pub fn connect_established(&self) {
		self.pusher.connect();
		self.establish("21112.816204");
	}

	pub fn remote_close(&self) {
		self.spy.observer().on_close(1006, "connection lost", true);
	}
}

/// Connection listener recording `(change)` and `(message, code, has_cause)`.
pub fn recording_connection_listener() -> (Arc<ConnectionEventListener>, Recorded<ConnectionStateChange>, Recorded<(String, Option<String>, bool)>) {
	let changes: Recorded<ConnectionStateChange> = recorded();
	let errors: Recorded<(String, Option<String>, bool)> = recorded();

	let changes_sink = Arc::clone(&changes);
	let errors_sink = Arc::clone(&errors);
	let listener = Arc::new(
		ConnectionEventListener::new()
			.on_state_change(move |change| changes_sink.lock().unwrap().push(*change))
			.on_error(move |event| {
				errors_sink
					.lock()
					.unwrap()
					.push((event.message.clone(), event.code.clone(), event.cause.is_some()));
			}),
	);
	(listener, changes, errors)
}

/// Everything a channel listener observed, each capability separately.
pub struct ChannelRecorder {
	pub events: Recorded<(String, String)>,
	pub subscribed: Recorded<String>,
	pub auth_failures: Recorded<String>,
	pub users: Recorded<Vec<String>>,
	pub added: Recorded<String>,
	pub removed: Recorded<String>,
}

pub fn recording_channel_listener() -> (Arc<ChannelEventListener>, ChannelRecorder) {
	let recorder = ChannelRecorder {
		events: recorded(),
		subscribed: recorded(),
		auth_failures: recorded(),
		users: recorded(),
		added: recorded(),
		removed: recorded(),
	};

	let events = Arc::clone(&recorder.events);
	let subscribed = Arc::clone(&recorder.subscribed);
	let auth_failures = Arc::clone(&recorder.auth_failures);
	let users = Arc::clone(&recorder.users);
	let added = Arc::clone(&recorder.added);
	let removed = Arc::clone(&recorder.removed);

	let listener = Arc::new(
		ChannelEventListener::new()
			.on_event(move |event, data| events.lock().unwrap().push((event.to_string(), data.to_string())))
			.on_subscription_succeeded(move |channel| subscribed.lock().unwrap().push(channel.to_string()))
			.on_authentication_failure(move |message, _cause| auth_failures.lock().unwrap().push(message.to_string()))
			.on_users_information_received(move |_channel, members| {
				users.lock().unwrap().push(members.iter().map(|member| member.id.clone()).collect());
			})
			.on_user_added(move |_channel, member| added.lock().unwrap().push(member.id.clone()))
			.on_user_removed(move |_channel, member| removed.lock().unwrap().push(member.id.clone())),
	);
	(listener, recorder)
}
