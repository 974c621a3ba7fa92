// pusher-websocket
//
// Client for a hosted publish/subscribe realtime messaging service: a
// heartbeat-policed websocket connection, a channel registry demultiplexing
// server events onto named subscriptions, and the private/presence
// authorization handshake on top.

pub mod auth;
pub mod channels;
pub mod client;
pub mod clock;
pub mod config;
pub mod connection;
pub mod errors;
pub mod executor;
pub mod protocol;
pub mod socket;
pub mod transport;

pub use auth::{AuthResponse, AuthorizationError, Authorizer};
pub use channels::{ChannelEventListener, ChannelState, ChannelType, Member, MemberRoster};
pub use client::Pusher;
pub use clock::{Clock, SystemClock};
pub use config::PusherOptions;
pub use connection::{ConnectionCore, ConnectionEventListener, ConnectionState, ConnectionStateChange, ErrorEvent, StateFilter};
pub use errors::{PusherError, Result};
pub use executor::{Executor, Job, TokioExecutor};
pub use socket::{SocketAdapter, SocketFactory, SocketObserver, SocketResult, TransportError};
pub use transport::WsSocketFactory;

/// Poisoning-tolerant mutex access; state stays usable after a panicking
/// listener.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
