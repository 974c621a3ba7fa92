use std::sync::Arc;

use thiserror::Error;

pub type SocketResult<T> = std::result::Result<T, TransportError>;

/// Errors surfaced by a socket adapter.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
	#[error("websocket handshake failed: {0}")]
	Handshake(String),

	#[error("websocket send failed: {0}")]
	Send(String),

	#[error("websocket protocol error: {0}")]
	Protocol(String),

	#[error("socket is closed")]
	Closed,
}

/// A bidirectional text-frame channel to the server.
///
/// The connection core is the only caller; it treats frames as opaque
/// strings. Inbound traffic is reported through the [`SocketObserver`]
/// handed to the factory, from whatever thread the transport runs on.
pub trait SocketAdapter: Send {
	fn open(&mut self) -> SocketResult<()>;

	fn send(&mut self, text: &str) -> SocketResult<()>;

	fn close(&mut self);
}

/// Inbound callbacks from a socket adapter.
pub trait SocketObserver: Send + Sync {
	fn on_open(&self);

	fn on_message(&self, text: &str);

	fn on_close(&self, code: u16, reason: &str, remote: bool);

	fn on_error(&self, cause: TransportError);
}

/// Creates socket adapters bound to an observer.
///
/// The production factory builds websocket adapters; tests supply in-memory
/// ones that record traffic.
pub trait SocketFactory: Send + Sync {
	fn create(&self, url: &str, observer: Arc<dyn SocketObserver>) -> SocketResult<Box<dyn SocketAdapter>>;
}
