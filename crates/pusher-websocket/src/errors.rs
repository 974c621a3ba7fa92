use thiserror::Error;

pub type Result<T> = std::result::Result<T, PusherError>;

/// Errors returned synchronously from the client facade.
///
/// Transport, server and authorization failures are never returned from
/// facade methods; they are delivered to bound listeners on the executor.
#[derive(Error, Debug, Clone)]
pub enum PusherError {
	#[error("invalid argument: {0}")]
	Argument(String),

	#[error("illegal state: {0}")]
	State(String),
}

impl PusherError {
	pub(crate) fn argument(reason: impl Into<String>) -> Self {
		Self::Argument(reason.into())
	}

	pub(crate) fn state(reason: impl Into<String>) -> Self {
		Self::State(reason.into())
	}
}
