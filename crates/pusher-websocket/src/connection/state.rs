use std::fmt;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
	Disconnected,
	Connecting,
	Connected,
	Disconnecting,
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Disconnected => "DISCONNECTED",
			Self::Connecting => "CONNECTING",
			Self::Connected => "CONNECTED",
			Self::Disconnecting => "DISCONNECTING",
		};
		f.write_str(name)
	}
}

/// Listener binding filter: a single state, or every transition.
///
/// `All` exists only as a filter; it is never a stored connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateFilter {
	All,
	Only(ConnectionState),
}

impl StateFilter {
	#[must_use]
	pub fn matches(&self, state: ConnectionState) -> bool {
		match self {
			Self::All => true,
			Self::Only(filtered) => *filtered == state,
		}
	}
}

impl From<ConnectionState> for StateFilter {
	fn from(state: ConnectionState) -> Self {
		Self::Only(state)
	}
}

/// One observed transition; emitted on every real state change and
/// suppressed on no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStateChange {
	pub previous: ConnectionState,
	pub current: ConnectionState,
}

impl ConnectionStateChange {
	#[must_use]
	pub fn new(previous: ConnectionState, current: ConnectionState) -> Self {
		Self { previous, current }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_display_is_uppercase() {
		assert_eq!(ConnectionState::Disconnected.to_string(), "DISCONNECTED");
		assert_eq!(ConnectionState::Connecting.to_string(), "CONNECTING");
		assert_eq!(ConnectionState::Connected.to_string(), "CONNECTED");
		assert_eq!(ConnectionState::Disconnecting.to_string(), "DISCONNECTING");
	}

	#[test]
	fn test_all_filter_matches_every_state() {
		for state in [
			ConnectionState::Disconnected,
			ConnectionState::Connecting,
			ConnectionState::Connected,
			ConnectionState::Disconnecting,
		] {
			assert!(StateFilter::All.matches(state));
		}
	}

	#[test]
	fn test_only_filter_matches_its_state() {
		let filter = StateFilter::Only(ConnectionState::Connected);

		assert!(filter.matches(ConnectionState::Connected));
		assert!(!filter.matches(ConnectionState::Connecting));
	}

	#[test]
	fn test_state_change_equality() {
		let a = ConnectionStateChange::new(ConnectionState::Disconnected, ConnectionState::Connecting);
		let b = ConnectionStateChange::new(ConnectionState::Disconnected, ConnectionState::Connecting);
		let c = ConnectionStateChange::new(ConnectionState::Connecting, ConnectionState::Connected);

		assert_eq!(a, b);
		assert_ne!(a, c);
	}
}
