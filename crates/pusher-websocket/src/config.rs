use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::Authorizer;

pub const DEFAULT_HOST: &str = "ws.pusherapp.com";
pub const DEFAULT_WS_PORT: u16 = 80;
pub const DEFAULT_WSS_PORT: u16 = 443;
pub const DEFAULT_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(30);

const CLIENT_NAME: &str = "pusher-websocket-rust";
const PROTOCOL_VERSION: u8 = 7;

/// Client configuration.
///
/// `host` wins over `cluster` when both are set; `encrypted` selects the wss
/// scheme and port. The server may still shorten `activity_timeout` during
/// the connection handshake.
#[derive(Clone)]
pub struct PusherOptions {
	pub authorizer: Option<Arc<dyn Authorizer>>,
	pub cluster: Option<String>,
	pub host: Option<String>,
	pub ws_port: u16,
	pub wss_port: u16,
	pub encrypted: bool,
	pub activity_timeout: Duration,
	pub pong_timeout: Duration,
}

impl Default for PusherOptions {
	fn default() -> Self {
		Self {
			authorizer: None,
			cluster: None,
			host: None,
			ws_port: DEFAULT_WS_PORT,
			wss_port: DEFAULT_WSS_PORT,
			encrypted: true,
			activity_timeout: DEFAULT_ACTIVITY_TIMEOUT,
			pong_timeout: DEFAULT_PONG_TIMEOUT,
		}
	}
}

impl fmt::Debug for PusherOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PusherOptions")
			.field("authorizer", &self.authorizer.as_ref().map(|_| "<set>"))
			.field("cluster", &self.cluster)
			.field("host", &self.host)
			.field("ws_port", &self.ws_port)
			.field("wss_port", &self.wss_port)
			.field("encrypted", &self.encrypted)
			.field("activity_timeout", &self.activity_timeout)
			.field("pong_timeout", &self.pong_timeout)
			.finish()
	}
}

impl PusherOptions {
	/// Effective hostname: explicit host, then cluster host, then default.
	#[must_use]
	pub fn resolved_host(&self) -> String {
		if let Some(host) = &self.host {
			return host.clone();
		}
		match &self.cluster {
			Some(cluster) => format!("ws-{cluster}.pusher.com"),
			None => DEFAULT_HOST.to_string(),
		}
	}

	/// Full websocket endpoint for the given application key.
	#[must_use]
	pub fn endpoint(&self, api_key: &str) -> String {
		let (scheme, port) = if self.encrypted { ("wss", self.wss_port) } else { ("ws", self.ws_port) };
		format!(
			"{scheme}://{host}:{port}/app/{api_key}?client={CLIENT_NAME}&version={version}&protocol={PROTOCOL_VERSION}",
			host = self.resolved_host(),
			version = env!("CARGO_PKG_VERSION"),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_endpoint_defaults_to_wss_on_default_host() {
		let url = PusherOptions::default().endpoint("12345");

		assert!(url.starts_with("wss://ws.pusherapp.com:443/app/12345?"));
		assert!(url.contains("client=pusher-websocket-rust"));
		assert!(url.contains("protocol=7"));
	}

	#[test]
	fn test_endpoint_uses_cluster_host() {
		let options = PusherOptions {
			cluster: Some("eu".to_string()),
			..PusherOptions::default()
		};

		assert!(options.endpoint("k").starts_with("wss://ws-eu.pusher.com:443/app/k?"));
	}

	#[test]
	fn test_explicit_host_wins_over_cluster() {
		let options = PusherOptions {
			cluster: Some("eu".to_string()),
			host: Some("localhost".to_string()),
			..PusherOptions::default()
		};

		assert!(options.endpoint("k").starts_with("wss://localhost:443/app/k?"));
	}

	#[test]
	fn test_unencrypted_endpoint_uses_ws_port() {
		let options = PusherOptions {
			encrypted: false,
			ws_port: 8080,
			..PusherOptions::default()
		};

		assert!(options.endpoint("k").starts_with("ws://ws.pusherapp.com:8080/app/k?"));
	}
}
