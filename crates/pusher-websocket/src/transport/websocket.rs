use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tokio_tungstenite::{connect_async, tungstenite, tungstenite::protocol::Message};

use crate::socket::{SocketAdapter, SocketFactory, SocketObserver, SocketResult, TransportError};

/// Builds [`WsSocket`] adapters. The default factory wired by the facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsSocketFactory;

impl SocketFactory for WsSocketFactory {
	fn create(&self, url: &str, observer: Arc<dyn SocketObserver>) -> SocketResult<Box<dyn SocketAdapter>> {
		Ok(Box::new(WsSocket {
			url: url.to_string(),
			observer,
			commands: None,
		}))
	}
}

enum WsCommand {
	Send(String),
	Close,
}

/// Socket adapter over `tokio-tungstenite`.
///
/// `open` spawns a pump task that connects and then serves two queues: the
/// command channel for outbound frames, and the websocket stream for inbound
/// ones. Dropping the adapter closes the command channel, which ends the
/// pump.
///
/// # Panics
/// `open` panics when called outside a tokio runtime context.
pub struct WsSocket {
	url: String,
	observer: Arc<dyn SocketObserver>,
	commands: Option<mpsc::UnboundedSender<WsCommand>>,
}

impl SocketAdapter for WsSocket {
	fn open(&mut self) -> SocketResult<()> {
		if self.commands.is_some() {
			return Err(TransportError::Protocol("socket already opened".to_string()));
		}
		let (commands, receiver) = mpsc::unbounded_channel();
		self.commands = Some(commands);

		let url = self.url.clone();
		let observer = Arc::clone(&self.observer);
		tokio::spawn(run_pump(url, observer, receiver));
		Ok(())
	}

	fn send(&mut self, text: &str) -> SocketResult<()> {
		let Some(commands) = &self.commands else {
			return Err(TransportError::Closed);
		};
		commands.send(WsCommand::Send(text.to_string())).map_err(|_| TransportError::Closed)
	}

	fn close(&mut self) {
		if let Some(commands) = &self.commands {
			let _ = commands.send(WsCommand::Close);
		}
	}
}

async fn run_pump(url: String, observer: Arc<dyn SocketObserver>, mut commands: mpsc::UnboundedReceiver<WsCommand>) {
	let stream = match connect_async(url.as_str()).await {
		Ok((stream, _response)) => stream,
		Err(cause) => {
			warn!(error = %cause, "websocket connect failed");
			observer.on_error(TransportError::Handshake(cause.to_string()));
			return;
		}
	};
	debug!("websocket connected");
	observer.on_open();

	let (mut sink, mut source) = stream.split();
	loop {
		tokio::select! {
			command = commands.recv() => match command {
				Some(WsCommand::Send(text)) => {
					if let Err(cause) = sink.send(Message::Text(text.into())).await {
						observer.on_error(map_error(cause));
						break;
					}
				}
				Some(WsCommand::Close) | None => {
					let _ = sink.send(Message::Close(None)).await;
					observer.on_close(1000, "closed by client", false);
					break;
				}
			},
			frame = source.next() => match frame {
				Some(Ok(Message::Text(text))) => observer.on_message(text.as_str()),
				Some(Ok(Message::Close(close))) => {
					let (code, reason) = close.map_or((1005, String::new()), |frame| (u16::from(frame.code), frame.reason.to_string()));
					info!(code, "websocket closed by server");
					observer.on_close(code, &reason, true);
					break;
				}
				// tungstenite answers pings on the next read/write
				Some(Ok(_)) => {}
				Some(Err(cause)) => {
					observer.on_error(map_error(cause));
					break;
				}
				None => {
					observer.on_close(1006, "stream ended", true);
					break;
				}
			},
		}
	}
}

fn map_error(cause: tungstenite::Error) -> TransportError {
	match cause {
		tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => TransportError::Closed,
		other => TransportError::Protocol(other.to_string()),
	}
}
