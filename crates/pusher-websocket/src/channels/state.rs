/// Per-channel subscription lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
	/// Created; subscribe frame not yet dispatched.
	Initial,
	/// Subscribe frame sent, awaiting the server's ack.
	SubscribeSent,
	/// Acked by the server.
	Subscribed,
	/// Torn down on user request or clean disconnect.
	Unsubscribed,
	/// Authorization was refused.
	Failed,
}

impl ChannelState {
	/// Whether the channel still counts against duplicate-name detection.
	#[must_use]
	pub fn is_active(&self) -> bool {
		matches!(self, Self::Initial | Self::SubscribeSent | Self::Subscribed)
	}
}
