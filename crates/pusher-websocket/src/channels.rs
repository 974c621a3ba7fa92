pub mod channel;
pub mod listener;
pub mod presence;
pub mod registry;
pub mod state;

pub use self::channel::ChannelType;
pub use self::listener::ChannelEventListener;
pub use self::presence::{Member, MemberRoster};
pub use self::state::ChannelState;
