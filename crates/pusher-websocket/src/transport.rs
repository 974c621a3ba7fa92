pub mod websocket;

pub use self::websocket::WsSocketFactory;
