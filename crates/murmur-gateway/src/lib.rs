/// Client side of the murmur gateway.
///
/// - `connection`: owns the single live WebSocket, delivers raw payloads and
///   applies the reconnect policy
/// - `decoder`: turns one (possibly batched) payload into typed events

pub mod connection;
pub mod decoder;
pub mod error;

pub use connection::{Connection, GatewayConfig, Inbound, ReconnectPolicy};
pub use decoder::decode_payload;
pub use error::GatewayError;
