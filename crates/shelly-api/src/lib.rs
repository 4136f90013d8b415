// shelly-api: Async Rust client for Shelly Gen1 (CoAP + HTTP) and Gen2 (HTTP-RPC + WebSocket-RPC) devices

pub mod auth;
pub mod blocking;
pub mod coap;
pub mod error;
pub mod gen1;
pub mod gen2;
pub mod http;
pub mod models;
pub mod schema;
pub mod transport;
pub mod websocket;

pub use auth::Credentials;
pub use coap::{CoapMessage, MessageCode};
pub use error::Error;
pub use gen1::Gen1Client;
pub use gen2::{ComponentCommand, Gen2Client};
pub use http::HttpProtocolClient;
pub use models::WireValue;
pub use schema::{Schema, SchemaValidator, StructuralValidator};
pub use transport::TransportConfig;
pub use websocket::{ConnectionState, WsConfig, WsEvent, WsRpcClient};
