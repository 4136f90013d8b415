// Gen2 devices: HTTP-RPC client, component write mapping, payload models.

pub mod client;
pub mod component;
pub mod models;

pub use client::{GEN2_USERNAME, Gen2Client};
pub use component::{ComponentCommand, is_write_method};
pub use models::{
    Gen2DeviceConfig, Gen2DeviceInfo, Gen2DeviceStatus, Gen2Event, Notification,
    split_component_key,
};
