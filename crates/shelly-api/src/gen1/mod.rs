// Gen1 devices: CoIoT description/status over HTTP, action endpoints for writes.

pub mod client;
pub mod models;

pub use client::{Gen1Client, WRITABLE_SENSORS, WriteAction};
pub use models::{
    Gen1Block, Gen1Description, Gen1DeviceInfo, Gen1ReportEntry, Gen1Sensor, Gen1Status,
    Gen1StatusReport, RawRange,
};
