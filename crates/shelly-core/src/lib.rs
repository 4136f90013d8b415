// shelly-core: Normalized property model between shelly-api and host platforms.

pub mod config;
pub mod convert;
pub mod error;
pub mod inference;
pub mod model;
pub mod registry;
pub mod transform;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DeviceConfig, Generation};
pub use error::CoreError;
pub use inference::{Inferred, infer};
pub use registry::{ClientHandle, DeviceConnectionRegistry, TransportKind};
pub use transform::{from_device, to_device};

pub use model::{
    DataType, EnumRow, Format, NormalizedValue, PropertyDescriptor, PropertyReading,
    SensorDescriptor, SensorReading,
};
