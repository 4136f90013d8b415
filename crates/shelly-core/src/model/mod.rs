// ── Normalized property model ──
//
// The uniform shape both device generations are converted into: typed
// descriptors with a format, and readings holding normalized values.

pub mod data_type;
pub mod format;
pub mod sensor;
pub mod value;

// ── Re-exports ──────────────────────────────────────────────────────

pub use data_type::DataType;
pub use format::{EnumRow, Format, SWITCH_OFF, SWITCH_ON, SWITCH_TOGGLE};
pub use sensor::{PropertyDescriptor, PropertyReading, SensorDescriptor, SensorReading};
pub use value::NormalizedValue;
