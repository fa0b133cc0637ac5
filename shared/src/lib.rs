pub mod config;
pub mod defaults;
pub mod error;
pub mod logger;
pub mod settings;
pub mod stats;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;


pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use settings::{DeviceSettings, ResolvedSettings, SettingsProvider, StaticSettings};
pub use store::{InMemoryStore, StoreError, TelemetryStore, TimeRange};
pub use types::{
    AngleBucket, DeviceEvent, DeviceId, DeviceMode, EventKind, FaultFlags, FaultFinding, FaultKind, Severity, Slot,
    SlotClock, TelemetrySample,
};
