pub mod bootstrap;
pub mod engine;
pub mod leases;
pub mod snapshot;


pub use bootstrap::load_config;
pub use engine::{DiagnosticsEngine, EfficiencyView, PassOutcome, TickReport};
pub use leases::{DeviceLeases, LeaseGuard};
pub use snapshot::{DiagnosticsSnapshot, SnapshotStore, SnapshotView};
