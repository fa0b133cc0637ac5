//! Fault and health diagnostics computed from one consistent history slice.

pub mod clock;
pub mod dust;
pub mod efficiency;
pub mod forecast;
pub mod history;
pub mod rail;
pub mod report;
pub mod sensor;


pub use clock::ClockReliability;
pub use dust::{DustAssessment, SoilingClass};
pub use efficiency::EfficiencyScore;
pub use forecast::Forecast;
pub use history::HistoryView;
pub use rail::RailRisk;
pub use report::{diagnose, DiagnosticsReport};
pub use sensor::SensorHealth;
