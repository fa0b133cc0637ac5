pub mod aggregator;


pub use aggregator::{BestAngle, HeatmapCell, SlotAngleStat, SlotAngleTable};
