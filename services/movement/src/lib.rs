pub mod efficiency;
pub mod summary;


pub use efficiency::{
    estimate_motor_cost_wh, movement_efficiency, movement_records, recent_move_count, MovementEfficiency,
    MovementRecord,
};
pub use summary::daily_summaries;
