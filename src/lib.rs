//! fitcycle - Interval workout timer and weekly training planner
//!
//! Plans are sequences of timed sets with rests, scheduled onto weekdays by cycles.

pub mod db;
pub mod plans;
pub mod settings;
pub mod store;
pub mod timer;
pub mod tui;

pub use db::Database;
pub use settings::Settings;
pub use store::PlanStore;
pub use timer::WorkoutTimer;
