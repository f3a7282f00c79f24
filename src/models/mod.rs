pub mod config;
pub mod day;
pub mod workout;

pub use config::RecoveryConfig;
pub use day::{day_key, local_today, DayData, DayStatus, DaySummary};
pub use workout::{NewWorkoutRecord, SessionType, WorkoutRecord};
