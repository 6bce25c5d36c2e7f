// Risk management module
pub mod sizing;
pub mod streak_guard;

pub use sizing::{risk_size, PositionSizer, SizingMode, SizingRejection};
pub use streak_guard::{GuardTrip, StreakGuard};
