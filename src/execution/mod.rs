// Trade lifecycle: entry, trailing stop, stop-triggered exit
pub mod position_manager;

pub use position_manager::{
    ClosedPosition, ExitReason, OpenError, Position, PositionManager, TrailingRule,
};
