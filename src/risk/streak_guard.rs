use serde::{Deserialize, Serialize};

/// Loss-streak circuit breaker scoped to one signal period
///
/// Losing closures (profit <= 0) count toward the streak. Reaching the
/// threshold blocks new entries. A win resets the count but never clears
/// the block; only a period rollover does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakGuard {
    threshold: u32,
    consecutive_losses: u32,
    blocked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardTrip {
    LossStreak { consecutive_losses: u32 },
}

impl StreakGuard {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive_losses: 0,
            blocked: false,
        }
    }

    /// Record a trade closure. Returns true if this closure tripped the block.
    pub fn record_closure(&mut self, profit: f64) -> bool {
        if profit > 0.0 {
            self.consecutive_losses = 0;
            return false;
        }

        self.consecutive_losses += 1;
        if !self.blocked && self.consecutive_losses >= self.threshold {
            self.blocked = true;
            return true;
        }
        false
    }

    /// Start of a new signal period
    pub fn on_rollover(&mut self) {
        self.consecutive_losses = 0;
        self.blocked = false;
    }

    pub fn check(&self) -> Result<(), GuardTrip> {
        if self.blocked {
            return Err(GuardTrip::LossStreak {
                consecutive_losses: self.consecutive_losses,
            });
        }
        Ok(())
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_after_threshold_losses() {
        let mut guard = StreakGuard::new(2);

        assert!(!guard.record_closure(-1.5));
        assert!(guard.check().is_ok());

        assert!(guard.record_closure(-1.5));
        assert_eq!(
            guard.check(),
            Err(GuardTrip::LossStreak {
                consecutive_losses: 2
            })
        );
    }

    #[test]
    fn test_breakeven_counts_as_loss() {
        let mut guard = StreakGuard::new(1);
        assert!(guard.record_closure(0.0));
        assert!(guard.is_blocked());
    }

    #[test]
    fn test_win_resets_count_but_not_block() {
        let mut guard = StreakGuard::new(2);
        guard.record_closure(-1.0);
        guard.record_closure(-1.0);
        assert!(guard.is_blocked());

        guard.record_closure(3.0);
        assert_eq!(guard.consecutive_losses(), 0);
        assert!(guard.is_blocked());
    }

    #[test]
    fn test_win_interrupts_streak() {
        let mut guard = StreakGuard::new(2);
        guard.record_closure(-1.0);
        guard.record_closure(2.0);
        guard.record_closure(-1.0);
        assert!(!guard.is_blocked());
        assert_eq!(guard.consecutive_losses(), 1);
    }

    #[test]
    fn test_rollover_clears_block() {
        let mut guard = StreakGuard::new(2);
        guard.record_closure(-1.0);
        guard.record_closure(-1.0);
        assert!(guard.is_blocked());

        guard.on_rollover();
        assert!(!guard.is_blocked());
        assert_eq!(guard.consecutive_losses(), 0);
        assert!(guard.check().is_ok());
    }

    #[test]
    fn test_trip_reported_once() {
        let mut guard = StreakGuard::new(2);
        guard.record_closure(-1.0);
        assert!(guard.record_closure(-1.0));
        assert!(!guard.record_closure(-1.0));
        assert_eq!(guard.consecutive_losses(), 3);
    }
}
