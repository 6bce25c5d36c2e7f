use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::{ClosedPosition, ExitReason, Position};
use crate::models::Direction;

/// Record of a single closed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub profit: f64,
    pub pips: f64,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    /// Start of the signal period the trade was opened in
    pub period_time: DateTime<Utc>,
    pub exit_reason: ExitReason,
    pub balance_after: f64,
}

impl TradeRecord {
    pub fn from_closed(closed: &ClosedPosition, pip_size: f64, balance_after: f64) -> Self {
        let position = &closed.position;
        let pips =
            (closed.exit_price - position.entry_price) * position.direction.sign() / pip_size;

        Self {
            direction: position.direction,
            entry_price: position.entry_price,
            exit_price: closed.exit_price,
            size: position.size,
            profit: closed.profit,
            pips,
            open_time: position.entry_time,
            close_time: closed.exit_time,
            period_time: position.period_time,
            exit_reason: closed.reason,
            balance_after,
        }
    }

    pub fn is_win(&self) -> bool {
        self.profit > 0.0
    }
}

/// Running account statistics, updated on every trade closure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStats {
    pub initial_balance: f64,
    pub balance: f64,
    pub peak_balance: f64,
    /// Running minimum of `balance - peak_balance` (always <= 0)
    pub max_drawdown: f64,
    /// Same as `max_drawdown`, relative to the peak, in percent
    pub max_drawdown_pct: f64,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub profit_sum: f64,
    /// Sum of non-positive profits (always <= 0)
    pub loss_sum: f64,
    pub max_loss_streak: u32,
    /// Periods in which the loss-streak guard halted entries
    pub blocked_periods: usize,
}

impl AccountStats {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            peak_balance: initial_balance,
            max_drawdown: 0.0,
            max_drawdown_pct: 0.0,
            trades: 0,
            wins: 0,
            losses: 0,
            profit_sum: 0.0,
            loss_sum: 0.0,
            max_loss_streak: 0,
            blocked_periods: 0,
        }
    }

    /// Apply a realized profit
    ///
    /// `consecutive_losses` is the streak count after this closure.
    pub fn record_closure(&mut self, profit: f64, consecutive_losses: u32) {
        self.balance += profit;
        self.peak_balance = self.peak_balance.max(self.balance);

        let drawdown = self.balance - self.peak_balance;
        self.max_drawdown = self.max_drawdown.min(drawdown);
        if self.peak_balance > 0.0 {
            self.max_drawdown_pct = self
                .max_drawdown_pct
                .min(drawdown / self.peak_balance * 100.0);
        }

        self.trades += 1;
        if profit > 0.0 {
            self.wins += 1;
            self.profit_sum += profit;
        } else {
            self.losses += 1;
            self.loss_sum += profit;
        }

        self.max_loss_streak = self.max_loss_streak.max(consecutive_losses);
    }

    pub fn is_ruined(&self) -> bool {
        self.balance <= 0.0
    }

    /// Win rate in percent
    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.trades as f64 * 100.0
        }
    }
}

/// How the run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Survived,
    Ruined,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Survived => write!(f, "SURVIVED"),
            RunStatus::Ruined => write!(f, "RUINED"),
        }
    }
}

/// Final statistics for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub peak_balance: f64,
    pub total_return_pct: f64,

    // Trade Statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub profit_sum: f64,
    pub loss_sum: f64,

    // P&L Distribution
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64,

    // Risk Metrics
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub max_loss_streak: u32,
    pub blocked_periods: usize,
}

impl RunStatistics {
    pub fn from_run(stats: &AccountStats, trades: &[TradeRecord]) -> Self {
        let avg_win = if stats.wins > 0 {
            stats.profit_sum / stats.wins as f64
        } else {
            0.0
        };
        let avg_loss = if stats.losses > 0 {
            stats.loss_sum / stats.losses as f64
        } else {
            0.0
        };

        let largest_win = trades
            .iter()
            .filter(|t| t.is_win())
            .map(|t| t.profit)
            .fold(0.0, f64::max);
        let largest_loss = trades
            .iter()
            .filter(|t| !t.is_win())
            .map(|t| t.profit)
            .fold(0.0, f64::min);

        let profit_factor = if stats.loss_sum < 0.0 {
            stats.profit_sum / stats.loss_sum.abs()
        } else if stats.profit_sum > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Self {
            initial_balance: stats.initial_balance,
            final_balance: stats.balance,
            peak_balance: stats.peak_balance,
            total_return_pct: (stats.balance - stats.initial_balance) / stats.initial_balance
                * 100.0,
            total_trades: stats.trades,
            winning_trades: stats.wins,
            losing_trades: stats.losses,
            win_rate: stats.win_rate(),
            profit_sum: stats.profit_sum,
            loss_sum: stats.loss_sum,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            profit_factor,
            max_drawdown: stats.max_drawdown,
            max_drawdown_pct: stats.max_drawdown_pct,
            max_loss_streak: stats.max_loss_streak,
            blocked_periods: stats.blocked_periods,
        }
    }
}

/// Everything a run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub status: RunStatus,
    pub stats: RunStatistics,
    pub trades: Vec<TradeRecord>,
    /// Position still open when the data ran out (not realized)
    pub open_position: Option<Position>,
    pub ticks_processed: usize,
}

impl BacktestReport {
    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        let s = &self.stats;

        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              BACKTEST PERFORMANCE REPORT              ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("📊 BALANCE");
        println!("  Start Balance:         {:.2}", s.initial_balance);
        println!("  Final Balance:         {:.2}", s.final_balance);
        println!("  Peak Balance:          {:.2}", s.peak_balance);
        println!("  Return:                {:+.2}%", s.total_return_pct);

        println!("\n📈 TRADE STATISTICS");
        println!("  Ticks Processed:       {}", self.ticks_processed);
        println!("  Trades:                {}", s.total_trades);
        println!(
            "  Wins / Losses:         {} / {}",
            s.winning_trades, s.losing_trades
        );
        println!("  Win Rate:              {:.2}%", s.win_rate);
        println!("  Profit Sum:            {:.2}", s.profit_sum);
        println!("  Loss Sum:              {:.2}", s.loss_sum);

        if s.total_trades > 0 {
            println!("\n💰 WIN/LOSS ANALYSIS");
            println!("  Average Win:           {:.2}", s.avg_win);
            println!("  Average Loss:          {:.2}", s.avg_loss);
            println!("  Largest Win:           {:.2}", s.largest_win);
            println!("  Largest Loss:          {:.2}", s.largest_loss);
            println!("  Profit Factor:         {:.2}", s.profit_factor);
        }

        println!("\n⚠️  RISK METRICS");
        println!(
            "  Max Drawdown:          {:.2} ({:.2}%)",
            s.max_drawdown, s.max_drawdown_pct
        );
        println!("  Max Loss Streak:       {}", s.max_loss_streak);
        println!("  Blocked Periods:       {}", s.blocked_periods);

        if let Some(position) = &self.open_position {
            println!("\n⏳ OPEN AT END OF DATA");
            println!(
                "  {} {:.5} stop {:.5} size {:.4}",
                position.direction, position.entry_price, position.stop_price, position.size
            );
        }

        println!("\n🏁 RESULT: {}", self.status);
        println!("\n═══════════════════════════════════════════════════════\n");
    }

    /// Print the first `limit` closed trades as a table
    pub fn print_trade_log(&self, limit: usize) {
        println!(
            "{:<5} {:<6} {:<20} {:>9} {:>9} {:>8} {:>10} {:>10}",
            "N", "DIR", "CLOSED", "ENTRY", "EXIT", "PIPS", "PROFIT", "BALANCE"
        );
        println!("{}", "─".repeat(84));

        for (i, t) in self.trades.iter().enumerate().take(limit) {
            println!(
                "{:<5} {:<6} {:<20} {:>9.5} {:>9.5} {:>+8.1} {:>+10.2} {:>10.2}",
                i + 1,
                t.direction,
                t.close_time.format("%Y-%m-%d %H:%M"),
                t.entry_price,
                t.exit_price,
                t.pips,
                t.profit,
                t.balance_after
            );
        }

        if self.trades.len() > limit {
            println!("... {} more", self.trades.len() - limit);
        }
    }
}
