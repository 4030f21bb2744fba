use crate::engine::order::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//terminal state of a filled position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "stop")]
    Stop,
    #[serde(rename = "partial+breakeven")]
    PartialBreakeven,
    #[serde(rename = "partial+final")]
    PartialFinal,
    #[serde(rename = "direct-final")]
    DirectFinal,
    #[serde(rename = "forced-close")]
    ForcedClose,
    #[serde(rename = "unresolved")]
    Unresolved,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Stop => "stop",
            ExitReason::PartialBreakeven => "partial+breakeven",
            ExitReason::PartialFinal => "partial+final",
            ExitReason::DirectFinal => "direct-final",
            ExitReason::ForcedClose => "forced-close",
            ExitReason::Unresolved => "unresolved",
        }
    }
}

//un-scaled result of one simulated position, before account sizing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub side: OrderSide,
    pub fibo_level: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub realized_r: f64,
    pub exit_reason: ExitReason,
    pub partial_taken: bool,
}

//immutable ledger record of a sized trade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub side: OrderSide,
    pub fibo_level: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub realized_r: f64,
    pub risk_percent: f64,
    pub profit_amount: f64,
    pub balance_before: f64,
    pub balance_after: f64,
    pub exit_reason: ExitReason,
    pub partial_taken: bool,
}

impl Trade {
    //sizes a closed position against the balance it is applied to
    pub fn size(position: &ClosedPosition, risk_percent: f64, balance_before: f64) -> Self {
        let profit_amount = balance_before * (risk_percent / 100.0) * position.realized_r;

        Trade {
            entry_time: position.entry_time,
            exit_time: position.exit_time,
            side: position.side,
            fibo_level: position.fibo_level,
            entry_price: position.entry_price,
            exit_price: position.exit_price,
            realized_r: position.realized_r,
            risk_percent,
            profit_amount,
            balance_before,
            balance_after: balance_before + profit_amount,
            exit_reason: position.exit_reason,
            partial_taken: position.partial_taken,
        }
    }

    pub fn is_win(&self) -> bool {
        self.profit_amount > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.profit_amount < 0.0
    }
}
