use crate::metrics::timeseries::{calculate_equity_curve, EquityPoint};
use crate::portfolio::trade::Trade;
use serde::{Deserialize, Serialize};

//append-only record of sized trades in application order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    initial_balance: f64,
    trades: Vec<Trade>,
}

impl Ledger {
    pub fn new(initial_balance: f64) -> Self {
        Ledger {
            initial_balance,
            trades: Vec::new(),
        }
    }

    pub fn append(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn final_balance(&self) -> f64 {
        self.trades
            .last()
            .map(|t| t.balance_after)
            .unwrap_or(self.initial_balance)
    }

    //balance and drawdown after each trade, stamped at exit time
    pub fn equity_curve(&self) -> Vec<EquityPoint> {
        let timestamps: Vec<_> = self.trades.iter().map(|t| t.exit_time).collect();
        let balances: Vec<_> = self.trades.iter().map(|t| t.balance_after).collect();

        calculate_equity_curve(&timestamps, &balances, self.initial_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::order::OrderSide;
    use crate::portfolio::account::AccountState;
    use crate::portfolio::trade::{ClosedPosition, ExitReason};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn curve_tracks_balance_and_drawdown() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 13, 0, 0).unwrap();
        let mut account = AccountState::new(1000.0);
        let mut ledger = Ledger::new(1000.0);

        for (i, r) in [1.5, -1.0, -1.0].into_iter().enumerate() {
            let position = ClosedPosition {
                entry_time: start + Duration::days(i as i64),
                exit_time: start + Duration::days(i as i64) + Duration::hours(2),
                side: OrderSide::Sell,
                fibo_level: 0.786,
                entry_price: 1.1,
                exit_price: 1.1,
                realized_r: r,
                exit_reason: if r > 0.0 {
                    ExitReason::PartialBreakeven
                } else {
                    ExitReason::Stop
                },
                partial_taken: r > 0.0,
            };
            ledger.append(account.apply(&position, 1.0));
        }

        let curve = ledger.equity_curve();
        assert_eq!(curve.len(), 3);
        assert_eq!(curve[0].equity, 1015.0);
        assert_eq!(curve[0].drawdown, 0.0);
        assert!(curve[2].drawdown > curve[1].drawdown);
        assert_eq!(ledger.final_balance(), account.balance);

        //the curve reports the account's signed drawdown as a positive fraction
        let last = curve[2].drawdown;
        assert!(last > 0.0);
        assert!((last + account.drawdown()).abs() < 1e-12);
    }

    #[test]
    fn empty_ledger_reports_initial_balance() {
        let ledger = Ledger::new(500.0);
        assert!(ledger.is_empty());
        assert_eq!(ledger.final_balance(), 500.0);
        assert!(ledger.equity_curve().is_empty());
    }
}
