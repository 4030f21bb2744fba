use crate::portfolio::trade::{ClosedPosition, Trade};
use serde::{Deserialize, Serialize};

//running balance and high-water mark of the simulated account
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    //realized balance after every applied trade
    pub balance: f64,

    //highest balance seen so far
    pub peak_balance: f64,
}

impl AccountState {
    //creates a new account with initial balance
    pub fn new(initial_balance: f64) -> Self {
        AccountState {
            balance: initial_balance,
            peak_balance: initial_balance,
        }
    }

    //signed drawdown from peak, 0 or below, compared against the negative dd threshold
    //the equity curve reports the same distance as a positive fraction
    pub fn drawdown(&self) -> f64 {
        if self.peak_balance > 0.0 {
            (self.balance - self.peak_balance) / self.peak_balance
        } else {
            0.0
        }
    }

    //sizes the position against the current balance, books it and returns the record
    //the peak is refreshed after every close
    pub fn apply(&mut self, position: &ClosedPosition, risk_percent: f64) -> Trade {
        let trade = Trade::size(position, risk_percent, self.balance);

        self.balance = trade.balance_after;
        if self.balance > self.peak_balance {
            self.peak_balance = self.balance;
        }

        trade
    }
}
