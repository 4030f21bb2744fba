use crate::metrics::timeseries::{max_drawdown, EquityPoint};
use crate::portfolio::{ExitReason, Ledger, Trade};
use indexmap::IndexMap;
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//summary metrics for a backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub max_drawdown: f64,
    pub num_trades: usize,
    pub num_winning_trades: usize,
    pub num_losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64,
    //r-multiple statistics, independent of sizing
    pub total_r: f64,
    pub expectancy_r: f64,
    pub r_std_dev: f64,
    pub sqn: f64,
    //exit reason counts in first-seen order
    pub exit_reasons: IndexMap<ExitReason, usize>,
}

impl SummaryMetrics {
    //calculate summary metrics from the ledger and its equity curve
    pub fn from_ledger(ledger: &Ledger, equity_curve: &[EquityPoint]) -> Self {
        let initial_balance = ledger.initial_balance();
        let final_balance = ledger.final_balance();
        let total_return = final_balance - initial_balance;

        let trades = ledger.trades();
        let stats = calculate_trade_statistics(trades);

        let mut exit_reasons = IndexMap::new();
        for trade in trades {
            *exit_reasons.entry(trade.exit_reason).or_insert(0) += 1;
        }

        SummaryMetrics {
            initial_balance,
            final_balance,
            total_return,
            total_return_pct: total_return / initial_balance,
            max_drawdown: max_drawdown(equity_curve),
            num_trades: trades.len(),
            num_winning_trades: stats.num_winning_trades,
            num_losing_trades: stats.num_losing_trades,
            win_rate: stats.win_rate,
            avg_win: stats.avg_win,
            avg_loss: stats.avg_loss,
            largest_win: stats.largest_win,
            largest_loss: stats.largest_loss,
            profit_factor: stats.profit_factor,
            total_r: stats.total_r,
            expectancy_r: stats.expectancy_r,
            r_std_dev: stats.r_std_dev,
            sqn: stats.sqn,
            exit_reasons,
        }
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self) {
        let mut table = Table::new();

        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));

        let rows: Vec<(&str, String)> = vec![
            ("Initial Balance", format!("${:.2}", self.initial_balance)),
            ("Final Balance", format!("${:.2}", self.final_balance)),
            (
                "Total Return",
                format!(
                    "${:.2} ({:.2}%)",
                    self.total_return,
                    self.total_return_pct * 100.0
                ),
            ),
            ("Max Drawdown", format!("{:.2}%", self.max_drawdown * 100.0)),
            ("Number of Trades", format!("{}", self.num_trades)),
            (
                "Wins / Losses",
                format!("{} / {}", self.num_winning_trades, self.num_losing_trades),
            ),
            ("Win Rate", format!("{:.2}%", self.win_rate * 100.0)),
            ("Avg Win", format!("${:.2}", self.avg_win)),
            ("Avg Loss", format!("${:.2}", self.avg_loss)),
            ("Largest Win", format!("${:.2}", self.largest_win)),
            ("Largest Loss", format!("${:.2}", self.largest_loss)),
            ("Profit Factor", format!("{:.3}", self.profit_factor)),
            ("Total R", format!("{:.2}R", self.total_r)),
            ("Expectancy", format!("{:.3}R", self.expectancy_r)),
            ("R Std Dev", format!("{:.3}", self.r_std_dev)),
            ("SQN", format!("{:.3}", self.sqn)),
        ];

        for (name, value) in rows {
            table.add_row(Row::new(vec![Cell::new(name), Cell::new(&value)]));
        }

        for (reason, count) in &self.exit_reasons {
            table.add_row(Row::new(vec![
                Cell::new(&format!("Exit: {}", reason.as_str())),
                Cell::new(&format!("{}", count)),
            ]));
        }

        table.printstd();
    }
}

struct TradeStats {
    num_winning_trades: usize,
    num_losing_trades: usize,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    largest_win: f64,
    largest_loss: f64,
    profit_factor: f64,
    total_r: f64,
    expectancy_r: f64,
    r_std_dev: f64,
    sqn: f64,
}

fn calculate_trade_statistics(trades: &[Trade]) -> TradeStats {
    if trades.is_empty() {
        return TradeStats {
            num_winning_trades: 0,
            num_losing_trades: 0,
            win_rate: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            largest_win: 0.0,
            largest_loss: 0.0,
            profit_factor: 0.0,
            total_r: 0.0,
            expectancy_r: 0.0,
            r_std_dev: 0.0,
            sqn: 0.0,
        };
    }

    let winning_trades: Vec<f64> = trades
        .iter()
        .filter(|t| t.is_win())
        .map(|t| t.profit_amount)
        .collect();
    let losing_trades: Vec<f64> = trades
        .iter()
        .filter(|t| t.is_loss())
        .map(|t| t.profit_amount)
        .collect();

    let num_winning = winning_trades.len();
    let num_losing = losing_trades.len();

    let avg_win = if num_winning > 0 {
        winning_trades.iter().sum::<f64>() / num_winning as f64
    } else {
        0.0
    };

    let avg_loss = if num_losing > 0 {
        losing_trades.iter().sum::<f64>() / num_losing as f64
    } else {
        0.0
    };

    let total_wins: f64 = winning_trades.iter().sum();
    let total_losses: f64 = losing_trades.iter().sum::<f64>().abs();

    let profit_factor = if total_losses > 0.0 {
        total_wins / total_losses
    } else if total_wins > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let r_multiples: Vec<f64> = trades.iter().map(|t| t.realized_r).collect();
    let total_r: f64 = r_multiples.iter().sum();
    let expectancy_r = total_r / r_multiples.len() as f64;

    //sample std dev needs two observations
    let r_std_dev = if r_multiples.len() > 1 {
        r_multiples.as_slice().std_dev()
    } else {
        0.0
    };

    let sqn = if r_std_dev > 0.0 {
        r_multiples.as_slice().mean() / r_std_dev * (r_multiples.len() as f64).sqrt()
    } else {
        0.0
    };

    TradeStats {
        num_winning_trades: num_winning,
        num_losing_trades: num_losing,
        win_rate: num_winning as f64 / trades.len() as f64,
        avg_win,
        avg_loss,
        largest_win: winning_trades.iter().fold(0.0f64, |a, &b| a.max(b)),
        largest_loss: losing_trades.iter().fold(0.0f64, |a, &b| a.min(b)),
        profit_factor,
        total_r,
        expectancy_r,
        r_std_dev,
        sqn,
    }
}
