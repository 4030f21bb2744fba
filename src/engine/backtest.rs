use crate::config::{ConfigError, StrategyConfig};
use crate::data::{day_ranges, Bar};
use crate::engine::simulator::{SimOutcome, TradeSimulator};
use crate::metrics::{EquityPoint, SummaryMetrics};
use crate::portfolio::{AccountState, ClosedPosition, ExitReason, Ledger};
use crate::strategy::{
    DrawdownRisk, EmaFilter, EntryLevelGenerator, FillFilter, NoFilter, RangeDetector,
    RiskPolicy, SkipReason,
};
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};

//result of a backtest
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub summary: SummaryMetrics,
    pub equity_curve: Vec<EquityPoint>,
    pub ledger: Ledger,
    pub account: AccountState,
    pub stats: RunStats,
}

//counts of everything that did not become a ledger trade
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub days: usize,
    pub sessions: usize,
    pub orders: usize,
    pub canceled: usize,
    pub filtered: usize,
    pub unresolved_excluded: usize,
    pub skipped: IndexMap<SkipReason, usize>,
}

//phase 1 output for one day
#[derive(Debug, Clone)]
struct DayPlan {
    date: NaiveDate,
    outcome: Result<DaySimulation, SkipReason>,
}

#[derive(Debug, Clone)]
struct DaySimulation {
    placement_time: DateTime<Utc>,
    results: Vec<SimOutcome>,
}

//closed position waiting for its exit to be booked
#[derive(Debug, Clone, Copy)]
struct Scheduled {
    position: ClosedPosition,
    risk_percent: f64,
    seq: usize,
}

//main backtest engine
//phase 1 simulates days in parallel, phase 2 books them in exit order
pub struct BacktestEngine {
    config: StrategyConfig,
    bars: Vec<Bar>,
    risk: Arc<dyn RiskPolicy>,
    filter: Arc<dyn FillFilter>,
    trade_from: Option<NaiveDate>,
}

impl BacktestEngine {
    //creates a new engine with the policies the config describes
    pub fn new(config: StrategyConfig, mut bars: Vec<Bar>) -> Result<Self, ConfigError> {
        config.validate()?;

        bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let filter: Arc<dyn FillFilter> = match &config.trend_filter {
            Some(trend) => Arc::new(EmaFilter::from_config(&bars, trend)),
            None => Arc::new(NoFilter),
        };
        let risk: Arc<dyn RiskPolicy> = Arc::new(DrawdownRisk::from_config(&config.risk));

        Ok(BacktestEngine {
            config,
            bars,
            risk,
            filter,
            trade_from: None,
        })
    }

    pub fn with_risk_policy(mut self, risk: Arc<dyn RiskPolicy>) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_fill_filter(mut self, filter: Arc<dyn FillFilter>) -> Self {
        self.filter = filter;
        self
    }

    //earlier days only warm up indicators
    pub fn trading_from(mut self, date: NaiveDate) -> Self {
        self.trade_from = Some(date);
        self
    }

    //runs the backtest
    pub fn run(&self) -> BacktestResult {
        let days: Vec<(NaiveDate, Range<usize>)> = day_ranges(&self.bars)
            .into_iter()
            .filter(|(date, _)| self.trade_from.map_or(true, |from| *date >= from))
            .collect();

        info!(
            bars = self.bars.len(),
            days = days.len(),
            risk = self.risk.name(),
            filter = self.filter.name(),
            "starting backtest"
        );

        let detector = RangeDetector::from_config(&self.config);
        let generator = EntryLevelGenerator::from_config(&self.config);
        let simulator = TradeSimulator::from_config(&self.config);

        let plans: Vec<DayPlan> = days
            .par_iter()
            .map(|(date, range)| self.plan_day(*date, range.clone(), &detector, &generator, &simulator))
            .collect();

        let result = self.settle(plans);

        info!(
            trades = result.ledger.len(),
            final_balance = result.account.balance,
            peak_balance = result.account.peak_balance,
            "backtest finished"
        );

        result
    }

    //phase 1: everything about a day that does not depend on the account
    fn plan_day(
        &self,
        date: NaiveDate,
        range: Range<usize>,
        detector: &RangeDetector,
        generator: &EntryLevelGenerator,
        simulator: &TradeSimulator,
    ) -> DayPlan {
        if !self.config.trades_on(date) {
            return DayPlan {
                date,
                outcome: Err(SkipReason::WeekdayFiltered),
            };
        }

        let outcome = detector.detect(&self.bars, range).map(|session| {
            let results = generator
                .generate(&session)
                .iter()
                .map(|order| {
                    simulator.simulate(
                        &self.bars,
                        session.placement_index,
                        order,
                        session.force_close_time,
                        self.filter.as_ref(),
                    )
                })
                .collect();

            DaySimulation {
                placement_time: self.bars[session.placement_index].timestamp,
                results,
            }
        });

        DayPlan { date, outcome }
    }

    //phase 2: thread the account through closed positions in exit order
    fn settle(&self, plans: Vec<DayPlan>) -> BacktestResult {
        let mut account = AccountState::new(self.config.initial_balance);
        let mut ledger = Ledger::new(self.config.initial_balance);
        let mut stats = RunStats {
            days: plans.len(),
            ..RunStats::default()
        };
        let mut pending: Vec<Scheduled> = Vec::new();
        let mut seq = 0;

        for plan in plans {
            let day = match plan.outcome {
                Ok(day) => day,
                Err(reason) => {
                    debug!(date = %plan.date, reason = reason.as_str(), "skipping day");
                    *stats.skipped.entry(reason).or_insert(0) += 1;
                    continue;
                }
            };

            //everything that closed before today's orders go in counts toward today's risk
            book_until(&mut pending, Some(day.placement_time), &mut account, &mut ledger);
            let risk_percent = self.risk.risk_percent(&account);

            stats.sessions += 1;
            stats.orders += day.results.len();

            for outcome in day.results {
                match outcome {
                    SimOutcome::Canceled => stats.canceled += 1,
                    SimOutcome::Filtered => stats.filtered += 1,
                    SimOutcome::Unresolved { entry_time } => {
                        warn!(date = %plan.date, %entry_time, "open position dropped at end of history");
                        stats.unresolved_excluded += 1;
                    }
                    SimOutcome::Closed(position) => {
                        if position.exit_reason == ExitReason::Unresolved {
                            warn!(
                                date = %plan.date,
                                exit_price = position.exit_price,
                                "open position marked to market at end of history"
                            );
                        }
                        pending.push(Scheduled {
                            position,
                            risk_percent,
                            seq,
                        });
                        seq += 1;
                    }
                }
            }
        }

        book_until(&mut pending, None, &mut account, &mut ledger);

        let equity_curve = ledger.equity_curve();
        let summary = SummaryMetrics::from_ledger(&ledger, &equity_curve);

        BacktestResult {
            summary,
            equity_curve,
            ledger,
            account,
            stats,
        }
    }
}

//books pending positions that exited at or before `until` (all when none)
//order: exit time, then entry time, then the order they were planned in
fn book_until(
    pending: &mut Vec<Scheduled>,
    until: Option<DateTime<Utc>>,
    account: &mut AccountState,
    ledger: &mut Ledger,
) {
    pending.sort_by(|a, b| {
        a.position
            .exit_time
            .cmp(&b.position.exit_time)
            .then(a.position.entry_time.cmp(&b.position.entry_time))
            .then(a.seq.cmp(&b.seq))
    });

    let due = match until {
        Some(t) => pending.partition_point(|s| s.position.exit_time <= t),
        None => pending.len(),
    };

    for scheduled in pending.drain(..due) {
        ledger.append(account.apply(&scheduled.position, scheduled.risk_percent));
    }
}
