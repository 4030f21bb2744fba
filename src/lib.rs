//intraday fibonacci range-retracement backtester for fx pairs

pub mod config;
pub mod data;
pub mod engine;
pub mod instrument;
pub mod metrics;
pub mod portfolio;
pub mod strategy;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        parse_weekdays, ConfigError, ForceCloseConfig, IntrabarPriority, RiskConfig,
        StrategyConfig, TargetConfig, TrendFilterConfig, TrendMode, UnresolvedPolicy,
    };
    pub use crate::data::{
        day_ranges, load_csv, parse_timestamp, Bar, BarSource, CsvBarSource, MemoryBarSource,
    };
    pub use crate::engine::{
        cancel_expired, plan_session, submit_plan, BacktestEngine, BacktestResult,
        CandidateOrder, LimitRequest, OrderGateway, OrderSide, PaperGateway, Quote, RunStats,
        SessionPlan, SimOutcome, Submission, TradeSimulator,
    };
    pub use crate::instrument::{FxPair, SizingError};
    pub use crate::metrics::{calculate_equity_curve, EquityPoint, SummaryMetrics};
    pub use crate::portfolio::{AccountState, ClosedPosition, ExitReason, Ledger, Trade};
    pub use crate::strategy::{
        DrawdownRisk, EmaFilter, EntryLevelGenerator, FillFilter, FixedRisk, NoFilter,
        RangeDetector, RiskPolicy, Session, SkipReason,
    };
}
