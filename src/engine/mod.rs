pub mod backtest;
pub mod gateway;
pub mod order;
pub mod planner;
pub mod simulator;

pub use backtest::{BacktestEngine, BacktestResult, RunStats};
pub use gateway::{GatewayError, LimitRequest, OrderGateway, PaperGateway, Quote};
pub use order::{CandidateOrder, OrderSide};
pub use planner::{cancel_expired, plan_session, submit_plan, SessionPlan, Submission};
pub use simulator::{SimOutcome, TradeSimulator};
