pub mod backtest_config;

pub use backtest_config::{
    parse_weekdays, ConfigError, ForceCloseConfig, IntrabarPriority, RiskConfig, StrategyConfig,
    TargetConfig, TrendFilterConfig, TrendMode, UnresolvedPolicy,
};
