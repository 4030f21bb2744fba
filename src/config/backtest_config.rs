use crate::instrument::FxPair;
use anyhow::Context;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Range window [{start}, {end}) is not a valid hour span")]
    InvalidWindow { start: u32, end: u32 },
    #[error("At least one fibonacci level is required")]
    NoFiboLevels,
    #[error("Fibonacci level {0} must lie strictly between 0 and 1")]
    InvalidFiboLevel(f64),
    #[error("Stop distance must be positive, got {0} points")]
    NonPositiveStop(f64),
    #[error("Final target ratio must be positive, got {0}")]
    NonPositiveFinalRr(f64),
    #[error("Partial target ratio {partial} must be positive and below final ratio {target}")]
    InvalidPartialRr { partial: f64, target: f64 },
    #[error("Force close {hour:02}:{minute:02} (+{day_offset}d) is not a valid cutoff after the range window")]
    InvalidForceClose {
        day_offset: u32,
        hour: u32,
        minute: u32,
    },
    #[error("Weekday index {0} is out of range (0 = Monday .. 6 = Sunday)")]
    InvalidWeekday(u32),
    #[error("Risk percentages must be positive, got base {base} and reduced {reduced}")]
    NonPositiveRisk { base: f64, reduced: f64 },
    #[error("Drawdown threshold must be negative, got {0}")]
    InvalidDrawdownThreshold(f64),
    #[error("Initial balance must be positive, got {0}")]
    NonPositiveBalance(f64),
    #[error("Instrument point size must be positive, got {0}")]
    NonPositivePoint(f64),
    #[error("Stop of {0} points rounds to less than one quoted step")]
    StopBelowQuote(f64),
    #[error("Targets at partial {partial:?} and final {target} round onto the entry or onto each other")]
    CollapsedTargets { partial: Option<f64>, target: f64 },
    #[error("Trend filter period must be at least 1")]
    ZeroTrendPeriod,
}

//direction the trend gate enforces at fill time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMode {
    //buy at or above the ema, sell at or below it
    WithTrend,
    //buy at or below the ema, sell at or above it
    Reverse,
}

impl TrendMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "with" | "with_trend" | "trend" => Some(TrendMode::WithTrend),
            "reverse" | "rev" | "counter" => Some(TrendMode::Reverse),
            _ => None,
        }
    }
}

//ema fill filter parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendFilterConfig {
    pub period: usize,
    pub mode: TrendMode,
}

//check order inside one bar once a position is open
//ohlc bars hide the true path, so this is a modeling choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntrabarPriority {
    //partial target, then stop, then final target
    #[default]
    TargetFirst,
    //stop, then partial target, then final target
    StopFirst,
}

//what happens to a position still open when history runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPolicy {
    //close at the last available close and record it as unresolved
    #[default]
    MarkToMarket,
    //drop it from the ledger, only counted in run statistics
    Exclude,
}

//daily cutoff for pending orders and open positions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceCloseConfig {
    //days after the session date
    pub day_offset: u32,
    pub hour: u32,
    pub minute: u32,
}

impl ForceCloseConfig {
    //cutoff instant for a session date, on the feed clock
    pub fn cutoff(&self, date: NaiveDate) -> Option<chrono::DateTime<chrono::Utc>> {
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0)?;
        let day = date.checked_add_signed(Duration::days(i64::from(self.day_offset)))?;
        Some(day.and_time(time).and_utc())
    }

    //minutes from the session date's midnight to the cutoff, none on overflow
    fn minutes_after_midnight(&self) -> Option<u32> {
        self.day_offset
            .checked_mul(24 * 60)?
            .checked_add(self.hour.checked_mul(60)?)?
            .checked_add(self.minute)
    }
}

impl Default for ForceCloseConfig {
    fn default() -> Self {
        ForceCloseConfig {
            day_offset: 1,
            hour: 0,
            minute: 0,
        }
    }
}

//exit stage ratios, as multiples of the stop distance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    //half the position closes here and the stop moves to entry
    pub partial_rr: Option<f64>,
    pub final_rr: f64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            partial_rr: Some(3.0),
            final_rr: 6.0,
        }
    }
}

//drawdown-adaptive risk settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub base_risk: f64,
    pub reduced_risk: f64,
    //fraction, eg -0.05 for a 5% drawdown
    pub dd_threshold: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            base_risk: 1.0,
            reduced_risk: 0.5,
            dd_threshold: -0.05,
        }
    }
}

//complete strategy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    //instrument
    pub instrument: FxPair,

    //range window [start, end) in feed hours
    pub range_start_hour: u32,
    pub range_end_hour: u32,

    //days with fewer bars are skipped
    pub min_day_bars: usize,

    //entries
    pub fibo_levels: Vec<f64>,
    pub sl_points: f64,

    //exits
    pub targets: TargetConfig,
    pub force_close: ForceCloseConfig,
    pub intrabar_priority: IntrabarPriority,
    pub unresolved_policy: UnresolvedPolicy,

    //monday = 0, none trades every day
    pub allowed_weekdays: Option<Vec<u32>>,

    //optional ema gate applied at fill time
    pub trend_filter: Option<TrendFilterConfig>,

    //account
    pub initial_balance: f64,
    pub risk: RiskConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            instrument: FxPair::eurusd(),
            range_start_hour: 9,
            range_end_hour: 12,
            min_day_bars: 5,
            fibo_levels: vec![0.618, 0.786],
            sl_points: 15.0,
            targets: TargetConfig::default(),
            force_close: ForceCloseConfig::default(),
            intrabar_priority: IntrabarPriority::default(),
            unresolved_policy: UnresolvedPolicy::default(),
            allowed_weekdays: None,
            trend_filter: None,
            initial_balance: 1000.0,
            risk: RiskConfig::default(),
        }
    }
}

impl StrategyConfig {
    //checks every option the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.range_start_hour >= self.range_end_hour || self.range_end_hour > 24 {
            return Err(ConfigError::InvalidWindow {
                start: self.range_start_hour,
                end: self.range_end_hour,
            });
        }

        if self.fibo_levels.is_empty() {
            return Err(ConfigError::NoFiboLevels);
        }
        if let Some(&bad) = self
            .fibo_levels
            .iter()
            .find(|&&f| !(f > 0.0 && f < 1.0))
        {
            return Err(ConfigError::InvalidFiboLevel(bad));
        }

        if !(self.sl_points > 0.0) {
            return Err(ConfigError::NonPositiveStop(self.sl_points));
        }
        if !(self.instrument.point > 0.0) {
            return Err(ConfigError::NonPositivePoint(self.instrument.point));
        }

        let target = self.targets.final_rr;
        if !(target > 0.0) {
            return Err(ConfigError::NonPositiveFinalRr(target));
        }
        if let Some(partial) = self.targets.partial_rr {
            if !(partial > 0.0 && partial < target) {
                return Err(ConfigError::InvalidPartialRr { partial, target });
            }
        }

        //levels are rounded to the instrument digits, every distance needs a whole step
        let sl = self.sl_distance();
        let stop_steps = self.instrument.quoted_steps(sl);
        if stop_steps < 1.0 {
            return Err(ConfigError::StopBelowQuote(self.sl_points));
        }
        let final_steps = self.instrument.quoted_steps(sl * target);
        let partial_steps = self
            .targets
            .partial_rr
            .map(|partial| self.instrument.quoted_steps(sl * partial));
        let collapsed = match partial_steps {
            Some(partial) => partial < 1.0 || final_steps <= partial,
            None => final_steps < 1.0,
        };
        if collapsed {
            return Err(ConfigError::CollapsedTargets {
                partial: self.targets.partial_rr,
                target,
            });
        }

        let fc = self.force_close;
        if fc.hour > 23
            || fc.minute > 59
            || fc
                .minutes_after_midnight()
                .map_or(true, |m| m < self.range_end_hour * 60)
        {
            return Err(ConfigError::InvalidForceClose {
                day_offset: fc.day_offset,
                hour: fc.hour,
                minute: fc.minute,
            });
        }

        if let Some(days) = &self.allowed_weekdays {
            if let Some(&bad) = days.iter().find(|&&d| d > 6) {
                return Err(ConfigError::InvalidWeekday(bad));
            }
        }

        if let Some(filter) = self.trend_filter {
            if filter.period == 0 {
                return Err(ConfigError::ZeroTrendPeriod);
            }
        }

        if !(self.risk.base_risk > 0.0 && self.risk.reduced_risk > 0.0) {
            return Err(ConfigError::NonPositiveRisk {
                base: self.risk.base_risk,
                reduced: self.risk.reduced_risk,
            });
        }
        if !(self.risk.dd_threshold < 0.0) {
            return Err(ConfigError::InvalidDrawdownThreshold(self.risk.dd_threshold));
        }

        if !(self.initial_balance > 0.0) {
            return Err(ConfigError::NonPositiveBalance(self.initial_balance));
        }

        Ok(())
    }

    //true when the weekday filter lets this date trade
    pub fn trades_on(&self, date: NaiveDate) -> bool {
        match &self.allowed_weekdays {
            None => true,
            Some(days) => days.contains(&date.weekday().num_days_from_monday()),
        }
    }

    //stop distance in price units
    pub fn sl_distance(&self) -> f64 {
        self.instrument.points_to_price(self.sl_points)
    }

    //load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read config {:?}", path))?;
        let config: StrategyConfig = serde_json::from_str(&contents)
            .context(format!("Failed to parse config {:?}", path))?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

//parses a weekday list such as "mon,tue,wed,fri" or "0,1,2,4"
pub fn parse_weekdays(raw: &str) -> Option<Vec<u32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<u32>() {
            Ok(n) => Some(n),
            Err(_) => s
                .parse::<Weekday>()
                .ok()
                .map(|w| w.num_days_from_monday()),
        })
        .collect()
}
