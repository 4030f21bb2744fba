use crate::config::{TrendFilterConfig, TrendMode};
use crate::data::Bar;
use crate::engine::order::OrderSide;
use crate::strategy::ema;

//directional gate checked when a limit order fills
pub trait FillFilter: Send + Sync {
    //bar_index is the fill bar's position in the full series
    fn allows(&self, side: OrderSide, entry_price: f64, bar_index: usize) -> bool;

    fn name(&self) -> &str;
}

//lets every fill through
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl FillFilter for NoFilter {
    fn allows(&self, _side: OrderSide, _entry_price: f64, _bar_index: usize) -> bool {
        true
    }

    fn name(&self) -> &str {
        "None"
    }
}

//compares the entry with an ema of closes at the fill bar
#[derive(Debug, Clone)]
pub struct EmaFilter {
    mode: TrendMode,
    values: Vec<f64>,
}

impl EmaFilter {
    pub fn new(bars: &[Bar], period: usize, mode: TrendMode) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        EmaFilter {
            mode,
            values: ema(&closes, period),
        }
    }

    pub fn from_config(bars: &[Bar], config: &TrendFilterConfig) -> Self {
        Self::new(bars, config.period, config.mode)
    }

    pub fn value_at(&self, bar_index: usize) -> Option<f64> {
        self.values.get(bar_index).copied()
    }
}

impl FillFilter for EmaFilter {
    fn allows(&self, side: OrderSide, entry_price: f64, bar_index: usize) -> bool {
        let Some(ema) = self.value_at(bar_index) else {
            return false;
        };

        match (self.mode, side) {
            (TrendMode::WithTrend, OrderSide::Buy) | (TrendMode::Reverse, OrderSide::Sell) => {
                entry_price >= ema
            }
            (TrendMode::WithTrend, OrderSide::Sell) | (TrendMode::Reverse, OrderSide::Buy) => {
                entry_price <= ema
            }
        }
    }

    fn name(&self) -> &str {
        match self.mode {
            TrendMode::WithTrend => "EMA With-Trend",
            TrendMode::Reverse => "EMA Reverse",
        }
    }
}
