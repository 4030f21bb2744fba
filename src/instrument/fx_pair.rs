use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SizingError {
    #[error("Stop distance must be positive, got {0} points")]
    ZeroStopDistance(f64),
    #[error("Tick value must be positive, got {0}")]
    ZeroTickValue(f64),
    #[error("Volume step must be positive, got {0}")]
    ZeroVolumeStep(f64),
}

//represents a quoted fx pair specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxPair {
    //pair symbol (eg eurusd)
    pub symbol: String,

    //quoted decimal places
    pub digits: u32,

    //minimum price fluctuation (one point)
    pub point: f64,

    //account-currency value of one point per standard lot
    pub tick_value: f64,

    //lot granularity
    pub volume_step: f64,

    //smallest and largest tradable volume
    pub volume_min: f64,
    pub volume_max: f64,
}

impl FxPair {
    //helper to create the 5-digit eurusd quote
    pub fn eurusd() -> Self {
        FxPair {
            symbol: "EURUSD".to_string(),
            digits: 5,
            point: 0.00001,
            tick_value: 1.0, //1 usd per point per lot
            volume_step: 0.01,
            volume_min: 0.01,
            volume_max: 100.0,
        }
    }

    //converts a distance in points to a price distance
    pub fn points_to_price(&self, points: f64) -> f64 {
        points * self.point
    }

    //converts a price difference to points
    pub fn price_to_points(&self, price_diff: f64) -> f64 {
        price_diff / self.point
    }

    //rounds a price to the quoted precision
    pub fn round_price(&self, price: f64) -> f64 {
        let scale = 10f64.powi(self.digits as i32);
        (price * scale).round() / scale
    }

    //whole quote increments in a price distance, as it survives rounding
    pub fn quoted_steps(&self, distance: f64) -> f64 {
        let scale = 10f64.powi(self.digits as i32);
        (distance * scale).round()
    }

    //calculates pnl in account currency from a price move
    //price_diff - exit minus entry for long, entry minus exit for short
    pub fn pnl_from_price_move(&self, price_diff: f64, lots: f64) -> f64 {
        self.price_to_points(price_diff) * self.tick_value * lots
    }

    //lot size risking risk_percent of balance over a stop of sl_points
    //rounded to the volume step and clamped to the tradable bounds
    pub fn lot_size(
        &self,
        balance: f64,
        risk_percent: f64,
        sl_points: f64,
    ) -> Result<f64, SizingError> {
        if sl_points <= 0.0 {
            return Err(SizingError::ZeroStopDistance(sl_points));
        }
        if self.tick_value <= 0.0 {
            return Err(SizingError::ZeroTickValue(self.tick_value));
        }
        if self.volume_step <= 0.0 {
            return Err(SizingError::ZeroVolumeStep(self.volume_step));
        }

        let risk_amount = balance * (risk_percent / 100.0);
        let raw = risk_amount / (sl_points * self.tick_value);
        let stepped = (raw / self.volume_step).round() * self.volume_step;

        Ok(stepped.clamp(self.volume_min, self.volume_max))
    }
}

impl Default for FxPair {
    fn default() -> Self {
        FxPair::eurusd()
    }
}
