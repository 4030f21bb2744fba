use crate::data::Bar;
use serde::{Deserialize, Serialize};

//order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    //converts to price direction sign (Buy = +1, Sell = -1)
    pub fn sign(&self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

//hypothetical limit order produced for one retracement level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateOrder {
    pub side: OrderSide,
    pub entry_price: f64,
    pub stop_price: f64,
    //absent when no partial stage is configured
    pub partial_target_price: Option<f64>,
    pub final_target_price: f64,
    pub fibo_level: f64,
}

impl CandidateOrder {
    //stop < entry < partial < final for buys, mirrored for sells
    pub fn is_well_formed(&self) -> bool {
        let s = self.side.sign();
        let above = |a: f64, b: f64| s * (a - b) > 0.0;

        let partial_ok = match self.partial_target_price {
            Some(partial) => {
                above(partial, self.entry_price) && above(self.final_target_price, partial)
            }
            None => above(self.final_target_price, self.entry_price),
        };

        above(self.entry_price, self.stop_price) && partial_ok
    }

    //true once the bar trades through the limit price
    pub fn fills_on(&self, bar: &Bar) -> bool {
        self.touches(bar, self.entry_price, false)
    }

    //true when the bar reaches a protective level on the adverse side
    pub fn stop_touched(&self, bar: &Bar, stop: f64) -> bool {
        self.touches(bar, stop, false)
    }

    //true when the bar reaches a target on the favourable side
    pub fn target_touched(&self, bar: &Bar, target: f64) -> bool {
        self.touches(bar, target, true)
    }

    fn touches(&self, bar: &Bar, level: f64, favourable: bool) -> bool {
        match (self.side, favourable) {
            (OrderSide::Buy, false) | (OrderSide::Sell, true) => bar.low <= level,
            (OrderSide::Buy, true) | (OrderSide::Sell, false) => bar.high >= level,
        }
    }

    //profit of a full-size exit at price, in multiples of the initial stop distance
    pub fn mark_to_market_r(&self, price: f64) -> f64 {
        match self.side {
            OrderSide::Buy => (price - self.entry_price) / (self.entry_price - self.stop_price),
            OrderSide::Sell => (self.entry_price - price) / (self.stop_price - self.entry_price),
        }
    }
}
