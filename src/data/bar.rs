use chrono::{DateTime, NaiveDate, Timelike, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum BarError {
    #[error("Invalid OHLC values: high ({high}) < low ({low})")]
    InvalidHighLow { high: f64, low: f64 },
    #[error("Invalid OHLC values: close ({close}) outside high-low range [{low}, {high}]")]
    InvalidClose { close: f64, high: f64, low: f64 },
    #[error("Invalid OHLC values: open ({open}) outside high-low range [{low}, {high}]")]
    InvalidOpen { open: f64, high: f64, low: f64 },
}

//represents a single ohlc bar of market data
//timestamps carry the feed's own clock (broker server time), tagged as utc
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    //creates a new Bar with validation
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Result<Self, BarError> {
        //validate high >= low
        if high < low {
            return Err(BarError::InvalidHighLow { high, low });
        }

        //validate close within [low, high]
        if close < low || close > high {
            return Err(BarError::InvalidClose { close, high, low });
        }

        //validate open within [low, high]
        if open < low || open > high {
            return Err(BarError::InvalidOpen { open, high, low });
        }

        Ok(Bar::new_unchecked(timestamp, open, high, low, close))
    }

    //creates a Bar without validation
    pub fn new_unchecked(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Self {
        Bar {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }

    //calendar day of the bar in feed-local time
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    //hour of the bar in feed-local time
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    //returns the range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

//groups a chronological series into contiguous per-day index ranges
pub fn day_ranges(bars: &[Bar]) -> IndexMap<NaiveDate, Range<usize>> {
    let mut days: IndexMap<NaiveDate, Range<usize>> = IndexMap::new();

    for (index, bar) in bars.iter().enumerate() {
        days.entry(bar.date())
            .and_modify(|range| range.end = index + 1)
            .or_insert(index..index + 1);
    }

    days
}
