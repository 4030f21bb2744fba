use crate::config::{ForceCloseConfig, StrategyConfig};
use crate::data::Bar;
use crate::engine::order::OrderSide;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;

//why a day produced no session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    WeekdayFiltered,
    TooFewBars,
    EmptyWindow,
    DegenerateRange,
    AmbiguousSide,
    NoBarsAfterWindow,
    InvalidCutoff,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::WeekdayFiltered => "weekday filtered",
            SkipReason::TooFewBars => "too few bars",
            SkipReason::EmptyWindow => "empty window",
            SkipReason::DegenerateRange => "degenerate range",
            SkipReason::AmbiguousSide => "ambiguous side",
            SkipReason::NoBarsAfterWindow => "no bars after window",
            SkipReason::InvalidCutoff => "invalid cutoff",
        }
    }
}

//one day's reference range and the setup it implies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub date: NaiveDate,
    pub range_high: f64,
    pub range_high_time: DateTime<Utc>,
    pub range_low: f64,
    pub range_low_time: DateTime<Utc>,
    pub force_close_time: DateTime<Utc>,
    pub side: OrderSide,
    //first bar (in the full series) after the observation window
    pub placement_index: usize,
}

impl Session {
    pub fn range(&self) -> f64 {
        self.range_high - self.range_low
    }
}

//low printed first means an upward impulse to buy back into, and vice versa
//equal times carry no direction
pub fn side_for(range_low_time: DateTime<Utc>, range_high_time: DateTime<Utc>) -> Option<OrderSide> {
    if range_low_time < range_high_time {
        Some(OrderSide::Buy)
    } else if range_high_time < range_low_time {
        Some(OrderSide::Sell)
    } else {
        None
    }
}

//derives sessions from an observation window of bars
#[derive(Debug, Clone, Copy)]
pub struct RangeDetector {
    start_hour: u32,
    end_hour: u32,
    min_day_bars: usize,
    force_close: ForceCloseConfig,
}

impl RangeDetector {
    pub fn new(
        start_hour: u32,
        end_hour: u32,
        min_day_bars: usize,
        force_close: ForceCloseConfig,
    ) -> Self {
        RangeDetector {
            start_hour,
            end_hour,
            min_day_bars,
            force_close,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(
            config.range_start_hour,
            config.range_end_hour,
            config.min_day_bars,
            config.force_close,
        )
    }

    //detects the session for the day occupying bars[day]
    //bars is the full chronological series so the placement bar may lie past the day
    pub fn detect(&self, bars: &[Bar], day: Range<usize>) -> Result<Session, SkipReason> {
        let session = self.measure(bars, day)?;
        if session.placement_index >= bars.len() {
            return Err(SkipReason::NoBarsAfterWindow);
        }
        Ok(session)
    }

    //like detect, but accepts a window that closes at the end of the series
    //used when orders are planned before the placement bar exists
    pub fn measure(&self, bars: &[Bar], day: Range<usize>) -> Result<Session, SkipReason> {
        let day_bars = &bars[day.clone()];
        let date = day_bars.first().ok_or(SkipReason::TooFewBars)?.date();

        if day_bars.len() < self.min_day_bars {
            return Err(SkipReason::TooFewBars);
        }

        //(index, price, time) of the extremes, earliest bar wins ties
        let mut high: Option<(usize, f64, DateTime<Utc>)> = None;
        let mut low: Option<(usize, f64, DateTime<Utc>)> = None;
        let mut last_in_window = None;

        for (offset, bar) in day_bars.iter().enumerate() {
            let hour = bar.hour();
            if hour < self.start_hour || hour >= self.end_hour {
                continue;
            }

            let index = day.start + offset;
            last_in_window = Some(index);

            if high.map_or(true, |(_, h, _)| bar.high > h) {
                high = Some((index, bar.high, bar.timestamp));
            }
            if low.map_or(true, |(_, l, _)| bar.low < l) {
                low = Some((index, bar.low, bar.timestamp));
            }
        }

        let (Some((_, range_high, range_high_time)), Some((_, range_low, range_low_time)), Some(last)) =
            (high, low, last_in_window)
        else {
            return Err(SkipReason::EmptyWindow);
        };

        if range_high - range_low <= 0.0 {
            return Err(SkipReason::DegenerateRange);
        }

        let side = side_for(range_low_time, range_high_time).ok_or(SkipReason::AmbiguousSide)?;

        let placement_index = last + 1;

        let force_close_time = self
            .force_close
            .cutoff(date)
            .ok_or(SkipReason::InvalidCutoff)?;

        Ok(Session {
            date,
            range_high,
            range_high_time,
            range_low,
            range_low_time,
            force_close_time,
            side,
            placement_index,
        })
    }
}
