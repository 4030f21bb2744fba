pub mod levels;
pub mod range;
pub mod risk;
pub mod trend;

pub use levels::EntryLevelGenerator;
pub use range::{side_for, RangeDetector, Session, SkipReason};
pub use risk::{DrawdownRisk, FixedRisk, RiskPolicy};
pub use trend::{EmaFilter, FillFilter, NoFilter};

//exponential moving average seeded with the first value
//alpha = 2 / (period + 1), one output per input
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());

    for &value in values {
        let next = match out.last() {
            Some(&prev) => alpha * value + (1.0 - alpha) * prev,
            None => value,
        };
        out.push(next);
    }

    out
}
