use crate::data::bar::Bar;
use crate::data::loader::load_csv;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

//capability interface for bar acquisition
//the engine only ever sees the bars a source returns
pub trait BarSource {
    //returns bars for the symbol in [from, to), oldest first
    fn fetch(
        &self,
        symbol: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>>;
}

//bar source backed by a single-symbol csv export
#[derive(Debug, Clone)]
pub struct CsvBarSource {
    path: PathBuf,
}

impl CsvBarSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvBarSource { path: path.into() }
    }
}

impl BarSource for CsvBarSource {
    fn fetch(
        &self,
        symbol: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>> {
        let bars = load_csv(&self.path)
            .context(format!("Failed to load {} bars from {:?}", symbol, self.path))?;

        Ok(within(bars, from, to))
    }
}

//in-memory bar source, mostly for tests and replays
#[derive(Debug, Clone, Default)]
pub struct MemoryBarSource {
    bars: Vec<Bar>,
}

impl MemoryBarSource {
    pub fn new(mut bars: Vec<Bar>) -> Self {
        bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        MemoryBarSource { bars }
    }
}

impl BarSource for MemoryBarSource {
    fn fetch(
        &self,
        _symbol: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>> {
        Ok(within(self.bars.clone(), from, to))
    }
}

fn within(bars: Vec<Bar>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Vec<Bar> {
    bars.into_iter()
        .filter(|bar| from.map_or(true, |f| bar.timestamp >= f))
        .filter(|bar| to.map_or(true, |t| bar.timestamp < t))
        .collect()
}
