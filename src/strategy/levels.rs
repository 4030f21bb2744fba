use crate::config::StrategyConfig;
use crate::engine::order::{CandidateOrder, OrderSide};
use crate::instrument::FxPair;
use crate::strategy::range::Session;

//turns a session range into one limit order per retracement fraction
#[derive(Debug, Clone)]
pub struct EntryLevelGenerator {
    fibo_levels: Vec<f64>,
    sl_distance: f64,
    partial_rr: Option<f64>,
    final_rr: f64,
    instrument: FxPair,
}

impl EntryLevelGenerator {
    pub fn new(
        fibo_levels: Vec<f64>,
        sl_distance: f64,
        partial_rr: Option<f64>,
        final_rr: f64,
        instrument: FxPair,
    ) -> Self {
        EntryLevelGenerator {
            fibo_levels,
            sl_distance,
            partial_rr,
            final_rr,
            instrument,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(
            config.fibo_levels.clone(),
            config.sl_distance(),
            config.targets.partial_rr,
            config.targets.final_rr,
            config.instrument.clone(),
        )
    }

    //one candidate per fraction, in configured order
    //levels that rounding collapses onto each other are dropped
    pub fn generate(&self, session: &Session) -> Vec<CandidateOrder> {
        self.fibo_levels
            .iter()
            .map(|&fibo| self.candidate(session, fibo))
            .filter(CandidateOrder::is_well_formed)
            .collect()
    }

    fn candidate(&self, session: &Session, fibo: f64) -> CandidateOrder {
        let range = session.range();
        let raw_entry = match session.side {
            OrderSide::Buy => session.range_high - range * fibo,
            OrderSide::Sell => session.range_low + range * fibo,
        };

        let round = |p: f64| self.instrument.round_price(p);
        let entry = round(raw_entry);
        let s = session.side.sign();

        CandidateOrder {
            side: session.side,
            entry_price: entry,
            stop_price: round(entry - s * self.sl_distance),
            partial_target_price: self
                .partial_rr
                .map(|rr| round(entry + s * self.sl_distance * rr)),
            final_target_price: round(entry + s * self.sl_distance * self.final_rr),
            fibo_level: fibo,
        }
    }
}
