use crate::config::{IntrabarPriority, StrategyConfig, UnresolvedPolicy};
use crate::data::Bar;
use crate::engine::order::CandidateOrder;
use crate::portfolio::{ClosedPosition, ExitReason};
use crate::strategy::FillFilter;
use chrono::{DateTime, Utc};

//share of the position closed at the partial target
const PARTIAL_FRACTION: f64 = 0.5;

//how a candidate order ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimOutcome {
    //never filled before the cutoff
    Canceled,
    //filled, but the fill filter rejected it
    Filtered,
    //still open when history ran out under UnresolvedPolicy::Exclude
    Unresolved { entry_time: DateTime<Utc> },
    Closed(ClosedPosition),
}

//lifecycle of one position
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Filled,
    //partial target taken, remainder protected at entry
    Partial,
}

//walks one candidate order bar by bar from placement to exit
#[derive(Debug, Clone, Copy)]
pub struct TradeSimulator {
    partial_rr: Option<f64>,
    final_rr: f64,
    priority: IntrabarPriority,
    unresolved: UnresolvedPolicy,
}

impl TradeSimulator {
    pub fn new(
        partial_rr: Option<f64>,
        final_rr: f64,
        priority: IntrabarPriority,
        unresolved: UnresolvedPolicy,
    ) -> Self {
        TradeSimulator {
            partial_rr,
            final_rr,
            priority,
            unresolved,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(
            config.targets.partial_rr,
            config.targets.final_rr,
            config.intrabar_priority,
            config.unresolved_policy,
        )
    }

    //runs the order against bars[start..]
    pub fn simulate(
        &self,
        bars: &[Bar],
        start: usize,
        order: &CandidateOrder,
        force_close_time: DateTime<Utc>,
        filter: &dyn FillFilter,
    ) -> SimOutcome {
        //pending: the cutoff cancels an unfilled order
        let fill = bars
            .iter()
            .enumerate()
            .skip(start)
            .take_while(|(_, bar)| bar.timestamp < force_close_time)
            .find(|(_, bar)| order.fills_on(bar));

        let Some((fill_index, fill_bar)) = fill else {
            return SimOutcome::Canceled;
        };

        if !filter.allows(order.side, order.entry_price, fill_index) {
            return SimOutcome::Filtered;
        }

        self.manage(bars, fill_index, fill_bar.timestamp, order, force_close_time)
    }

    //filled -> (partial) -> closed, starting on the bar after the fill
    fn manage(
        &self,
        bars: &[Bar],
        fill_index: usize,
        entry_time: DateTime<Utc>,
        order: &CandidateOrder,
        force_close_time: DateTime<Utc>,
    ) -> SimOutcome {
        let mut stage = Stage::Filled;
        let mut stop = order.stop_price;

        for bar in &bars[fill_index + 1..] {
            if bar.timestamp >= force_close_time {
                let r = self.blend(stage, order.mark_to_market_r(bar.open));
                return self.close(order, entry_time, bar, bar.open, r, ExitReason::ForcedClose, stage);
            }

            if self.priority == IntrabarPriority::StopFirst && order.stop_touched(bar, stop) {
                return self.stopped(order, entry_time, bar, stop, stage);
            }

            if stage == Stage::Filled {
                if let Some(partial) = order.partial_target_price {
                    if order.target_touched(bar, partial) {
                        stage = Stage::Partial;
                        //break-even only protects from the next bar under StopFirst
                        if self.priority == IntrabarPriority::TargetFirst {
                            stop = order.entry_price;
                        }
                    }
                }
            }

            if self.priority == IntrabarPriority::TargetFirst && order.stop_touched(bar, stop) {
                return self.stopped(order, entry_time, bar, stop, stage);
            }

            if order.target_touched(bar, order.final_target_price) {
                let (r, reason) = match stage {
                    Stage::Partial => (self.blend(stage, self.final_rr), ExitReason::PartialFinal),
                    Stage::Filled => (self.final_rr, ExitReason::DirectFinal),
                };
                return self.close(order, entry_time, bar, order.final_target_price, r, reason, stage);
            }

            if stage == Stage::Partial {
                stop = order.entry_price;
            }
        }

        //history exhausted with the position open
        match (self.unresolved, bars.last()) {
            (UnresolvedPolicy::MarkToMarket, Some(last)) => {
                let r = self.blend(stage, order.mark_to_market_r(last.close));
                self.close(order, entry_time, last, last.close, r, ExitReason::Unresolved, stage)
            }
            _ => SimOutcome::Unresolved { entry_time },
        }
    }

    fn stopped(
        &self,
        order: &CandidateOrder,
        entry_time: DateTime<Utc>,
        bar: &Bar,
        stop: f64,
        stage: Stage,
    ) -> SimOutcome {
        let (r, reason) = match stage {
            Stage::Partial => (self.blend(stage, 0.0), ExitReason::PartialBreakeven),
            Stage::Filled => (-1.0, ExitReason::Stop),
        };
        self.close(order, entry_time, bar, stop, r, reason, stage)
    }

    //r of the whole position given the r of what is still open
    fn blend(&self, stage: Stage, remainder_r: f64) -> f64 {
        match (stage, self.partial_rr) {
            (Stage::Partial, Some(partial_rr)) => {
                PARTIAL_FRACTION * partial_rr + (1.0 - PARTIAL_FRACTION) * remainder_r
            }
            _ => remainder_r,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn close(
        &self,
        order: &CandidateOrder,
        entry_time: DateTime<Utc>,
        bar: &Bar,
        exit_price: f64,
        realized_r: f64,
        exit_reason: ExitReason,
        stage: Stage,
    ) -> SimOutcome {
        SimOutcome::Closed(ClosedPosition {
            entry_time,
            exit_time: bar.timestamp,
            side: order.side,
            fibo_level: order.fibo_level,
            entry_price: order.entry_price,
            exit_price,
            realized_r,
            exit_reason,
            partial_taken: stage == Stage::Partial,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::order::OrderSide;
    use crate::strategy::NoFilter;
    use chrono::{Duration, TimeZone};

    const ENTRY: f64 = 1.10191;
    const STOP: f64 = 1.10176;
    const TP1: f64 = 1.10236;
    const TP2: f64 = 1.10281;

    fn t(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap() + Duration::minutes(30 * i)
    }

    fn cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()
    }

    fn bar(i: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new_unchecked(t(i), open, high, low, close)
    }

    //quiet bar strictly between stop and partial target
    fn idle(i: i64) -> Bar {
        bar(i, 1.10200, 1.10210, 1.10195, 1.10200)
    }

    fn fill(i: i64) -> Bar {
        bar(i, 1.10210, 1.10215, 1.10185, 1.10200)
    }

    fn buy(partial: Option<f64>) -> CandidateOrder {
        CandidateOrder {
            side: OrderSide::Buy,
            entry_price: ENTRY,
            stop_price: STOP,
            partial_target_price: partial,
            final_target_price: TP2,
            fibo_level: 0.618,
        }
    }

    fn sim() -> TradeSimulator {
        TradeSimulator::new(
            Some(3.0),
            6.0,
            IntrabarPriority::TargetFirst,
            UnresolvedPolicy::MarkToMarket,
        )
    }

    fn closed(outcome: SimOutcome) -> ClosedPosition {
        match outcome {
            SimOutcome::Closed(position) => position,
            other => panic!("expected a closed position, got {:?}", other),
        }
    }

    #[test]
    fn stop_breach_is_minus_one_r() {
        let bars = vec![idle(0), fill(1), idle(2), bar(3, 1.10200, 1.10205, 1.10170, 1.10180)];
        let position = closed(sim().simulate(&bars, 0, &buy(Some(TP1)), cutoff(), &NoFilter));

        assert_eq!(position.realized_r, -1.0);
        assert_eq!(position.exit_reason, ExitReason::Stop);
        assert_eq!(position.entry_time, t(1));
        assert_eq!(position.exit_time, t(3));
        assert_eq!(position.exit_price, STOP);
        assert!(!position.partial_taken);
    }

    #[test]
    fn partial_then_breakeven() {
        let bars = vec![
            fill(0),
            bar(1, 1.10200, 1.10240, 1.10195, 1.10230),
            bar(2, 1.10230, 1.10235, 1.10190, 1.10192),
        ];
        let position = closed(sim().simulate(&bars, 0, &buy(Some(TP1)), cutoff(), &NoFilter));

        assert_eq!(position.realized_r, 0.5 * 3.0);
        assert_eq!(position.exit_reason, ExitReason::PartialBreakeven);
        assert_eq!(position.exit_price, ENTRY);
        assert!(position.partial_taken);
    }

    #[test]
    fn partial_then_final() {
        let bars = vec![
            fill(0),
            bar(1, 1.10200, 1.10240, 1.10195, 1.10230),
            bar(2, 1.10230, 1.10290, 1.10220, 1.10285),
        ];
        let position = closed(sim().simulate(&bars, 0, &buy(Some(TP1)), cutoff(), &NoFilter));

        assert_eq!(position.realized_r, 0.5 * 3.0 + 0.5 * 6.0);
        assert_eq!(position.exit_reason, ExitReason::PartialFinal);
        assert_eq!(position.exit_price, TP2);
    }

    #[test]
    fn gap_through_both_targets_counts_partial_first() {
        //one bar spans partial and final: partial registers, then final closes
        let bars = vec![fill(0), bar(1, 1.10200, 1.10300, 1.10195, 1.10290)];
        let position = closed(sim().simulate(&bars, 0, &buy(Some(TP1)), cutoff(), &NoFilter));
        assert_eq!(position.exit_reason, ExitReason::PartialFinal);
    }

    #[test]
    fn direct_final_without_partial_stage() {
        let single = TradeSimulator::new(
            None,
            6.0,
            IntrabarPriority::TargetFirst,
            UnresolvedPolicy::MarkToMarket,
        );
        let bars = vec![fill(0), bar(1, 1.10200, 1.10300, 1.10195, 1.10290)];
        let position = closed(single.simulate(&bars, 0, &buy(None), cutoff(), &NoFilter));

        assert_eq!(position.realized_r, 6.0);
        assert_eq!(position.exit_reason, ExitReason::DirectFinal);
    }

    #[test]
    fn bar_touching_partial_and_stop_resolves_by_priority() {
        let wide = bar(1, 1.10200, 1.10240, 1.10170, 1.10200);
        let bars = vec![fill(0), wide];

        let optimistic = closed(sim().simulate(&bars, 0, &buy(Some(TP1)), cutoff(), &NoFilter));
        assert_eq!(optimistic.exit_reason, ExitReason::PartialBreakeven);
        assert_eq!(optimistic.realized_r, 1.5);

        let pessimistic = TradeSimulator::new(
            Some(3.0),
            6.0,
            IntrabarPriority::StopFirst,
            UnresolvedPolicy::MarkToMarket,
        );
        let position = closed(pessimistic.simulate(&bars, 0, &buy(Some(TP1)), cutoff(), &NoFilter));
        assert_eq!(position.exit_reason, ExitReason::Stop);
        assert_eq!(position.realized_r, -1.0);
    }

    #[test]
    fn stop_first_protects_at_entry_from_the_next_bar() {
        let pessimistic = TradeSimulator::new(
            Some(3.0),
            6.0,
            IntrabarPriority::StopFirst,
            UnresolvedPolicy::MarkToMarket,
        );
        let bars = vec![
            fill(0),
            bar(1, 1.10200, 1.10240, 1.10190, 1.10230),
            bar(2, 1.10230, 1.10235, 1.10185, 1.10192),
        ];
        let position = closed(pessimistic.simulate(&bars, 0, &buy(Some(TP1)), cutoff(), &NoFilter));
        assert_eq!(position.exit_reason, ExitReason::PartialBreakeven);
        assert_eq!(position.exit_time, t(2));
    }

    #[test]
    fn unfilled_order_is_canceled_at_cutoff() {
        let late = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        let bars = vec![
            idle(0),
            idle(1),
            Bar::new_unchecked(late, 1.1019, 1.1020, 1.1010, 1.1015),
        ];
        assert_eq!(
            sim().simulate(&bars, 0, &buy(Some(TP1)), cutoff(), &NoFilter),
            SimOutcome::Canceled
        );
    }

    #[test]
    fn forced_close_marks_to_market_at_open() {
        let late = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        let open = 1.10221;
        let bars = vec![
            fill(0),
            idle(1),
            Bar::new_unchecked(late, open, 1.10300, 1.10100, 1.10200),
        ];
        let order = buy(Some(TP1));
        let position = closed(sim().simulate(&bars, 0, &order, cutoff(), &NoFilter));

        assert_eq!(position.exit_reason, ExitReason::ForcedClose);
        assert_eq!(position.exit_price, open);
        assert_eq!(position.realized_r, order.mark_to_market_r(open));
        assert!((position.realized_r - 2.0).abs() < 1e-6);
    }

    #[test]
    fn forced_close_after_partial_blends() {
        let late = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        let open = 1.10221;
        let bars = vec![
            fill(0),
            bar(1, 1.10200, 1.10240, 1.10195, 1.10230),
            Bar::new_unchecked(late, open, 1.10230, 1.10210, 1.10220),
        ];
        let order = buy(Some(TP1));
        let position = closed(sim().simulate(&bars, 0, &order, cutoff(), &NoFilter));

        assert_eq!(position.exit_reason, ExitReason::ForcedClose);
        assert!(position.partial_taken);
        assert_eq!(
            position.realized_r,
            0.5 * 3.0 + 0.5 * order.mark_to_market_r(open)
        );
    }

    #[test]
    fn exhausted_history_follows_policy() {
        let bars = vec![fill(0), idle(1)];

        let marked = closed(sim().simulate(&bars, 0, &buy(Some(TP1)), cutoff(), &NoFilter));
        assert_eq!(marked.exit_reason, ExitReason::Unresolved);
        assert_eq!(marked.exit_price, 1.10200);
        assert_eq!(marked.exit_time, t(1));

        let excluding = TradeSimulator::new(
            Some(3.0),
            6.0,
            IntrabarPriority::TargetFirst,
            UnresolvedPolicy::Exclude,
        );
        assert_eq!(
            excluding.simulate(&bars, 0, &buy(Some(TP1)), cutoff(), &NoFilter),
            SimOutcome::Unresolved { entry_time: t(0) }
        );
    }

    #[test]
    fn fill_on_last_bar_is_unresolved() {
        let bars = vec![idle(0), fill(1)];
        let position = closed(sim().simulate(&bars, 0, &buy(Some(TP1)), cutoff(), &NoFilter));
        assert_eq!(position.exit_reason, ExitReason::Unresolved);
        assert_eq!(position.exit_time, t(1));
    }

    #[test]
    fn rejected_fill_is_filtered() {
        struct Never;
        impl FillFilter for Never {
            fn allows(&self, _: OrderSide, _: f64, _: usize) -> bool {
                false
            }
            fn name(&self) -> &str {
                "Never"
            }
        }

        let bars = vec![fill(0), idle(1)];
        assert_eq!(
            sim().simulate(&bars, 0, &buy(Some(TP1)), cutoff(), &Never),
            SimOutcome::Filtered
        );
    }

    #[test]
    fn fill_bar_itself_is_not_checked_for_exits() {
        //fill bar also trades through the stop; exits only start on the next bar
        let bars = vec![bar(0, 1.10200, 1.10210, 1.10170, 1.10190), idle(1)];
        let position = closed(sim().simulate(&bars, 0, &buy(Some(TP1)), cutoff(), &NoFilter));
        assert_eq!(position.exit_reason, ExitReason::Unresolved);
    }

    #[test]
    fn sell_side_mirrors() {
        let order = CandidateOrder {
            side: OrderSide::Sell,
            entry_price: 1.10309,
            stop_price: 1.10324,
            partial_target_price: Some(1.10264),
            final_target_price: 1.10219,
            fibo_level: 0.618,
        };
        let bars = vec![
            bar(0, 1.10300, 1.10315, 1.10295, 1.10305),
            bar(1, 1.10300, 1.10305, 1.10260, 1.10270),
            bar(2, 1.10270, 1.10280, 1.10210, 1.10215),
        ];
        let position = closed(sim().simulate(&bars, 0, &order, cutoff(), &NoFilter));

        assert_eq!(position.exit_reason, ExitReason::PartialFinal);
        assert_eq!(position.realized_r, 4.5);
    }
}
