use crate::config::StrategyConfig;
use crate::data::Bar;
use crate::engine::gateway::{GatewayError, LimitRequest, OrderGateway};
use crate::instrument::SizingError;
use crate::portfolio::AccountState;
use crate::strategy::{EntryLevelGenerator, RangeDetector, RiskPolicy, Session, SkipReason};
use chrono::{DateTime, Utc};
use std::ops::Range;
use tracing::{info, warn};

//orders a session would place, sized against the current account
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPlan {
    Skipped(SkipReason),
    Ready {
        session: Session,
        risk_percent: f64,
        requests: Vec<LimitRequest>,
    },
}

//builds the day's limit requests once its range window has closed
//the final target is sent as take-profit, the partial stage is managed after the fill
pub fn plan_session(
    config: &StrategyConfig,
    bars: &[Bar],
    day: Range<usize>,
    account: &AccountState,
    risk: &dyn RiskPolicy,
) -> Result<SessionPlan, SizingError> {
    let Some(first) = bars.get(day.start) else {
        return Ok(SessionPlan::Skipped(SkipReason::TooFewBars));
    };
    if !config.trades_on(first.date()) {
        return Ok(SessionPlan::Skipped(SkipReason::WeekdayFiltered));
    }

    let session = match RangeDetector::from_config(config).measure(bars, day) {
        Ok(session) => session,
        Err(reason) => return Ok(SessionPlan::Skipped(reason)),
    };

    let risk_percent = risk.risk_percent(account);
    let volume = config
        .instrument
        .lot_size(account.balance, risk_percent, config.sl_points)?;

    let requests = EntryLevelGenerator::from_config(config)
        .generate(&session)
        .into_iter()
        .map(|order| LimitRequest {
            symbol: config.instrument.symbol.clone(),
            side: order.side,
            volume,
            price: order.entry_price,
            stop_loss: order.stop_price,
            take_profit: order.final_target_price,
            expires_at: session.force_close_time,
            comment: match order.partial_target_price {
                Some(partial) => format!("fibo {} partial {}", order.fibo_level, partial),
                None => format!("fibo {}", order.fibo_level),
            },
        })
        .collect();

    Ok(SessionPlan::Ready {
        session,
        risk_percent,
        requests,
    })
}

//outcome of placing a session's requests
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Submission {
    pub tickets: Vec<u64>,
    //levels the market had already passed when the plan was sent
    pub through_market: Vec<LimitRequest>,
}

//places every request, withdrawing the ones already placed if any is rejected
//levels already through the current quote are skipped, not treated as rejections
pub fn submit_plan(
    requests: Vec<LimitRequest>,
    gateway: &mut dyn OrderGateway,
) -> Result<Submission, GatewayError> {
    let mut tickets = Vec::with_capacity(requests.len());
    let mut through_market = Vec::new();

    for request in requests {
        if let Some(quote) = gateway.quote(&request.symbol) {
            if request.is_through_market(&quote) {
                warn!(
                    side = request.side.as_str(),
                    price = request.price,
                    bid = quote.bid,
                    ask = quote.ask,
                    "level already through the market, skipped"
                );
                through_market.push(request);
                continue;
            }
        }

        match gateway.place_limit(request) {
            Ok(ticket) => tickets.push(ticket),
            Err(err) => {
                for ticket in tickets {
                    gateway.cancel(ticket)?;
                }
                return Err(err);
            }
        }
    }

    info!(
        orders = tickets.len(),
        skipped = through_market.len(),
        "session orders placed"
    );
    Ok(Submission {
        tickets,
        through_market,
    })
}

//cancels pending orders whose cutoff has passed
pub fn cancel_expired(
    gateway: &mut dyn OrderGateway,
    now: DateTime<Utc>,
) -> Result<Vec<u64>, GatewayError> {
    let expired: Vec<u64> = gateway
        .working_orders()
        .into_iter()
        .filter(|(_, request)| request.expires_at <= now)
        .map(|(ticket, _)| ticket)
        .collect();

    for &ticket in &expired {
        gateway.cancel(ticket)?;
    }

    Ok(expired)
}
