use crate::engine::order::OrderSide;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum GatewayError {
    #[error("Unknown order ticket {0}")]
    UnknownTicket(u64),
    #[error("Order rejected: {0}")]
    Rejected(String),
}

//pending limit order as a broker would receive it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub volume: f64,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    //cancel if still pending at this time
    pub expires_at: DateTime<Utc>,
    pub comment: String,
}

impl LimitRequest {
    //a buy limit must rest below the ask, a sell limit above the bid
    pub fn is_through_market(&self, quote: &Quote) -> bool {
        match self.side {
            OrderSide::Buy => self.price >= quote.ask,
            OrderSide::Sell => self.price <= quote.bid,
        }
    }
}

//top of book for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

//capability interface for order placement
//the simulation core never talks to it; only the planner does
pub trait OrderGateway {
    fn place_limit(&mut self, request: LimitRequest) -> Result<u64, GatewayError>;

    fn cancel(&mut self, ticket: u64) -> Result<(), GatewayError>;

    //current quote, None when the gateway has no price for the symbol
    fn quote(&self, symbol: &str) -> Option<Quote>;

    //working orders in placement order
    fn working_orders(&self) -> Vec<(u64, LimitRequest)>;
}

//in-memory gateway that keeps orders instead of sending them
#[derive(Debug, Clone)]
pub struct PaperGateway {
    next_ticket: u64,
    orders: IndexMap<u64, LimitRequest>,
    quotes: IndexMap<String, Quote>,
}

impl PaperGateway {
    pub fn new() -> Self {
        PaperGateway {
            next_ticket: 1,
            orders: IndexMap::new(),
            quotes: IndexMap::new(),
        }
    }

    pub fn set_quote(&mut self, symbol: &str, quote: Quote) {
        self.quotes.insert(symbol.to_string(), quote);
    }

    //returns the number of working orders
    pub fn working_order_count(&self) -> usize {
        self.orders.len()
    }
}

impl Default for PaperGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderGateway for PaperGateway {
    fn place_limit(&mut self, request: LimitRequest) -> Result<u64, GatewayError> {
        if !(request.volume > 0.0) {
            return Err(GatewayError::Rejected(format!(
                "volume {} must be positive",
                request.volume
            )));
        }

        let s = request.side.sign();
        if s * (request.price - request.stop_loss) <= 0.0
            || s * (request.take_profit - request.price) <= 0.0
        {
            return Err(GatewayError::Rejected(format!(
                "{} limit at {} has stop {} and target {} on the wrong side",
                request.side.as_str(),
                request.price,
                request.stop_loss,
                request.take_profit
            )));
        }

        if let Some(quote) = self.quote(&request.symbol) {
            if request.is_through_market(&quote) {
                return Err(GatewayError::Rejected(format!(
                    "{} limit at {} is through the market (bid {}, ask {})",
                    request.side.as_str(),
                    request.price,
                    quote.bid,
                    quote.ask
                )));
            }
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.orders.insert(ticket, request);
        Ok(ticket)
    }

    fn cancel(&mut self, ticket: u64) -> Result<(), GatewayError> {
        self.orders
            .shift_remove(&ticket)
            .map(|_| ())
            .ok_or(GatewayError::UnknownTicket(ticket))
    }

    fn quote(&self, symbol: &str) -> Option<Quote> {
        self.quotes.get(symbol).copied()
    }

    fn working_orders(&self) -> Vec<(u64, LimitRequest)> {
        self.orders
            .iter()
            .map(|(ticket, request)| (*ticket, request.clone()))
            .collect()
    }
}
