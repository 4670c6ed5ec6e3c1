//! Two-party barter negotiation.
//!
//! A proposer opens a [`trade::Trade`] offering items and/or a cash balance to a
//! counterparty, who may accept it; either side may then complete it. The
//! rules live in [`negotiation`], durable records in [`store`], and
//! [`service::TradeService`] ties the two together.

pub mod config;
pub mod error;
pub mod negotiation;
pub mod service;
pub mod store;
pub mod trade;
pub mod utils;

pub use error::{Result, TradeError, ValidationError};
pub use negotiation::{CancelPolicy, NegotiationRules, Transition};
pub use service::{TradeService, TransitionOutcome};
pub use store::{SledTradeStore, TradeStore, UpdateOutcome};
pub use trade::{Clock, SystemClock, TimeStamp, Trade, TradeProposal, TradeStatus};
