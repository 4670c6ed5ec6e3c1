use crate::negotiation::Transition;
use crate::trade::{Role, TradeStatus};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} identity is missing")]
    MissingParty(Role),
    #[error("A party cannot trade with itself")]
    SelfTrade,
    #[error("Trade offers no items and no balance")]
    EmptyOffer,
    #[error("{0} offered an item with an empty identifier")]
    EmptyItem(Role),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown trade status: {0}")]
pub struct ParseStatusError(pub String);

#[derive(thiserror::Error, Debug)]
pub enum TradeError {
    #[error("Invalid trade input: {0}")]
    InvalidInput(#[from] ValidationError),
    #[error("An active trade already exists between {party_a} and {party_b}: {trade_id}")]
    DuplicateActiveTrade {
        party_a: String,
        party_b: String,
        trade_id: String,
    },
    #[error("Trade not found: {0}")]
    TradeNotFound(String),
    #[error("{actor} is not permitted to {transition} trade {trade_id}")]
    Unauthorized {
        trade_id: String,
        actor: String,
        transition: Transition,
    },
    #[error("Trade {trade_id} cannot {transition} while {status}")]
    InvalidStateTransition {
        trade_id: String,
        status: TradeStatus,
        transition: Transition,
    },
    #[error("Trade {trade_id} cannot be canceled for another {remaining_secs}s")]
    TooEarlyToCancel { trade_id: String, remaining_secs: i64 },
    #[error("A trade with id {0} already exists")]
    DuplicateId(String),
    #[error("Trade {0} kept changing underneath the update")]
    ConcurrentModification(String),
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("Failed to encode trade record: {0}")]
    Encode(String),
    #[error("Failed to decode trade record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("Failed to generate identifier: {0}")]
    Identifier(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TradeError {
    /// True for outcomes of the negotiation rules themselves, as opposed to
    /// storage, encoding or configuration failures.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            TradeError::InvalidInput(_)
                | TradeError::DuplicateActiveTrade { .. }
                | TradeError::TradeNotFound(_)
                | TradeError::Unauthorized { .. }
                | TradeError::InvalidStateTransition { .. }
                | TradeError::TooEarlyToCancel { .. }
        )
    }
}

impl From<sled::transaction::TransactionError<TradeError>> for TradeError {
    fn from(err: sled::transaction::TransactionError<TradeError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(err) => err,
            sled::transaction::TransactionError::Storage(err) => TradeError::Storage(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, TradeError>;
