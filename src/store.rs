//! Durable trade records on sled
//!
//! Two trees are kept:
//! - `trades`: trade id -> CBOR encoded [`Trade`]
//! - `active_pairs`: sha256 of the ordered (party_a, party_b) pair -> id of
//!   the pair's pending or accepted trade
//!
//! Every write touching both trees runs in one sled transaction, which is
//! what keeps the one-active-trade-per-pair rule intact under concurrent
//! creation.
use crate::error::{Result, TradeError};
use crate::trade::{Trade, TradeStatus};
use sled::Transactional;
use sled::transaction::{ConflictableTransactionResult, abort};
use std::path::Path;
use std::sync::Arc;

const TRADES_TREE: &str = "trades";
const ACTIVE_PAIRS_TREE: &str = "active_pairs";

/// Result of a versioned update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The stored trade, after the update.
    Applied(Trade),
    /// The stored version no longer matched; nothing was written.
    Conflict,
}

/// Storage collaborator of [`crate::service::TradeService`].
pub trait TradeStore: Send + Sync {
    /// Inserts a new trade. Fails with `DuplicateId` if the id is taken and
    /// with `DuplicateActiveTrade` if the ordered pair already has an active
    /// trade; the checks and the write are atomic.
    fn insert(&self, trade: &Trade) -> Result<()>;

    fn get_by_id(&self, trade_id: &str) -> Result<Option<Trade>>;

    fn find_active_by_pair(&self, party_a: &str, party_b: &str) -> Result<Option<Trade>>;

    /// Sets `status` and bumps the version, only if the stored version is
    /// still `expected_version`.
    fn compare_and_update(
        &self,
        trade_id: &str,
        expected_version: u64,
        status: TradeStatus,
    ) -> Result<UpdateOutcome>;

    /// All trades, optionally filtered by status, in creation order.
    fn list(&self, status: Option<TradeStatus>) -> Result<Vec<Trade>>;
}

pub struct SledTradeStore {
    instance: Arc<sled::Db>,
    trades: sled::Tree,
    active_pairs: sled::Tree,
}

impl SledTradeStore {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self> {
        let trades = instance.open_tree(TRADES_TREE)?;
        let active_pairs = instance.open_tree(ACTIVE_PAIRS_TREE)?;

        Ok(Self {
            instance,
            trades,
            active_pairs,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Self::new(Arc::new(db))
    }

    pub fn flush(&self) -> Result<()> {
        self.instance.flush()?;
        Ok(())
    }
}

fn encode(trade: &Trade) -> Result<Vec<u8>> {
    minicbor::to_vec(trade).map_err(|e| TradeError::Encode(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Trade> {
    Ok(minicbor::decode(bytes)?)
}

// hashing the cbor encoding keeps party names with separators from colliding
fn pair_key(party_a: &str, party_b: &str) -> Result<String> {
    let encoded =
        minicbor::to_vec((party_a, party_b)).map_err(|e| TradeError::Encode(e.to_string()))?;
    Ok(sha256::digest(&encoded))
}

impl TradeStore for SledTradeStore {
    fn insert(&self, trade: &Trade) -> Result<()> {
        let key = pair_key(&trade.party_a, &trade.party_b)?;
        let encoded = encode(trade)?;

        (&self.trades, &self.active_pairs).transaction(
            |(trades, active_pairs)| -> ConflictableTransactionResult<(), TradeError> {
                // stored records are never replaced, terminal ones are the audit trail
                if trades.get(trade.id.as_bytes())?.is_some() {
                    return abort(TradeError::DuplicateId(trade.id.clone()));
                }
                if trade.status.is_active() {
                    if let Some(existing) = active_pairs.get(key.as_bytes())? {
                        return abort(TradeError::DuplicateActiveTrade {
                            party_a: trade.party_a.clone(),
                            party_b: trade.party_b.clone(),
                            trade_id: String::from_utf8_lossy(&existing).into_owned(),
                        });
                    }
                    active_pairs.insert(key.as_bytes(), trade.id.as_bytes())?;
                }
                trades.insert(trade.id.as_bytes(), encoded.as_slice())?;
                Ok(())
            },
        )?;

        tracing::debug!(trade_id = %trade.id, "trade record inserted");
        Ok(())
    }

    fn get_by_id(&self, trade_id: &str) -> Result<Option<Trade>> {
        self.trades
            .get(trade_id.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn find_active_by_pair(&self, party_a: &str, party_b: &str) -> Result<Option<Trade>> {
        let key = pair_key(party_a, party_b)?;
        let Some(trade_id) = self.active_pairs.get(key.as_bytes())? else {
            return Ok(None);
        };

        let trade_id = String::from_utf8_lossy(&trade_id);
        match self.get_by_id(&trade_id)? {
            Some(trade) if trade.status.is_active() => Ok(Some(trade)),
            _ => {
                tracing::warn!(%trade_id, "active pair index points at an inactive trade");
                Ok(None)
            }
        }
    }

    fn compare_and_update(
        &self,
        trade_id: &str,
        expected_version: u64,
        status: TradeStatus,
    ) -> Result<UpdateOutcome> {
        let outcome = (&self.trades, &self.active_pairs).transaction(
            |(trades, active_pairs)| -> ConflictableTransactionResult<UpdateOutcome, TradeError> {
                let Some(stored) = trades.get(trade_id.as_bytes())? else {
                    return abort(TradeError::TradeNotFound(trade_id.to_string()));
                };
                let current = match decode(&stored) {
                    Ok(trade) => trade,
                    Err(err) => return abort(err),
                };
                if current.version != expected_version {
                    return Ok(UpdateOutcome::Conflict);
                }

                let updated = Trade {
                    status,
                    version: current.version + 1,
                    ..current
                };
                let encoded = match encode(&updated) {
                    Ok(encoded) => encoded,
                    Err(err) => return abort(err),
                };
                trades.insert(trade_id.as_bytes(), encoded)?;

                if status.is_terminal() {
                    let key = match pair_key(&updated.party_a, &updated.party_b) {
                        Ok(key) => key,
                        Err(err) => return abort(err),
                    };
                    if active_pairs.get(key.as_bytes())?.as_deref() == Some(trade_id.as_bytes()) {
                        active_pairs.remove(key.as_bytes())?;
                    }
                }

                Ok(UpdateOutcome::Applied(updated))
            },
        )?;

        if outcome == UpdateOutcome::Conflict {
            tracing::debug!(%trade_id, expected_version, "stale version, update skipped");
        }
        Ok(outcome)
    }

    fn list(&self, status: Option<TradeStatus>) -> Result<Vec<Trade>> {
        let mut trades = Vec::new();
        for entry in self.trades.iter() {
            let (_, value) = entry?;
            let trade = decode(&value)?;
            if status.is_none_or(|status| trade.status == status) {
                trades.push(trade);
            }
        }

        trades.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(trades)
    }
}
