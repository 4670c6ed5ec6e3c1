//! Service layer API for trade negotiation operations
use super::config::NegotiationConfig;
use super::error::{Result, TradeError};
use super::negotiation::{NegotiationRules, Transition};
use super::store::{TradeStore, UpdateOutcome};
use super::trade::{Clock, SystemClock, Trade, TradeProposal, TradeStatus};
use super::utils;
use serde::Serialize;
use std::sync::Arc;

/// A persisted transition and its confirmation for the acting party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub trade: Trade,
    pub message: &'static str,
}

pub struct TradeService<S> {
    store: S,
    rules: NegotiationRules,
    clock: Arc<dyn Clock>,
    conflict_retries: u32,
}

impl<S: TradeStore> TradeService<S> {
    pub fn new(store: S, config: &NegotiationConfig) -> Self {
        Self {
            store,
            rules: NegotiationRules::from_config(config),
            clock: Arc::new(SystemClock),
            conflict_retries: config.conflict_retries,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn rules(&self) -> &NegotiationRules {
        &self.rules
    }

    /// Open a new trade on behalf of the proposer, returning its id
    pub fn create_trade(&self, proposal: TradeProposal) -> Result<String> {
        let (party_a, party_b) = proposal.validate()?;

        // fast path; the store's insert enforces this atomically
        if let Some(existing) = self.store.find_active_by_pair(party_a, party_b)? {
            tracing::warn!(
                party_a,
                party_b,
                existing = %existing.id,
                "active trade already exists for pair"
            );
            return Err(TradeError::DuplicateActiveTrade {
                party_a: party_a.to_string(),
                party_b: party_b.to_string(),
                trade_id: existing.id,
            });
        }

        let trade = proposal.into_trade(utils::new_trade_id()?, self.clock.now())?;
        self.store.insert(&trade)?;

        tracing::info!(
            trade_id = %trade.id,
            party_a = %trade.party_a,
            party_b = %trade.party_b,
            "trade offer created"
        );
        Ok(trade.id)
    }

    /// All trades, or only those in `status`
    pub fn list_trades(&self, status: Option<TradeStatus>) -> Result<Vec<Trade>> {
        self.store.list(status)
    }

    pub fn get_trade(&self, trade_id: &str) -> Result<Trade> {
        self.store
            .get_by_id(trade_id)?
            .ok_or_else(|| TradeError::TradeNotFound(trade_id.to_string()))
    }

    /// Counterparty accepts a pending trade
    pub fn accept_trade(&self, trade_id: &str, acting_party: &str) -> Result<TransitionOutcome> {
        self.transition(trade_id, acting_party, Transition::Accept)
    }

    /// Either party rejects a pending trade
    pub fn reject_trade(&self, trade_id: &str, acting_party: &str) -> Result<TransitionOutcome> {
        self.transition(trade_id, acting_party, Transition::Reject)
    }

    /// Counterparty withdraws once the cooldown has passed
    pub fn cancel_trade(&self, trade_id: &str, acting_party: &str) -> Result<TransitionOutcome> {
        self.transition(trade_id, acting_party, Transition::Cancel)
    }

    /// Either party marks an accepted trade as done
    pub fn complete_trade(&self, trade_id: &str, acting_party: &str) -> Result<TransitionOutcome> {
        self.transition(trade_id, acting_party, Transition::Complete)
    }

    /// Fetch, decide and persist. A lost version race re-runs the whole cycle
    /// against the fresh record, so the caller sees the rules' verdict on the
    /// state that actually won.
    pub fn transition(
        &self,
        trade_id: &str,
        acting_party: &str,
        transition: Transition,
    ) -> Result<TransitionOutcome> {
        for attempt in 0..=self.conflict_retries {
            let current = self.get_trade(trade_id)?;

            let next = match self
                .rules
                .check(&current, transition, acting_party, &self.clock.now())
            {
                Ok(next) => next,
                Err(err) => {
                    tracing::warn!(
                        %trade_id,
                        acting_party,
                        %transition,
                        error = %err,
                        "transition refused"
                    );
                    return Err(err);
                }
            };

            match self
                .store
                .compare_and_update(trade_id, current.version, next)?
            {
                UpdateOutcome::Applied(trade) => {
                    tracing::info!(
                        %trade_id,
                        acting_party,
                        %transition,
                        from = %current.status,
                        to = %trade.status,
                        "trade updated"
                    );
                    return Ok(TransitionOutcome {
                        trade,
                        message: transition.confirmation(),
                    });
                }
                UpdateOutcome::Conflict => {
                    tracing::warn!(
                        %trade_id,
                        %transition,
                        attempt,
                        "version conflict, re-evaluating"
                    );
                }
            }
        }

        Err(TradeError::ConcurrentModification(trade_id.to_string()))
    }
}
