//! Trade records, their status and the proposal builder used to open one
use super::error::{ParseStatusError, ValidationError};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Accepted,
    #[n(2)]
    Rejected,
    #[n(3)]
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Proposer,
    Counterparty,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeStamp(DateTime<Utc>);

/// A barter negotiation between a proposer (`party_a`) and a counterparty (`party_b`).
///
/// Only `status` and `version` ever change after creation, and only through
/// [`crate::store::TradeStore::compare_and_update`].
#[derive(minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    #[n(0)]
    pub id: String, // bech32m encoded uuid7
    #[n(1)]
    pub party_a: String,
    #[n(2)]
    pub party_b: String,
    #[n(3)]
    pub items_a: Vec<String>,
    #[n(4)]
    pub items_b: Vec<String>,
    #[n(5)]
    pub balance_a: u64, // minor currency units
    #[n(6)]
    pub balance_b: u64,
    #[n(7)]
    pub status: TradeStatus,
    #[n(8)]
    pub created_at: TimeStamp,
    #[n(9)]
    pub version: u64,
}

// Used for constructing trades before they are persisted
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TradeProposal {
    party_a: Option<String>,
    party_b: Option<String>,
    items_a: Vec<String>,
    items_b: Vec<String>,
    balance_a: u64,
    balance_b: u64,
}

/// Source of the current time for creation stamps and the cancel cooldown.
pub trait Clock: Send + Sync {
    fn now(&self) -> TimeStamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimeStamp {
        TimeStamp::new()
    }
}

impl TradeStatus {
    pub const ALL: [TradeStatus; 4] = [
        TradeStatus::Pending,
        TradeStatus::Accepted,
        TradeStatus::Rejected,
        TradeStatus::Completed,
    ];

    /// Pending and accepted trades count towards the one-per-pair limit.
    pub fn is_active(self) -> bool {
        matches!(self, TradeStatus::Pending | TradeStatus::Accepted)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Accepted => "accepted",
            TradeStatus::Rejected => "rejected",
            TradeStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TradeStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Proposer => f.write_str("Proposer"),
            Role::Counterparty => f.write_str("Counterparty"),
        }
    }
}

impl TimeStamp {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    /// Signed time elapsed from `earlier` until `self`.
    pub fn since(&self, earlier: &TimeStamp) -> TimeDelta {
        self.0 - earlier.0
    }
}

impl Default for TimeStamp {
    fn default() -> Self {
        Self::new()
    }
}

impl From<DateTime<Utc>> for TimeStamp {
    fn from(value: DateTime<Utc>) -> Self {
        TimeStamp(value)
    }
}

impl Trade {
    /// Whether `party` is one of the two negotiating parties.
    pub fn involves(&self, party: &str) -> bool {
        self.party_a == party || self.party_b == party
    }
}

impl TradeProposal {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_proposer(mut self, party: impl Into<String>) -> Self {
        self.party_a = Some(party.into().trim().to_string());
        self
    }
    pub fn set_counterparty(mut self, party: impl Into<String>) -> Self {
        self.party_b = Some(party.into().trim().to_string());
        self
    }
    pub fn offer_item_a(mut self, item: impl Into<String>) -> Self {
        self.items_a.push(item.into());
        self
    }
    pub fn offer_item_b(mut self, item: impl Into<String>) -> Self {
        self.items_b.push(item.into());
        self
    }
    pub fn offer_items_a<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items_a.extend(items.into_iter().map(Into::into));
        self
    }
    pub fn offer_items_b<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items_b.extend(items.into_iter().map(Into::into));
        self
    }
    pub fn set_balance_a(mut self, amount: u64) -> Self {
        self.balance_a = amount;
        self
    }
    pub fn set_balance_b(mut self, amount: u64) -> Self {
        self.balance_b = amount;
        self
    }
    pub fn proposer(&self) -> Option<&str> {
        self.party_a.as_deref()
    }
    pub fn counterparty(&self) -> Option<&str> {
        self.party_b.as_deref()
    }

    /// Checks the creation preconditions and returns the ordered pair on success.
    pub fn validate(&self) -> Result<(&str, &str), ValidationError> {
        let party_a = self
            .proposer()
            .filter(|party| !party.is_empty())
            .ok_or(ValidationError::MissingParty(Role::Proposer))?;
        let party_b = self
            .counterparty()
            .filter(|party| !party.is_empty())
            .ok_or(ValidationError::MissingParty(Role::Counterparty))?;

        if party_a == party_b {
            return Err(ValidationError::SelfTrade);
        }
        if self.items_a.iter().any(|item| item.trim().is_empty()) {
            return Err(ValidationError::EmptyItem(Role::Proposer));
        }
        if self.items_b.iter().any(|item| item.trim().is_empty()) {
            return Err(ValidationError::EmptyItem(Role::Counterparty));
        }
        if self.items_a.is_empty()
            && self.items_b.is_empty()
            && self.balance_a == 0
            && self.balance_b == 0
        {
            return Err(ValidationError::EmptyOffer);
        }

        Ok((party_a, party_b))
    }

    /// Validates and turns the proposal into a fresh `pending` trade.
    pub fn into_trade(self, id: String, created_at: TimeStamp) -> Result<Trade, ValidationError> {
        self.validate()?;

        Ok(Trade {
            id,
            party_a: self.party_a.unwrap_or_default(),
            party_b: self.party_b.unwrap_or_default(),
            items_a: self.items_a,
            items_b: self.items_b,
            balance_a: self.balance_a,
            balance_b: self.balance_b,
            status: TradeStatus::Pending,
            created_at,
            version: 0,
        })
    }
}

impl<C> minicbor::Encode<C> for TimeStamp {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knife_for_cash() -> TradeProposal {
        TradeProposal::new()
            .set_proposer("alice")
            .set_counterparty("bob")
            .offer_item_a("knife")
            .set_balance_b(5)
    }

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: TimeStamp = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn trade_record_survives_storage_encoding() {
        let trade = knife_for_cash()
            .into_trade("trade_1test".into(), TimeStamp::new())
            .unwrap();

        let encoding = minicbor::to_vec(&trade).unwrap();
        let decode: Trade = minicbor::decode(&encoding).unwrap();

        assert_eq!(trade, decode);
    }

    #[test]
    fn new_trade_starts_pending_at_version_zero() {
        let created_at = TimeStamp::new();
        let trade = knife_for_cash()
            .into_trade("trade_1test".into(), created_at)
            .unwrap();

        assert_eq!(trade.status, TradeStatus::Pending);
        assert_eq!(trade.version, 0);
        assert_eq!(trade.created_at, created_at);
        assert_eq!(trade.items_a, vec!["knife".to_string()]);
        assert_eq!(trade.balance_b, 5);
    }

    #[test]
    fn rejects_missing_parties() {
        let missing_a = TradeProposal::new().set_counterparty("bob").set_balance_a(1);
        assert_eq!(
            missing_a.validate(),
            Err(ValidationError::MissingParty(Role::Proposer))
        );

        let blank_b = TradeProposal::new()
            .set_proposer("alice")
            .set_counterparty("   ")
            .set_balance_a(1);
        assert_eq!(
            blank_b.validate(),
            Err(ValidationError::MissingParty(Role::Counterparty))
        );
    }

    #[test]
    fn rejects_self_trade_after_trimming() {
        let proposal = TradeProposal::new()
            .set_proposer("alice")
            .set_counterparty(" alice ")
            .offer_item_a("knife");
        assert_eq!(proposal.validate(), Err(ValidationError::SelfTrade));
    }

    #[test]
    fn rejects_empty_offer() {
        let proposal = TradeProposal::new()
            .set_proposer("alice")
            .set_counterparty("bob");
        assert_eq!(proposal.validate(), Err(ValidationError::EmptyOffer));
    }

    #[test]
    fn rejects_blank_item_identifiers() {
        let proposal = knife_for_cash().offer_item_b("");
        assert_eq!(
            proposal.validate(),
            Err(ValidationError::EmptyItem(Role::Counterparty))
        );
    }

    #[test]
    fn balance_alone_is_a_valid_offer() {
        let proposal = TradeProposal::new()
            .set_proposer("alice")
            .set_counterparty("bob")
            .set_balance_a(10);
        assert_eq!(proposal.validate(), Ok(("alice", "bob")));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Accepted".parse::<TradeStatus>(), Ok(TradeStatus::Accepted));
        assert!("open".parse::<TradeStatus>().is_err());
    }

    #[test]
    fn only_pending_and_accepted_are_active() {
        assert!(TradeStatus::Pending.is_active());
        assert!(TradeStatus::Accepted.is_active());
        assert!(TradeStatus::Rejected.is_terminal());
        assert!(TradeStatus::Completed.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&TradeStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
