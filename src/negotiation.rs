//! Negotiation rules: which party may move a trade to which status, and when.
//!
//! ```text
//! pending ──accept (B)──▶ accepted ──complete (A|B)──▶ completed
//!    │                       │
//!    ├──reject (A|B)─────────┼──▶ rejected
//!    └──cancel (B, cooldown)─┘
//! ```
//!
//! Cancel from accepted is only allowed under `CancelPolicy::PendingOrAccepted`.
//!
//! Everything here is pure. Reading and persisting trades is the job of
//! [`crate::service::TradeService`].
use crate::config::NegotiationConfig;
use crate::error::{Result, TradeError};
use crate::trade::{TimeStamp, Trade, TradeStatus};
use chrono::TimeDelta;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Accept,
    Reject,
    Cancel,
    Complete,
}

/// Which statuses the counterparty may cancel from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CancelPolicy {
    #[default]
    PendingOnly,
    PendingOrAccepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Actor {
    Counterparty,
    EitherParty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationRules {
    cancel_cooldown: TimeDelta,
    cancel_policy: CancelPolicy,
}

impl Transition {
    pub const ALL: [Transition; 4] = [
        Transition::Accept,
        Transition::Reject,
        Transition::Cancel,
        Transition::Complete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Accept => "accept",
            Transition::Reject => "reject",
            Transition::Cancel => "cancel",
            Transition::Complete => "complete",
        }
    }

    pub fn target(self) -> TradeStatus {
        match self {
            Transition::Accept => TradeStatus::Accepted,
            Transition::Reject | Transition::Cancel => TradeStatus::Rejected,
            Transition::Complete => TradeStatus::Completed,
        }
    }

    pub fn confirmation(self) -> &'static str {
        match self {
            Transition::Accept => "Trade accepted! Proceed with the item exchange.",
            Transition::Reject => "Trade rejected.",
            Transition::Cancel => "Trade canceled by buyer without penalty.",
            Transition::Complete => "Trade marked as completed!",
        }
    }

    fn actor(self) -> Actor {
        match self {
            Transition::Accept | Transition::Cancel => Actor::Counterparty,
            Transition::Reject | Transition::Complete => Actor::EitherParty,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for NegotiationRules {
    fn default() -> Self {
        Self::from_config(&NegotiationConfig::default())
    }
}

impl NegotiationRules {
    pub fn new(cancel_cooldown: TimeDelta, cancel_policy: CancelPolicy) -> Self {
        Self {
            cancel_cooldown,
            cancel_policy,
        }
    }

    pub fn from_config(config: &NegotiationConfig) -> Self {
        Self::new(
            TimeDelta::minutes(i64::from(config.cancel_cooldown_minutes)),
            config.cancel_policy,
        )
    }

    pub fn cancel_cooldown(&self) -> TimeDelta {
        self.cancel_cooldown
    }

    pub fn cancel_policy(&self) -> CancelPolicy {
        self.cancel_policy
    }

    /// Whether `transition` may leave `status` at all, ignoring actor and time.
    pub fn allows_from(&self, transition: Transition, status: TradeStatus) -> bool {
        match (transition, status) {
            (
                Transition::Accept | Transition::Reject | Transition::Cancel,
                TradeStatus::Pending,
            ) => true,
            (Transition::Cancel, TradeStatus::Accepted) => {
                self.cancel_policy == CancelPolicy::PendingOrAccepted
            }
            (Transition::Complete, TradeStatus::Accepted) => true,
            _ => false,
        }
    }

    /// Decides the status `trade` moves to when `actor` requests `transition` at `now`.
    ///
    /// Checks run in a fixed order: actor, then current status, then the cancel
    /// cooldown. The first violated check determines the error.
    pub fn check(
        &self,
        trade: &Trade,
        transition: Transition,
        actor: &str,
        now: &TimeStamp,
    ) -> Result<TradeStatus> {
        let permitted = match transition.actor() {
            Actor::Counterparty => trade.party_b == actor,
            Actor::EitherParty => trade.involves(actor),
        };
        if !permitted {
            return Err(TradeError::Unauthorized {
                trade_id: trade.id.clone(),
                actor: actor.to_string(),
                transition,
            });
        }

        if !self.allows_from(transition, trade.status) {
            return Err(TradeError::InvalidStateTransition {
                trade_id: trade.id.clone(),
                status: trade.status,
                transition,
            });
        }

        if transition == Transition::Cancel {
            let elapsed = now.since(&trade.created_at);
            if elapsed < self.cancel_cooldown {
                let remaining = self.cancel_cooldown - elapsed;
                return Err(TradeError::TooEarlyToCancel {
                    trade_id: trade.id.clone(),
                    // rounded up to whole seconds
                    remaining_secs: (remaining + TimeDelta::seconds(1) - TimeDelta::nanoseconds(1))
                        .num_seconds(),
                });
            }
        }

        tracing::debug!(
            trade_id = %trade.id,
            %transition,
            from = %trade.status,
            to = %transition.target(),
            "transition permitted"
        );
        Ok(transition.target())
    }

    /// Returns the next state of `trade`. Nothing is persisted.
    pub fn apply(
        &self,
        trade: &Trade,
        transition: Transition,
        actor: &str,
        now: &TimeStamp,
    ) -> Result<Trade> {
        let status = self.check(trade, transition, actor, now)?;
        Ok(Trade {
            status,
            ..trade.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::TradeProposal;
    use chrono::{TimeZone, Utc};

    fn created_at() -> TimeStamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap().into()
    }

    fn minutes_later(minutes: i64) -> TimeStamp {
        (created_at().to_datetime_utc() + TimeDelta::minutes(minutes)).into()
    }

    fn trade_in(status: TradeStatus) -> Trade {
        let mut trade = TradeProposal::new()
            .set_proposer("alice")
            .set_counterparty("bob")
            .offer_item_a("knife")
            .set_balance_b(5)
            .into_trade("trade_1unit".into(), created_at())
            .unwrap();
        trade.status = status;
        trade
    }

    #[test]
    fn counterparty_accepts_pending() {
        let rules = NegotiationRules::default();
        let next = rules
            .apply(
                &trade_in(TradeStatus::Pending),
                Transition::Accept,
                "bob",
                &minutes_later(1),
            )
            .unwrap();
        assert_eq!(next.status, TradeStatus::Accepted);
        assert_eq!(next.version, 0);
    }

    #[test]
    fn proposer_cannot_accept() {
        let rules = NegotiationRules::default();
        let err = rules
            .check(
                &trade_in(TradeStatus::Pending),
                Transition::Accept,
                "alice",
                &minutes_later(1),
            )
            .unwrap_err();
        assert!(matches!(err, TradeError::Unauthorized { .. }));
    }

    #[test]
    fn authorization_is_checked_before_status() {
        let rules = NegotiationRules::default();
        let err = rules
            .check(
                &trade_in(TradeStatus::Completed),
                Transition::Accept,
                "alice",
                &minutes_later(1),
            )
            .unwrap_err();
        assert!(matches!(err, TradeError::Unauthorized { .. }));
    }

    #[test]
    fn either_party_may_reject_pending() {
        let rules = NegotiationRules::default();
        for actor in ["alice", "bob"] {
            let status = rules
                .check(
                    &trade_in(TradeStatus::Pending),
                    Transition::Reject,
                    actor,
                    &minutes_later(1),
                )
                .unwrap();
            assert_eq!(status, TradeStatus::Rejected);
        }
    }

    #[test]
    fn reject_after_acceptance_is_invalid() {
        let rules = NegotiationRules::default();
        let err = rules
            .check(
                &trade_in(TradeStatus::Accepted),
                Transition::Reject,
                "alice",
                &minutes_later(1),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            TradeError::InvalidStateTransition {
                status: TradeStatus::Accepted,
                transition: Transition::Reject,
                ..
            }
        ));
    }

    #[test]
    fn complete_requires_acceptance() {
        let rules = NegotiationRules::default();
        let err = rules
            .check(
                &trade_in(TradeStatus::Pending),
                Transition::Complete,
                "alice",
                &minutes_later(1),
            )
            .unwrap_err();
        assert!(matches!(err, TradeError::InvalidStateTransition { .. }));

        let status = rules
            .check(
                &trade_in(TradeStatus::Accepted),
                Transition::Complete,
                "alice",
                &minutes_later(1),
            )
            .unwrap();
        assert_eq!(status, TradeStatus::Completed);
    }

    #[test]
    fn cancel_cooldown_boundary_is_inclusive() {
        let rules = NegotiationRules::default();
        let trade = trade_in(TradeStatus::Pending);

        let just_short: TimeStamp =
            (minutes_later(30).to_datetime_utc() - TimeDelta::milliseconds(1)).into();
        let err = rules
            .check(&trade, Transition::Cancel, "bob", &just_short)
            .unwrap_err();
        assert!(matches!(
            err,
            TradeError::TooEarlyToCancel {
                remaining_secs: 1,
                ..
            }
        ));

        let status = rules
            .check(&trade, Transition::Cancel, "bob", &minutes_later(30))
            .unwrap();
        assert_eq!(status, TradeStatus::Rejected);
    }

    #[test]
    fn cancel_reports_remaining_time() {
        let rules = NegotiationRules::default();
        let err = rules
            .check(
                &trade_in(TradeStatus::Pending),
                Transition::Cancel,
                "bob",
                &minutes_later(29),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            TradeError::TooEarlyToCancel {
                remaining_secs: 60,
                ..
            }
        ));
    }

    #[test]
    fn creation_in_the_future_blocks_cancel() {
        let rules = NegotiationRules::default();
        let err = rules
            .check(
                &trade_in(TradeStatus::Pending),
                Transition::Cancel,
                "bob",
                &minutes_later(-5),
            )
            .unwrap_err();
        assert!(matches!(err, TradeError::TooEarlyToCancel { .. }));
    }

    #[test]
    fn only_counterparty_may_cancel() {
        let rules = NegotiationRules::default();
        let err = rules
            .check(
                &trade_in(TradeStatus::Pending),
                Transition::Cancel,
                "alice",
                &minutes_later(45),
            )
            .unwrap_err();
        assert!(matches!(err, TradeError::Unauthorized { .. }));
    }

    #[test]
    fn cancel_from_accepted_follows_policy() {
        let accepted = trade_in(TradeStatus::Accepted);

        let strict = NegotiationRules::default();
        let err = strict
            .check(&accepted, Transition::Cancel, "bob", &minutes_later(45))
            .unwrap_err();
        assert!(matches!(err, TradeError::InvalidStateTransition { .. }));

        let lenient =
            NegotiationRules::new(TimeDelta::minutes(30), CancelPolicy::PendingOrAccepted);
        let status = lenient
            .check(&accepted, Transition::Cancel, "bob", &minutes_later(45))
            .unwrap();
        assert_eq!(status, TradeStatus::Rejected);
    }

    #[test]
    fn terminal_states_admit_no_transition() {
        let rules = NegotiationRules::new(TimeDelta::zero(), CancelPolicy::PendingOrAccepted);
        for status in [TradeStatus::Rejected, TradeStatus::Completed] {
            for transition in Transition::ALL {
                for actor in ["alice", "bob"] {
                    let result =
                        rules.check(&trade_in(status), transition, actor, &minutes_later(60));
                    assert!(result.is_err(), "{transition} by {actor} left {status}");
                }
            }
        }
    }

    #[test]
    fn outsider_has_no_transition() {
        let rules = NegotiationRules::default();
        for status in TradeStatus::ALL {
            for transition in Transition::ALL {
                let err = rules
                    .check(&trade_in(status), transition, "carol", &minutes_later(60))
                    .unwrap_err();
                assert!(matches!(err, TradeError::Unauthorized { .. }));
            }
        }
    }
}
