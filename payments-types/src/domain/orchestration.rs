//! States of a single payment orchestration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Success path:
/// `Started → FraudChecked → TokenValidated → Charged → ReceiptSigned →
/// Persisted → SettlementQueued`. Any state before `Persisted` may exit to
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestrationState {
    Started,
    FraudChecked,
    TokenValidated,
    Charged,
    ReceiptSigned,
    Persisted,
    SettlementQueued,
    Failed,
}

impl OrchestrationState {
    /// The next state on the success path, if any.
    pub fn successor(&self) -> Option<OrchestrationState> {
        use OrchestrationState::*;
        match self {
            Started => Some(FraudChecked),
            FraudChecked => Some(TokenValidated),
            TokenValidated => Some(Charged),
            Charged => Some(ReceiptSigned),
            ReceiptSigned => Some(Persisted),
            Persisted => Some(SettlementQueued),
            SettlementQueued | Failed => None,
        }
    }

    pub fn can_transition_to(&self, next: OrchestrationState) -> bool {
        use OrchestrationState::*;
        if next == Failed {
            // Once persisted, the payment has happened.
            return !matches!(self, Persisted | SettlementQueued | Failed);
        }
        self.successor() == Some(next)
    }

    /// Terminal for the request: the outcome is decided.
    ///
    /// `Persisted` is terminal even though `SettlementQueued` may still follow;
    /// the publish step cannot change the outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestrationState::Persisted
                | OrchestrationState::SettlementQueued
                | OrchestrationState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        use OrchestrationState::*;
        match self {
            Started => "STARTED",
            FraudChecked => "FRAUD_CHECKED",
            TokenValidated => "TOKEN_VALIDATED",
            Charged => "CHARGED",
            ReceiptSigned => "RECEIPT_SIGNED",
            Persisted => "PERSISTED",
            SettlementQueued => "SETTLEMENT_QUEUED",
            Failed => "FAILED",
        }
    }
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::OrchestrationState::*;

    #[test]
    fn test_success_path_is_linear() {
        let path = [
            Started,
            FraudChecked,
            TokenValidated,
            Charged,
            ReceiptSigned,
            Persisted,
            SettlementQueued,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(!Started.can_transition_to(Charged));
        assert!(!Charged.can_transition_to(FraudChecked));
    }

    #[test]
    fn test_failure_only_before_persistence() {
        for state in [Started, FraudChecked, TokenValidated, Charged, ReceiptSigned] {
            assert!(state.can_transition_to(Failed));
            assert!(!state.is_terminal());
        }
        assert!(!Persisted.can_transition_to(Failed));
        assert!(!SettlementQueued.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Failed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(Failed.is_terminal());
        assert!(Persisted.is_terminal());
        assert!(SettlementQueued.is_terminal());
        assert!(Persisted.can_transition_to(SettlementQueued));
        assert_eq!(Failed.successor(), None);
    }
}
