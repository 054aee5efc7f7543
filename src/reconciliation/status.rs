//! Reconciliation status lifecycle
//!
//! ```text
//! unset -> unreconciled -> matched -> reconciled
//!                       -> exception
//!                       -> not_required
//! ```
//!
//! Statuses only move forward. Moving a transaction out of a terminal status
//! is refused and logged as a conflict.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::*;

/// Result of a requested status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// The status moved to the new value
    Applied(ReconciliationStatus),
    /// Requested status equals the current one
    Unchanged,
    /// The move is not a forward transition; the current status stands
    Conflict {
        from: ReconciliationStatus,
        to: ReconciliationStatus,
    },
}

/// Forward-only state model for [`ReconciliationStatus`]
pub struct StatusMachine;

impl StatusMachine {
    /// Whether `from -> to` is a valid forward step.
    ///
    /// `unset` may skip straight to the outcomes of `unreconciled`, since
    /// bank and card lines are reconciled without ever being stamped.
    pub fn can_transition(from: ReconciliationStatus, to: ReconciliationStatus) -> bool {
        use crate::types::ReconciliationStatus::*;
        matches!(
            (from, to),
            (Unset, Unreconciled)
                | (Unset | Unreconciled, Matched | Exception | NotRequired)
                | (Matched, Reconciled)
        )
    }

    /// Apply a status change to `transaction` if it is a forward step
    pub fn transition(transaction: &mut Transaction, to: ReconciliationStatus) -> Transition {
        let outcome = Self::check(&transaction.id, transaction.reconciliation_status, to);
        if let Transition::Applied(status) = outcome {
            transaction.reconciliation_status = status;
        }
        outcome
    }

    /// Classify an observed status change between two reads of the same
    /// transaction without modifying anything.
    pub fn observe(
        id: &str,
        before: ReconciliationStatus,
        after: ReconciliationStatus,
    ) -> Transition {
        Self::check(id, before, after)
    }

    fn check(id: &str, from: ReconciliationStatus, to: ReconciliationStatus) -> Transition {
        if from == to {
            return Transition::Unchanged;
        }
        if Self::can_transition(from, to) {
            return Transition::Applied(to);
        }
        warn!(
            transaction_id = id,
            from = %from,
            to = %to,
            terminal = from.is_terminal(),
            "Reconciliation status conflict"
        );
        Transition::Conflict { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use crate::types::ReconciliationStatus::*;

    const ALL: [ReconciliationStatus; 6] =
        [Unset, Unreconciled, Matched, Reconciled, Exception, NotRequired];

    fn tx(status: ReconciliationStatus) -> Transaction {
        Transaction::new(
            "t1".to_string(),
            "biz".to_string(),
            CaptureMetadata::from_source("bank_statement_ocr"),
            BigDecimal::from(1),
            "GBP".to_string(),
        )
        .with_status(status)
    }

    #[test]
    fn test_forward_path() {
        let mut t = tx(Unset);
        assert_eq!(
            StatusMachine::transition(&mut t, Unreconciled),
            Transition::Applied(Unreconciled)
        );
        assert_eq!(
            StatusMachine::transition(&mut t, Matched),
            Transition::Applied(Matched)
        );
        assert_eq!(
            StatusMachine::transition(&mut t, Reconciled),
            Transition::Applied(Reconciled)
        );
        assert_eq!(t.reconciliation_status, Reconciled);
    }

    #[test]
    fn test_terminal_states_never_leave() {
        for from in ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                if from == Matched && to == Reconciled {
                    continue;
                }
                let mut t = tx(from);
                let outcome = StatusMachine::transition(&mut t, to);
                assert!(
                    !matches!(outcome, Transition::Applied(_)),
                    "{} -> {} should not apply",
                    from,
                    to
                );
                assert_eq!(t.reconciliation_status, from);
            }
        }
    }

    #[test]
    fn test_reset_is_conflict() {
        let mut t = tx(Matched);
        assert_eq!(
            StatusMachine::transition(&mut t, Unreconciled),
            Transition::Conflict {
                from: Matched,
                to: Unreconciled
            }
        );
        assert_eq!(StatusMachine::transition(&mut t, Matched), Transition::Unchanged);
    }

    #[test]
    fn test_observe_does_not_need_a_transaction() {
        assert_eq!(
            StatusMachine::observe("t1", Unreconciled, Matched),
            Transition::Applied(Matched)
        );
        assert!(matches!(
            StatusMachine::observe("t1", Reconciled, Unset),
            Transition::Conflict { .. }
        ));
    }
}
