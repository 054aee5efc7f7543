//! Match resolution

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::reconciliation::candidates::MatchCandidate;
use crate::types::*;

/// Decision for a target and its candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    /// No matching transaction found
    None,
    /// Exactly one candidate; safe to reconcile without asking
    Auto { chosen: Transaction },
    /// Several candidates; the operator has to pick one
    Ambiguous { candidates: Vec<MatchCandidate> },
}

impl Resolution {
    pub fn outcome(&self) -> &'static str {
        match self {
            Resolution::None => "none",
            Resolution::Auto { .. } => "auto",
            Resolution::Ambiguous { .. } => "ambiguous",
        }
    }
}

/// Turn a candidate list into a single decision. Never picks among several.
pub fn resolve(target: &Transaction, mut candidates: Vec<MatchCandidate>) -> Resolution {
    let resolution = match candidates.len() {
        0 => Resolution::None,
        1 => match candidates.pop() {
            Some(only) => Resolution::Auto {
                chosen: only.transaction,
            },
            None => Resolution::None,
        },
        _ => Resolution::Ambiguous { candidates },
    };
    debug!(
        target_id = %target.id,
        outcome = resolution.outcome(),
        "Resolved match"
    );
    resolution
}

/// Candidates presented to the operator after an ambiguous resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSelection {
    pub target: Transaction,
    pub candidates: Vec<MatchCandidate>,
}

impl MatchSelection {
    /// Look up the operator's choice among the presented candidates
    pub fn choose(&self, chosen_id: &str) -> ReconResult<&Transaction> {
        self.candidates
            .iter()
            .map(|c| &c.transaction)
            .find(|t| t.id == chosen_id)
            .ok_or_else(|| {
                ReconError::InvalidChoice(format!(
                    "{} is not a candidate for {}",
                    chosen_id, self.target.id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_tolerance;
    use crate::reconciliation::candidates::find_candidates;
    use bigdecimal::BigDecimal;

    fn tx(id: &str, source: &str) -> Transaction {
        Transaction::new(
            id.to_string(),
            "biz".to_string(),
            CaptureMetadata::from_source(source),
            BigDecimal::from(25),
            "EUR".to_string(),
        )
    }

    #[test]
    fn test_outcome_per_candidate_count() {
        let target = tx("b1", "bank_statement_ocr");
        let receipts: Vec<Transaction> = (1..=3)
            .map(|i| tx(&format!("r{}", i), "purchase_invoice_ocr"))
            .collect();

        for n in 0..=3 {
            let candidates = find_candidates(&target, &receipts[..n], &default_tolerance());
            let resolution = resolve(&target, candidates);
            let expected = match n {
                0 => "none",
                1 => "auto",
                _ => "ambiguous",
            };
            assert_eq!(resolution.outcome(), expected);
        }
    }

    #[test]
    fn test_auto_returns_the_candidate() {
        let target = tx("b1", "bank_statement_ocr");
        let receipt = tx("r1", "purchase_invoice_ocr");
        let candidates = find_candidates(&target, &[receipt.clone()], &default_tolerance());

        assert_eq!(resolve(&target, candidates), Resolution::Auto { chosen: receipt });
    }

    #[test]
    fn test_ambiguous_keeps_every_candidate() {
        let target = tx("b1", "bank_statement_ocr");
        let pool = vec![
            tx("r1", "purchase_invoice_ocr"),
            tx("r2", "purchase_invoice_ocr"),
        ];
        let candidates = find_candidates(&target, &pool, &default_tolerance());

        match resolve(&target, candidates) {
            Resolution::Ambiguous { candidates } => {
                let ids: Vec<&str> = candidates.iter().map(|c| c.id()).collect();
                assert_eq!(ids, vec!["r1", "r2"]);
            }
            other => panic!("expected ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_selection_rejects_unknown_choice() {
        let target = tx("b1", "bank_statement_ocr");
        let pool = vec![tx("r1", "purchase_invoice_ocr")];
        let selection = MatchSelection {
            candidates: find_candidates(&target, &pool, &default_tolerance()),
            target,
        };

        assert_eq!(selection.choose("r1").unwrap().id, "r1");
        assert!(matches!(
            selection.choose("r9"),
            Err(ReconError::InvalidChoice(_))
        ));
    }
}
