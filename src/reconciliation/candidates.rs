//! Candidate selection by amount and currency

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::reconciliation::classifier::*;
use crate::types::*;

/// A possible pairing of the target with one pool transaction
///
/// Never stored; recomputed from the pool on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub target_id: String,
    pub transaction: Transaction,
    /// `candidate.amount - target.amount`
    pub difference: BigDecimal,
}

impl MatchCandidate {
    pub fn id(&self) -> &str {
        &self.transaction.id
    }
}

/// Whether two transactions satisfy the amount/currency rule
pub fn amounts_match(a: &Transaction, b: &Transaction, tolerance: &BigDecimal) -> bool {
    a.currency == b.currency && (&a.amount - &b.amount).abs() < *tolerance
}

/// Every pool transaction matching `target`, in pool order.
///
/// Works in both directions: receipts for a statement line, or statement lines
/// for a receipt. Eligibility filtering is the caller's job.
pub fn find_candidates(
    target: &Transaction,
    pool: &[Transaction],
    tolerance: &BigDecimal,
) -> Vec<MatchCandidate> {
    pool.iter()
        .filter(|p| amounts_match(target, p, tolerance))
        .map(|p| MatchCandidate {
            target_id: target.id.clone(),
            transaction: p.clone(),
            difference: &p.amount - &target.amount,
        })
        .collect()
}

/// The transactions `target` may be matched against, taken from `pool`.
///
/// A statement line is matched against open receipts; a receipt against open
/// statement lines. A target that is not itself open for matching gets an
/// empty pool.
pub fn counterpart_pool(target: &Transaction, pool: &[Transaction]) -> Vec<Transaction> {
    if !open_for_matching(target) {
        return Vec::new();
    }
    let target_is_statement = kind_of(&target.capture).is_statement_line();

    pool.iter()
        .filter(|p| p.id != target.id && open_for_matching(p))
        .filter(|p| kind_of(&p.capture).is_statement_line() != target_is_statement)
        .cloned()
        .collect()
}

/// Whether dropping `dragged` onto `dropped_on` completes a match
pub fn completes_match(
    dragged: &Transaction,
    dropped_on: &Transaction,
    tolerance: &BigDecimal,
) -> bool {
    let pool = counterpart_pool(dragged, std::slice::from_ref(dropped_on));
    !find_candidates(dragged, &pool, tolerance).is_empty()
}
