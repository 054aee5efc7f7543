//! In-memory transaction store for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

use crate::config::default_tolerance;
use crate::reconciliation::candidates::*;
use crate::reconciliation::classifier::*;
use crate::reconciliation::status::*;
use crate::traits::*;
use crate::types::*;

type ReconcileCall = (PairingKind, Option<(String, String)>);

/// In-memory repository and reconcile service for testing and development
///
/// Transactions are kept per business in insertion order. The reconcile
/// operation matches statement lines with exactly one open receipt, changing
/// statuses only through [`StatusMachine`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTransactionStore {
    transactions: Arc<RwLock<HashMap<String, Vec<Transaction>>>>,
    calls: Arc<Mutex<Vec<ReconcileCall>>>,
    fail_next: Arc<Mutex<Option<String>>>,
}

fn poisoned<T>(_: PoisonError<T>) -> ReconError {
    ReconError::Storage("transaction store lock poisoned".to_string())
}

impl MemoryTransactionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a transaction
    pub fn insert(&self, transaction: Transaction) -> ReconResult<()> {
        let mut transactions = self.transactions.write().map_err(poisoned)?;
        let business = transactions
            .entry(transaction.business_id.clone())
            .or_default();
        match business.iter_mut().find(|t| t.id == transaction.id) {
            Some(existing) => *existing = transaction,
            None => business.push(transaction),
        }
        Ok(())
    }

    /// Make the next reconcile call fail with `message`
    pub fn fail_next_reconcile(&self, message: &str) {
        *self.fail_next.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.to_string());
    }

    /// Number of reconcile calls received, failed ones included
    pub fn reconcile_calls(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Kind and pair (if pair-scoped) of the most recent reconcile call
    pub fn last_reconcile(&self) -> Option<ReconcileCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> ReconResult<()> {
        self.transactions.write().map_err(poisoned)?.clear();
        self.calls.lock().map_err(poisoned)?.clear();
        Ok(())
    }

    fn record_call(&self, call: ReconcileCall) -> ReconResult<()> {
        self.calls.lock().map_err(poisoned)?.push(call);
        match self.fail_next.lock().map_err(poisoned)?.take() {
            Some(message) => Err(ReconError::Network(message)),
            None => Ok(()),
        }
    }
}

/// Mark a statement line and a receipt as matched with each other
fn match_pair(transactions: &mut [Transaction], statement_id: &str, receipt_id: &str) {
    for transaction in transactions.iter_mut() {
        let counterpart = if transaction.id == statement_id {
            receipt_id
        } else if transaction.id == receipt_id {
            statement_id
        } else {
            continue;
        };
        if let Transition::Applied(_) =
            StatusMachine::transition(transaction, ReconciliationStatus::Matched)
        {
            transaction.matched_transaction_id = Some(counterpart.to_string());
        }
    }
}

#[async_trait]
impl TransactionRepository for MemoryTransactionStore {
    async fn list(
        &self,
        ctx: &BusinessContext,
        page: usize,
        limit: usize,
    ) -> ReconResult<Vec<Transaction>> {
        let transactions = self.transactions.read().map_err(poisoned)?;
        let skip = page.saturating_sub(1).saturating_mul(limit);
        Ok(transactions
            .get(&ctx.business_id)
            .map(|business| business.iter().skip(skip).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, id: &str, ctx: &BusinessContext) -> ReconResult<Transaction> {
        self.transactions
            .read()
            .map_err(poisoned)?
            .get(&ctx.business_id)
            .and_then(|business| business.iter().find(|t| t.id == id))
            .cloned()
            .ok_or_else(|| ReconError::TransactionNotFound(id.to_string()))
    }
}

#[async_trait]
impl ReconciliationService for MemoryTransactionStore {
    async fn reconcile(&self, ctx: &BusinessContext, kind: PairingKind) -> ReconResult<()> {
        self.record_call((kind, None))?;

        let mut transactions = self.transactions.write().map_err(poisoned)?;
        let Some(business) = transactions.get_mut(&ctx.business_id) else {
            return Ok(());
        };

        let tolerance = default_tolerance();
        let snapshot = business.clone();
        let mut pairs = Vec::new();
        for line in snapshot
            .iter()
            .filter(|t| kind_of(&t.capture).pairing_kind() == Some(kind))
        {
            let counterparts = counterpart_pool(line, business);
            if let [only] = find_candidates(line, &counterparts, &tolerance).as_slice() {
                pairs.push((line.id.clone(), only.id().to_string()));
                match_pair(business, &line.id, only.id());
            }
        }
        debug!(kind = %kind, matched = pairs.len(), "In-memory bulk reconcile");
        Ok(())
    }

    async fn reconcile_pair(
        &self,
        ctx: &BusinessContext,
        kind: PairingKind,
        statement_id: &str,
        receipt_id: &str,
    ) -> ReconResult<()> {
        self.record_call((kind, Some((statement_id.to_string(), receipt_id.to_string()))))?;

        let mut transactions = self.transactions.write().map_err(poisoned)?;
        let business = transactions
            .get_mut(&ctx.business_id)
            .ok_or_else(|| ReconError::TransactionNotFound(statement_id.to_string()))?;
        match_pair(business, statement_id, receipt_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn tx(id: &str, source: &str, amount: i32) -> Transaction {
        Transaction::new(
            id.to_string(),
            "biz".to_string(),
            CaptureMetadata::from_source(source),
            BigDecimal::from(amount),
            "GBP".to_string(),
        )
    }

    #[tokio::test]
    async fn test_list_pages_in_insertion_order() {
        let store = MemoryTransactionStore::new();
        for i in 0..5 {
            store
                .insert(tx(&format!("t{}", i), "bank_statement_ocr", i))
                .unwrap();
        }
        let ctx = BusinessContext::new("biz");

        let page: Vec<String> = store
            .list(&ctx, 2, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(page, vec!["t2", "t3"]);
        assert!(store
            .list(&BusinessContext::new("other"), 1, 200)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_get_is_scoped_by_business() {
        let store = MemoryTransactionStore::new();
        store.insert(tx("t1", "bank_statement_ocr", 1)).unwrap();

        assert!(store.get("t1", &BusinessContext::new("biz")).await.is_ok());
        assert_eq!(
            store
                .get("t1", &BusinessContext::new("other"))
                .await
                .unwrap_err(),
            ReconError::TransactionNotFound("t1".to_string())
        );
    }

    #[tokio::test]
    async fn test_bulk_reconcile_skips_ambiguous_and_other_kind() {
        let store = MemoryTransactionStore::new();
        let open = |id: &str, amount| {
            tx(id, "purchase_invoice_ocr", amount).with_status(ReconciliationStatus::Unreconciled)
        };
        store.insert(tx("b1", "bank_statement_ocr", 10)).unwrap();
        store.insert(tx("b2", "bank_statement_ocr", 20)).unwrap();
        store.insert(tx("c1", "credit_card_statement_ocr", 30)).unwrap();
        store.insert(open("r1", 10)).unwrap();
        store.insert(open("r2", 20)).unwrap();
        store.insert(open("r3", 20)).unwrap();
        store.insert(open("r4", 30)).unwrap();
        let ctx = BusinessContext::new("biz");

        store.reconcile(&ctx, PairingKind::Bank).await.unwrap();

        let status = |id: &'static str| {
            let store = store.clone();
            let ctx = ctx.clone();
            async move { store.get(id, &ctx).await.unwrap().reconciliation_status }
        };
        assert_eq!(status("b1").await, ReconciliationStatus::Matched);
        assert_eq!(status("r1").await, ReconciliationStatus::Matched);
        assert_eq!(status("b2").await, ReconciliationStatus::Unset);
        assert_eq!(status("c1").await, ReconciliationStatus::Unset);
        assert_eq!(status("r4").await, ReconciliationStatus::Unreconciled);

        let b1 = store.get("b1", &ctx).await.unwrap();
        assert_eq!(b1.matched_transaction_id.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_reconcile_never_overwrites_terminal_status() {
        let store = MemoryTransactionStore::new();
        store
            .insert(tx("b1", "bank_statement_ocr", 10).with_status(ReconciliationStatus::Exception))
            .unwrap();
        store
            .insert(
                tx("r1", "purchase_invoice_ocr", 10)
                    .with_status(ReconciliationStatus::Unreconciled),
            )
            .unwrap();
        let ctx = BusinessContext::new("biz");

        store
            .reconcile_pair(&ctx, PairingKind::Bank, "b1", "r1")
            .await
            .unwrap();

        let b1 = store.get("b1", &ctx).await.unwrap();
        assert_eq!(b1.reconciliation_status, ReconciliationStatus::Exception);
        assert!(b1.matched_transaction_id.is_none());
    }

    #[tokio::test]
    async fn test_injected_failure_applies_once() {
        let store = MemoryTransactionStore::new();
        let ctx = BusinessContext::new("biz");
        store.fail_next_reconcile("boom");

        assert!(store.reconcile(&ctx, PairingKind::Cards).await.is_err());
        assert!(store.reconcile(&ctx, PairingKind::Cards).await.is_ok());
        assert_eq!(store.reconcile_calls(), 2);
        assert_eq!(store.last_reconcile(), Some((PairingKind::Cards, None)));
    }
}
