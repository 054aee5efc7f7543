//! Reconciliation engine orchestrating classification, matching and the
//! remote reconcile operation

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::reconciliation::candidates::*;
use crate::reconciliation::classifier::*;
use crate::reconciliation::resolver::*;
use crate::reconciliation::status::*;
use crate::traits::*;
use crate::types::*;
use crate::utils::InFlight;

/// Transactions currently waiting on reconciliation, by side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationQueue {
    pub bank: Vec<Transaction>,
    pub cards: Vec<Transaction>,
    pub receipts: Vec<Transaction>,
}

impl ReconciliationQueue {
    /// Partition a pool using the classifier. Other kinds are dropped.
    pub fn from_pool(pool: Vec<Transaction>) -> Self {
        let mut queue = Self::default();
        for transaction in pool {
            let classification = classify(&transaction);
            match classification.kind {
                TransactionKind::Bank if classification.needs_reconciliation => {
                    queue.bank.push(transaction)
                }
                TransactionKind::CreditCard if classification.needs_reconciliation => {
                    queue.cards.push(transaction)
                }
                TransactionKind::PurchaseReceipt if classification.needs_matching => {
                    queue.receipts.push(transaction)
                }
                _ => {}
            }
        }
        queue
    }

    pub fn statement_lines(&self, kind: PairingKind) -> &[Transaction] {
        match kind {
            PairingKind::Bank => &self.bank,
            PairingKind::Cards => &self.cards,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bank.is_empty() && self.cards.is_empty() && self.receipts.is_empty()
    }
}

/// State of a pair after the reconcile operation, as re-read from the repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub statement: Transaction,
    pub receipt: Transaction,
    /// The statement line reached a terminal status
    pub confirmed: bool,
}

/// Result of [`ReconciliationEngine::resolve`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolveOutcome {
    /// Nothing to match against; no state change
    NoMatch { target: Transaction },
    /// Single candidate; the reconcile operation was issued
    Reconciled(ReconcileReport),
    /// Operator must choose; nothing was issued
    Ambiguous(MatchSelection),
}

/// Result of [`ReconciliationEngine::reconcile_drop`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DropOutcome {
    Reconciled(ReconcileReport),
    /// The drop target is not a match for the dragged transaction
    NotAMatch,
}

/// Reconciliation engine over a transaction repository and the remote
/// reconcile operation
///
/// The engine holds no transaction state of its own: every operation re-reads
/// the pool, and every reconcile call is followed by a re-read of the pair.
pub struct ReconciliationEngine<R: TransactionRepository, S: ReconciliationService> {
    repository: R,
    service: S,
    config: EngineConfig,
    in_flight: InFlight,
}

impl<R: TransactionRepository, S: ReconciliationService> ReconciliationEngine<R, S> {
    /// Create a new engine
    pub fn new(repository: R, service: S, config: EngineConfig) -> Self {
        Self {
            repository,
            service,
            config,
            in_flight: InFlight::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Fetch the whole pool in one call
    async fn fetch_pool(&self, ctx: &BusinessContext) -> ReconResult<Vec<Transaction>> {
        let pool = self.repository.list(ctx, 1, self.config.pool_limit).await?;
        if pool.len() >= self.config.pool_limit {
            debug!(
                business_id = %ctx.business_id,
                pool_limit = self.config.pool_limit,
                "Transaction pool hit the limit; later transactions are not searched"
            );
        }
        Ok(pool)
    }

    /// Transactions needing reconciliation, partitioned by side
    pub async fn reconciliation_queue(
        &self,
        ctx: &BusinessContext,
    ) -> ReconResult<ReconciliationQueue> {
        Ok(ReconciliationQueue::from_pool(self.fetch_pool(ctx).await?))
    }

    /// Current candidates for a transaction, computed from fresh state
    pub async fn candidates_for(
        &self,
        ctx: &BusinessContext,
        target_id: &str,
    ) -> ReconResult<Vec<MatchCandidate>> {
        let target = self.repository.get(target_id, ctx).await?;
        let pool = self.fetch_pool(ctx).await?;
        Ok(self.candidates_in(&target, &pool))
    }

    fn candidates_in(&self, target: &Transaction, pool: &[Transaction]) -> Vec<MatchCandidate> {
        let counterparts = counterpart_pool(target, pool);
        find_candidates(target, &counterparts, &self.config.amount_tolerance)
    }

    /// Resolve a transaction against the pool.
    ///
    /// A single candidate is reconciled straight away; several are handed
    /// back for the operator to choose from without issuing anything.
    pub async fn resolve(
        &self,
        ctx: &BusinessContext,
        target_id: &str,
    ) -> ReconResult<ResolveOutcome> {
        let _guard = self.in_flight.acquire(target_id)?;

        let target = self.repository.get(target_id, ctx).await?;
        let pool = self.fetch_pool(ctx).await?;
        let candidates = self.candidates_in(&target, &pool);

        match resolve(&target, candidates) {
            Resolution::None => Ok(ResolveOutcome::NoMatch { target }),
            Resolution::Auto { chosen } => {
                let _chosen_guard = self.in_flight.acquire(&chosen.id)?;
                let report = self.reconcile_pair(ctx, &target, &chosen).await?;
                Ok(ResolveOutcome::Reconciled(report))
            }
            Resolution::Ambiguous { candidates } => {
                info!(
                    target_id = %target.id,
                    candidates = candidates.len(),
                    "Multiple candidates; waiting for operator"
                );
                Ok(ResolveOutcome::Ambiguous(MatchSelection { target, candidates }))
            }
        }
    }

    /// Reconcile the operator's choice from an ambiguous selection.
    ///
    /// Both transactions are re-read first; if the pair no longer matches the
    /// choice is rejected and nothing is issued.
    pub async fn confirm_choice(
        &self,
        ctx: &BusinessContext,
        selection: &MatchSelection,
        chosen_id: &str,
    ) -> ReconResult<ReconcileReport> {
        selection.choose(chosen_id)?;
        let _guard = self.in_flight.acquire(&selection.target.id)?;
        let _chosen_guard = self.in_flight.acquire(chosen_id)?;

        let target = self.repository.get(&selection.target.id, ctx).await?;
        let chosen = self.repository.get(chosen_id, ctx).await?;
        if !completes_match(&target, &chosen, &self.config.amount_tolerance) {
            return Err(ReconError::InvalidChoice(format!(
                "{} no longer matches {}",
                chosen_id, target.id
            )));
        }

        self.reconcile_pair(ctx, &target, &chosen).await
    }

    /// Handle a drag of one transaction onto another.
    ///
    /// Both ids are claimed for the duration of the call.
    pub async fn reconcile_drop(
        &self,
        ctx: &BusinessContext,
        dragged_id: &str,
        dropped_on_id: &str,
    ) -> ReconResult<DropOutcome> {
        if dragged_id == dropped_on_id {
            return Ok(DropOutcome::NotAMatch);
        }
        let _dragged_guard = self.in_flight.acquire(dragged_id)?;
        let _dropped_on_guard = self.in_flight.acquire(dropped_on_id)?;

        let dragged = self.repository.get(dragged_id, ctx).await?;
        let dropped_on = self.repository.get(dropped_on_id, ctx).await?;
        if !completes_match(&dragged, &dropped_on, &self.config.amount_tolerance) {
            debug!(dragged_id, dropped_on_id, "Drop does not complete a match");
            return Ok(DropOutcome::NotAMatch);
        }

        let report = self.reconcile_pair(ctx, &dragged, &dropped_on).await?;
        Ok(DropOutcome::Reconciled(report))
    }

    /// Trigger bulk matching for one kind and return the refreshed queue
    pub async fn auto_reconcile(
        &self,
        ctx: &BusinessContext,
        kind: PairingKind,
    ) -> ReconResult<ReconciliationQueue> {
        let _guard = self.in_flight.acquire(&format!("auto:{}", kind))?;

        self.service
            .reconcile(ctx, kind)
            .await
            .map_err(|e| reconciliation_failure(kind, e))?;
        info!(business_id = %ctx.business_id, kind = %kind, "Auto-reconcile triggered");

        self.reconciliation_queue(ctx).await
    }

    /// Issue the reconcile call for a pair and re-read both sides
    async fn reconcile_pair(
        &self,
        ctx: &BusinessContext,
        a: &Transaction,
        b: &Transaction,
    ) -> ReconResult<ReconcileReport> {
        let (statement, receipt) = if kind_of(&a.capture).is_statement_line() {
            (a, b)
        } else {
            (b, a)
        };
        let kind = kind_of(&statement.capture).pairing_kind().ok_or_else(|| {
            ReconError::InvalidChoice(format!("{} is not a statement line", statement.id))
        })?;

        self.service
            .reconcile_pair(ctx, kind, &statement.id, &receipt.id)
            .await
            .map_err(|e| reconciliation_failure(kind, e))?;

        let fresh_statement = self.repository.get(&statement.id, ctx).await?;
        let fresh_receipt = self.repository.get(&receipt.id, ctx).await?;
        StatusMachine::observe(
            &statement.id,
            statement.reconciliation_status,
            fresh_statement.reconciliation_status,
        );
        StatusMachine::observe(
            &receipt.id,
            receipt.reconciliation_status,
            fresh_receipt.reconciliation_status,
        );

        let confirmed = fresh_statement.reconciliation_status.is_terminal();
        info!(
            statement_id = %statement.id,
            receipt_id = %receipt.id,
            kind = %kind,
            confirmed,
            "Reconcile issued"
        );
        Ok(ReconcileReport {
            statement: fresh_statement,
            receipt: fresh_receipt,
            confirmed,
        })
    }
}

fn reconciliation_failure(kind: PairingKind, error: ReconError) -> ReconError {
    warn!(kind = %kind, error = %error, "Reconcile call failed");
    match error {
        ReconError::ReconciliationFailed { .. } => error,
        other => ReconError::ReconciliationFailed {
            kind,
            message: other.to_string(),
        },
    }
}
