//! Traits for the engine's external collaborators

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Read access to the transaction store
///
/// The engine never writes through this trait; all state changes happen
/// behind [`ReconciliationService`] and are observed by re-reading.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// List a page of transactions for the business (pages start at 1)
    ///
    /// Implementations must support `limit` values of at least 200 so the
    /// engine can search the whole pool in one call.
    async fn list(
        &self,
        ctx: &BusinessContext,
        page: usize,
        limit: usize,
    ) -> ReconResult<Vec<Transaction>>;

    /// Get a single transaction
    async fn get(&self, id: &str, ctx: &BusinessContext) -> ReconResult<Transaction>;
}

/// The remote reconcile operation
#[async_trait]
pub trait ReconciliationService: Send + Sync {
    /// Trigger matching for every transaction of the given kind.
    ///
    /// Idempotent and coarse-grained: callers must re-fetch afterwards to learn
    /// which pairs were matched.
    async fn reconcile(&self, ctx: &BusinessContext, kind: PairingKind) -> ReconResult<()>;

    /// Reconcile a specific statement line with a specific receipt.
    ///
    /// Backends without pair-scoped support fall back to the coarse operation.
    async fn reconcile_pair(
        &self,
        ctx: &BusinessContext,
        kind: PairingKind,
        statement_id: &str,
        receipt_id: &str,
    ) -> ReconResult<()> {
        let _ = (statement_id, receipt_id);
        self.reconcile(ctx, kind).await
    }
}

/// Packaging/unit extraction for stock items
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Extract packaging information from an item's text.
    ///
    /// `Err(ReconError::Network)` means no response was received at all;
    /// a well-formed error body is `Ok(ExtractionResult::Failed)`.
    async fn extract(&self, ctx: &BusinessContext, item_text: &str)
        -> ReconResult<ExtractionResult>;
}

/// Response of the extraction service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionResult {
    Extracted(ExtractionPayload),
    Failed(ExtractionError),
}

/// Successful extraction body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPayload {
    /// Human-readable packaging description, e.g. "Box of 12"
    pub packaging_description: String,
    pub units_per_package: Option<u32>,
    pub unit: Option<String>,
    #[serde(default)]
    pub requires_confirmation: bool,
    pub unit_confirmation: Option<UnitConfirmation>,
}

/// Question the operator must answer before the unit can be trusted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitConfirmation {
    pub extracted_unit: String,
    pub normalized_unit: Option<String>,
    pub question: String,
}

/// Structured failure body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionError {
    pub message: String,
    #[serde(default)]
    pub rate_limited: bool,
}
