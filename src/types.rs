//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current version of the normalized transaction schema
pub const TRANSACTION_SCHEMA_VERSION: u16 = 1;

/// Category of a transaction derived from its capture metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Line read from a bank statement
    Bank,
    /// Line read from a credit-card statement
    CreditCard,
    /// Purchase receipt or purchase invoice
    PurchaseReceipt,
    /// Anything whose capture metadata does not clearly say which of the above it is
    Other,
}

impl TransactionKind {
    /// Bank and credit-card lines are the statement side of a match
    pub fn is_statement_line(&self) -> bool {
        matches!(self, TransactionKind::Bank | TransactionKind::CreditCard)
    }

    /// The reconcile operation scope this kind belongs to, if any
    pub fn pairing_kind(&self) -> Option<PairingKind> {
        match self {
            TransactionKind::Bank => Some(PairingKind::Bank),
            TransactionKind::CreditCard => Some(PairingKind::Cards),
            TransactionKind::PurchaseReceipt | TransactionKind::Other => None,
        }
    }
}

/// Scope of the external reconcile operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingKind {
    Bank,
    Cards,
}

impl PairingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairingKind::Bank => "bank",
            PairingKind::Cards => "cards",
        }
    }
}

impl fmt::Display for PairingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciliation lifecycle state of a transaction
///
/// A missing status in the stored record is `Unset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    #[default]
    Unset,
    Unreconciled,
    Matched,
    Reconciled,
    Exception,
    NotRequired,
}

impl ReconciliationStatus {
    /// Parse the stored status string. `None` for unknown values.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "unset" => Some(Self::Unset),
            "unreconciled" => Some(Self::Unreconciled),
            "matched" => Some(Self::Matched),
            "reconciled" => Some(Self::Reconciled),
            "exception" => Some(Self::Exception),
            "not_required" => Some(Self::NotRequired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Unreconciled => "unreconciled",
            Self::Matched => "matched",
            Self::Reconciled => "reconciled",
            Self::Exception => "exception",
            Self::NotRequired => "not_required",
        }
    }

    /// Terminal states are never re-processed by the engine
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Matched | Self::Reconciled | Self::Exception | Self::NotRequired
        )
    }
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the transaction entered the system
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    /// e.g. `bank_statement_ocr`, `credit_card_statement_ocr`, `purchase_invoice_ocr`
    pub capture_source: Option<String>,
    /// Capture mechanism flag, e.g. `ocr`
    pub mechanism: Option<String>,
    /// Free-form source name reported by ingestion
    pub source_name: Option<String>,
}

impl CaptureMetadata {
    pub fn from_source(capture_source: &str) -> Self {
        Self {
            capture_source: Some(capture_source.to_string()),
            ..Self::default()
        }
    }
}

/// A transaction as seen by the reconciliation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Version of the normalized schema this record was produced with
    pub schema_version: u16,
    /// Opaque unique identifier
    pub id: String,
    /// Business the transaction belongs to
    pub business_id: String,
    pub capture: CaptureMetadata,
    /// Signed monetary value
    pub amount: BigDecimal,
    /// Upper-case currency code
    pub currency: String,
    pub third_party_name: Option<String>,
    pub description: String,
    pub transaction_date: Option<NaiveDate>,
    /// True iff at least one debit or credit entry is recorded
    pub has_accounting_entries: bool,
    pub reconciliation_status: ReconciliationStatus,
    /// Counterpart set by the reconcile operation once matched
    pub matched_transaction_id: Option<String>,
}

impl Transaction {
    /// Create a transaction with no entries and an unset status
    pub fn new(
        id: String,
        business_id: String,
        capture: CaptureMetadata,
        amount: BigDecimal,
        currency: String,
    ) -> Self {
        Self {
            schema_version: TRANSACTION_SCHEMA_VERSION,
            id,
            business_id,
            capture,
            amount,
            currency,
            third_party_name: None,
            description: String::new(),
            transaction_date: None,
            has_accounting_entries: false,
            reconciliation_status: ReconciliationStatus::Unset,
            matched_transaction_id: None,
        }
    }

    pub fn with_status(mut self, status: ReconciliationStatus) -> Self {
        self.reconciliation_status = status;
        self
    }

    pub fn with_accounting_entries(mut self, has_entries: bool) -> Self {
        self.has_accounting_entries = has_entries;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_third_party(mut self, name: &str) -> Self {
        self.third_party_name = Some(name.to_string());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.transaction_date = Some(date);
        self
    }
}

/// Explicit business selection passed into every engine call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusinessContext {
    pub business_id: String,
}

impl BusinessContext {
    pub fn new(business_id: impl Into<String>) -> Self {
        Self {
            business_id: business_id.into(),
        }
    }

    /// Pick the business to act for from a user's memberships.
    ///
    /// The first non-personal membership wins; otherwise the first membership.
    pub fn from_memberships(memberships: &[Membership]) -> Option<Self> {
        memberships
            .iter()
            .find(|m| !m.is_personal)
            .or_else(|| memberships.first())
            .map(|m| Self::new(m.business_id.clone()))
    }
}

/// A user's membership in a business
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub business_id: String,
    pub is_personal: bool,
}

/// Errors that can occur in the reconciliation engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Reconciliation of {kind} transactions failed: {message}")]
    ReconciliationFailed { kind: PairingKind, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Extraction unavailable: {0}")]
    ExtractionUnavailable(String),
    #[error("Confirmation abandoned")]
    ConfirmationAbandoned,
    #[error("Operation already in progress for {0}")]
    OperationInFlight(String),
    #[error("Invalid choice: {0}")]
    InvalidChoice(String),
}

impl ReconError {
    /// Whether re-invoking the same action may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconError::Storage(_)
                | ReconError::ReconciliationFailed { .. }
                | ReconError::Network(_)
                | ReconError::ExtractionUnavailable(_)
                | ReconError::OperationInFlight(_)
        )
    }

    /// Message suitable for showing to the operator
    pub fn user_message(&self) -> String {
        match self {
            ReconError::ReconciliationFailed { .. } => {
                "Could not reconcile transactions. Please try again.".to_string()
            }
            ReconError::Network(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            ReconError::ExtractionUnavailable(_) => {
                "Packaging details are temporarily unavailable. You can retry or continue without them."
                    .to_string()
            }
            ReconError::ConfirmationAbandoned => "Stock update cancelled.".to_string(),
            ReconError::OperationInFlight(_) => {
                "This transaction is already being processed.".to_string()
            }
            ReconError::InvalidChoice(_) => {
                "That transaction is no longer a match. Refresh and choose again.".to_string()
            }
            ReconError::TransactionNotFound(_) => "Transaction not found.".to_string(),
            ReconError::Storage(_) | ReconError::Validation(_) => self.to_string(),
        }
    }
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(
            ReconciliationStatus::parse("Unreconciled"),
            Some(ReconciliationStatus::Unreconciled)
        );
        assert_eq!(
            ReconciliationStatus::parse(""),
            Some(ReconciliationStatus::Unset)
        );
        assert_eq!(
            ReconciliationStatus::parse("not_required"),
            Some(ReconciliationStatus::NotRequired)
        );
        assert_eq!(ReconciliationStatus::parse("pending"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ReconciliationStatus::Unset.is_terminal());
        assert!(!ReconciliationStatus::Unreconciled.is_terminal());
        assert!(ReconciliationStatus::Matched.is_terminal());
        assert!(ReconciliationStatus::Reconciled.is_terminal());
        assert!(ReconciliationStatus::Exception.is_terminal());
        assert!(ReconciliationStatus::NotRequired.is_terminal());
    }

    #[test]
    fn test_business_from_memberships_prefers_non_personal() {
        let memberships = vec![
            Membership {
                business_id: "personal".to_string(),
                is_personal: true,
            },
            Membership {
                business_id: "shop".to_string(),
                is_personal: false,
            },
        ];
        let ctx = BusinessContext::from_memberships(&memberships).unwrap();
        assert_eq!(ctx.business_id, "shop");
    }

    #[test]
    fn test_business_from_memberships_falls_back_to_first() {
        let memberships = vec![Membership {
            business_id: "personal".to_string(),
            is_personal: true,
        }];
        let ctx = BusinessContext::from_memberships(&memberships).unwrap();
        assert_eq!(ctx.business_id, "personal");
        assert!(BusinessContext::from_memberships(&[]).is_none());
    }

    #[test]
    fn test_error_retry_affordance() {
        let err = ReconError::ReconciliationFailed {
            kind: PairingKind::Cards,
            message: "timeout".to_string(),
        };
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Reconciliation of cards transactions failed: timeout"
        );
        assert!(!ReconError::ConfirmationAbandoned.is_retryable());
        assert!(!ReconError::Validation("bad".to_string()).is_retryable());
    }
}
