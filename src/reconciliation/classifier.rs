//! Transaction classification

use serde::{Deserialize, Serialize};

use crate::types::*;

/// Result of classifying a single transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: TransactionKind,
    /// Statement line that still has to be reconciled
    pub needs_reconciliation: bool,
    /// Receipt that is open for matching
    pub needs_matching: bool,
}

impl Classification {
    /// Whether the transaction takes part in matching on either side
    pub fn is_eligible(&self) -> bool {
        self.needs_reconciliation || self.needs_matching
    }
}

/// Derive the kind of a transaction from its capture metadata.
///
/// Unclear metadata yields [`TransactionKind::Other`].
pub fn kind_of(capture: &CaptureMetadata) -> TransactionKind {
    match capture.capture_source.as_deref() {
        Some("bank_statement_ocr") => return TransactionKind::Bank,
        Some("credit_card_statement_ocr") => return TransactionKind::CreditCard,
        Some("purchase_invoice_ocr") => return TransactionKind::PurchaseReceipt,
        _ => {}
    }

    let ocr = capture.mechanism.as_deref() == Some("ocr");
    let purchase_source = [&capture.capture_source, &capture.source_name]
        .into_iter()
        .flatten()
        .any(|name| name.contains("purchase"));

    if ocr && purchase_source {
        TransactionKind::PurchaseReceipt
    } else {
        TransactionKind::Other
    }
}

/// Classify a transaction. Pure and total.
pub fn classify(transaction: &Transaction) -> Classification {
    let kind = kind_of(&transaction.capture);
    let status = transaction.reconciliation_status;

    let needs_reconciliation = kind.is_statement_line()
        && !transaction.has_accounting_entries
        && !matches!(
            status,
            ReconciliationStatus::Matched
                | ReconciliationStatus::Reconciled
                | ReconciliationStatus::Exception
        );

    let needs_matching =
        kind == TransactionKind::PurchaseReceipt && status == ReconciliationStatus::Unreconciled;

    Classification {
        kind,
        needs_reconciliation,
        needs_matching,
    }
}

/// Whether the transaction may take part in automatic matching.
///
/// Stricter than [`Classification::is_eligible`]: a statement line in any
/// terminal status, `not_required` included, is left alone.
pub fn open_for_matching(transaction: &Transaction) -> bool {
    classify(transaction).is_eligible() && !transaction.reconciliation_status.is_terminal()
}
