//! Validation and normalization of ingested transaction records

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::*;

/// Transaction as delivered by ingestion, with loosely typed metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransactionRecord {
    #[serde(default)]
    pub schema_version: Option<u16>,
    pub id: String,
    pub business_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    #[serde(default)]
    pub third_party_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub transaction_date: Option<NaiveDate>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub debit_entries: usize,
    #[serde(default)]
    pub credit_entries: usize,
    #[serde(default)]
    pub reconciliation_status: Option<String>,
    #[serde(default)]
    pub matched_transaction_id: Option<String>,
}

/// Validate that an id is usable
pub fn validate_id(id: &str) -> ReconResult<()> {
    if id.trim().is_empty() {
        return Err(ReconError::Validation(
            "Transaction ID cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Normalize a currency code to upper case
pub fn normalize_currency(currency: &str) -> ReconResult<String> {
    let code = currency.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ReconError::Validation(format!(
            "Invalid currency code: '{}'",
            currency
        )));
    }
    Ok(code)
}

fn metadata_value(metadata: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| metadata.get(*key))
        .map(|value| value.trim().to_lowercase())
        .find(|value| !value.is_empty())
}

/// Read capture fields out of the metadata blob
pub fn capture_from_metadata(metadata: &HashMap<String, String>) -> CaptureMetadata {
    CaptureMetadata {
        capture_source: metadata_value(metadata, &["captureSource", "capture_source"]),
        mechanism: metadata_value(metadata, &["mechanism"]),
        source_name: metadata_value(metadata, &["sourceName", "source_name", "source"]),
    }
}

/// Turn an ingested record into a [`Transaction`].
///
/// This is the only place loose metadata is interpreted.
pub fn normalize_record(raw: RawTransactionRecord) -> ReconResult<Transaction> {
    let schema_version = raw.schema_version.unwrap_or(TRANSACTION_SCHEMA_VERSION);
    if schema_version != TRANSACTION_SCHEMA_VERSION {
        return Err(ReconError::Validation(format!(
            "Unsupported transaction schema version {} for {}",
            schema_version, raw.id
        )));
    }
    validate_id(&raw.id)?;
    validate_id(&raw.business_id)?;

    let reconciliation_status = match raw.reconciliation_status.as_deref() {
        None => ReconciliationStatus::Unset,
        Some(value) => ReconciliationStatus::parse(value).ok_or_else(|| {
            ReconError::Validation(format!(
                "Unknown reconciliation status '{}' for {}",
                value, raw.id
            ))
        })?,
    };

    Ok(Transaction {
        schema_version,
        capture: capture_from_metadata(&raw.metadata),
        currency: normalize_currency(&raw.currency)?,
        amount: raw.amount,
        third_party_name: raw
            .third_party_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
        description: raw.description.unwrap_or_default().trim().to_string(),
        transaction_date: raw.transaction_date,
        has_accounting_entries: raw.debit_entries + raw.credit_entries > 0,
        reconciliation_status,
        matched_transaction_id: raw.matched_transaction_id,
        id: raw.id,
        business_id: raw.business_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::classifier::classify;

    fn raw(json: &str) -> RawTransactionRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_normalize_bank_line() {
        let record = raw(r#"{
            "id": "tx-1",
            "businessId": "biz",
            "amount": "42.50",
            "currency": " gbp ",
            "thirdPartyName": "  ",
            "description": " Card payment ",
            "transactionDate": "2024-03-01",
            "metadata": {"captureSource": "Bank_Statement_OCR"}
        }"#);

        let t = normalize_record(record).unwrap();
        assert_eq!(t.currency, "GBP");
        assert_eq!(t.description, "Card payment");
        assert_eq!(t.third_party_name, None);
        assert_eq!(t.reconciliation_status, ReconciliationStatus::Unset);
        assert!(!t.has_accounting_entries);
        assert_eq!(classify(&t).kind, TransactionKind::Bank);
        assert!(classify(&t).needs_reconciliation);
    }

    #[test]
    fn test_normalize_ocr_purchase_with_entries() {
        let record = raw(r#"{
            "id": "tx-2",
            "businessId": "biz",
            "amount": "-9.99",
            "currency": "EUR",
            "metadata": {"mechanism": "OCR", "source": "purchase_upload"},
            "debitEntries": 1,
            "reconciliationStatus": "unreconciled"
        }"#);

        let t = normalize_record(record).unwrap();
        assert!(t.has_accounting_entries);
        assert_eq!(t.reconciliation_status, ReconciliationStatus::Unreconciled);
        assert_eq!(classify(&t).kind, TransactionKind::PurchaseReceipt);
    }

    #[test]
    fn test_rejects_bad_records() {
        let base = r#"{"id": "tx", "businessId": "biz", "amount": "1", "currency": "GBP"}"#;

        let mut record = raw(base);
        record.reconciliation_status = Some("pending".to_string());
        assert!(matches!(normalize_record(record), Err(ReconError::Validation(_))));

        let mut record = raw(base);
        record.currency = "POUNDS".to_string();
        assert!(matches!(normalize_record(record), Err(ReconError::Validation(_))));

        let mut record = raw(base);
        record.id = " ".to_string();
        assert!(matches!(normalize_record(record), Err(ReconError::Validation(_))));

        let mut record = raw(base);
        record.schema_version = Some(TRANSACTION_SCHEMA_VERSION + 1);
        assert!(matches!(normalize_record(record), Err(ReconError::Validation(_))));
    }
}
