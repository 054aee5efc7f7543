//! Reconciliation walkthrough using the in-memory backends

use bigdecimal::BigDecimal;
use recon_core::utils::{MemoryTransactionStore, ScriptedExtractionService};
use recon_core::{
    BusinessContext, CaptureMetadata, ConfirmationScope, EngineConfig, ExtractionOutcome,
    ExtractionPayload, ExtractionResult, ExtractionWorkflow, Membership, ReconciliationEngine,
    ReconciliationStatus, ResolveOutcome, StockDecision, StockItem, Transaction,
    UnitConfirmation,
};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

fn transaction(
    id: &str,
    source: &str,
    amount: &str,
    business: &str,
) -> Result<Transaction, Box<dyn std::error::Error>> {
    Ok(Transaction::new(
        id.to_string(),
        business.to_string(),
        CaptureMetadata::from_source(source),
        BigDecimal::from_str(amount)?,
        "GBP".to_string(),
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("Recon Core - Reconciliation Walkthrough\n");

    let memberships = vec![
        Membership {
            business_id: "me".to_string(),
            is_personal: true,
        },
        Membership {
            business_id: "corner-shop".to_string(),
            is_personal: false,
        },
    ];
    let ctx =
        BusinessContext::from_memberships(&memberships).ok_or("no business membership")?;
    println!("Acting for business: {}\n", ctx.business_id);

    let store = MemoryTransactionStore::new();
    store.insert(transaction("bank-1", "bank_statement_ocr", "42.50", &ctx.business_id)?)?;
    store.insert(transaction("bank-2", "bank_statement_ocr", "18.00", &ctx.business_id)?)?;
    store.insert(
        transaction("rec-1", "purchase_invoice_ocr", "42.50", &ctx.business_id)?
            .with_status(ReconciliationStatus::Unreconciled),
    )?;
    store.insert(
        transaction("rec-2", "purchase_invoice_ocr", "18.00", &ctx.business_id)?
            .with_status(ReconciliationStatus::Unreconciled),
    )?;
    store.insert(
        transaction("rec-3", "purchase_invoice_ocr", "18.00", &ctx.business_id)?
            .with_status(ReconciliationStatus::Unreconciled),
    )?;

    let engine = ReconciliationEngine::new(store.clone(), store, EngineConfig::from_env()?);

    // 1. Queue
    let queue = engine.reconciliation_queue(&ctx).await?;
    println!(
        "Queue: {} bank line(s), {} card line(s), {} receipt(s)",
        queue.bank.len(),
        queue.cards.len(),
        queue.receipts.len()
    );

    // 2. Single candidate
    if let ResolveOutcome::Reconciled(report) = engine.resolve(&ctx, "bank-1").await? {
        println!(
            "  ✓ {} reconciled with {} (confirmed: {})",
            report.statement.id, report.receipt.id, report.confirmed
        );
    }

    // 3. Several candidates, operator picks one
    if let ResolveOutcome::Ambiguous(selection) = engine.resolve(&ctx, "bank-2").await? {
        println!(
            "  ? {} has {} candidates",
            selection.target.id,
            selection.candidates.len()
        );
        let chosen = selection.candidates[0].id().to_string();
        let report = engine.confirm_choice(&ctx, &selection, &chosen).await?;
        println!(
            "  ✓ operator matched {} with {}",
            report.statement.id, report.receipt.id
        );
    }

    // 4. Packaging extraction with unit confirmation
    let workflow = ExtractionWorkflow::new(
        ScriptedExtractionService::new(vec![Ok(ExtractionResult::Extracted(ExtractionPayload {
            packaging_description: "Pack of 100".to_string(),
            units_per_package: Some(100),
            unit: Some("pcs".to_string()),
            requires_confirmation: true,
            unit_confirmation: Some(UnitConfirmation {
                extracted_unit: "pcs".to_string(),
                normalized_unit: Some("pieces".to_string()),
                question: "Is the selling unit 'pieces'?".to_string(),
            }),
        }))]),
        engine.config().retry.clone(),
    );
    let scope = ConfirmationScope::new();
    let item = StockItem::new("item-1", "Cable ties 100pcs");

    let decision = match workflow.extract_with_confirmation(&ctx, &item, &scope).await? {
        ExtractionOutcome::Success(result) => StockDecision::WithPackaging(result),
        ExtractionOutcome::NeedsConfirmation(pending) => {
            println!("\n  ? {}", pending.question());
            let unit = pending.suggested_unit().to_string();
            StockDecision::WithPackaging(pending.confirm(&unit)?)
        }
        ExtractionOutcome::Failed(failure) => failure.continue_without(),
    };
    println!("  Stock decision: {:?}", decision);

    Ok(())
}
