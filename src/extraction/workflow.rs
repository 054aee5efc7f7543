//! Extraction with operator confirmation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::extraction::retry::*;
use crate::traits::*;
use crate::types::*;
use crate::utils::{InFlight, InFlightGuard};

/// Stock item whose packaging is being extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockItem {
    pub id: String,
    /// Free text the extraction service reads (name, supplier line, etc.)
    pub text: String,
}

impl StockItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Finalized packaging data for a stock item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagingResult {
    pub item_id: String,
    pub description: String,
    pub units_per_package: Option<u32>,
    pub unit: Option<String>,
    /// True when the unit was supplied by the operator
    pub unit_confirmed: bool,
    /// Number of calls made to the extraction service
    pub attempts: u32,
}

/// Why an extraction ended without packaging data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Rate limiting or network trouble outlasted the retry budget
    Unavailable,
    /// The service rejected the request
    Rejected,
}

/// Non-blocking failure: the caller may retry or continue without packaging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    pub item_id: String,
    pub reason: FailureReason,
    pub message: String,
    pub attempts: u32,
}

impl ExtractionFailure {
    /// The stock action goes ahead with no packaging data
    pub fn continue_without(self) -> StockDecision {
        StockDecision::WithoutPackaging
    }

    pub fn to_error(&self) -> ReconError {
        match self.reason {
            FailureReason::Unavailable => ReconError::ExtractionUnavailable(self.message.clone()),
            FailureReason::Rejected => ReconError::Validation(self.message.clone()),
        }
    }
}

/// How the dependent stock-management action proceeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockDecision {
    WithPackaging(PackagingResult),
    WithoutPackaging,
    /// Operator cancelled; leave the stock screen, do not retry
    Abort,
}

/// Outcome of [`ExtractionWorkflow::extract_with_confirmation`]
#[derive(Debug)]
pub enum ExtractionOutcome {
    Success(PackagingResult),
    NeedsConfirmation(PendingConfirmation),
    Failed(ExtractionFailure),
}

/// Dismissal token for the screen that owns a pending confirmation
///
/// Clones share state. Once dismissed, confirmations created under this scope
/// can no longer be applied.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationScope {
    dismissed: Arc<AtomicBool>,
}

impl ConfirmationScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dismiss(&self) {
        self.dismissed.store(true, Ordering::SeqCst);
    }

    pub fn is_dismissed(&self) -> bool {
        self.dismissed.load(Ordering::SeqCst)
    }
}

/// Extraction result waiting for the operator to confirm the unit
///
/// The item stays claimed until the confirmation is confirmed, cancelled or
/// dropped.
#[derive(Debug)]
pub struct PendingConfirmation {
    item_id: String,
    confirmation: UnitConfirmation,
    payload: ExtractionPayload,
    attempts: u32,
    scope: ConfirmationScope,
    _guard: InFlightGuard,
}

impl PendingConfirmation {
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn question(&self) -> &str {
        &self.confirmation.question
    }

    pub fn extracted_unit(&self) -> &str {
        &self.confirmation.extracted_unit
    }

    pub fn normalized_unit(&self) -> Option<&str> {
        self.confirmation.normalized_unit.as_deref()
    }

    /// Unit to pre-fill in the prompt
    pub fn suggested_unit(&self) -> &str {
        self.normalized_unit().unwrap_or(self.extracted_unit())
    }

    /// Merge the operator's unit into the pending result. No further call is made.
    pub fn confirm(self, unit: &str) -> ReconResult<PackagingResult> {
        if self.scope.is_dismissed() {
            debug!(item_id = %self.item_id, "Confirmation arrived after dismissal");
            return Err(ReconError::ConfirmationAbandoned);
        }
        let unit = unit.trim();
        if unit.is_empty() {
            return Err(ReconError::Validation(
                "Confirmed unit cannot be empty".to_string(),
            ));
        }

        info!(
            item_id = %self.item_id,
            extracted = %self.confirmation.extracted_unit,
            confirmed = unit,
            "Unit confirmed by operator"
        );
        Ok(PackagingResult {
            item_id: self.item_id,
            description: self.payload.packaging_description,
            units_per_package: self.payload.units_per_package,
            unit: Some(unit.to_string()),
            unit_confirmed: true,
            attempts: self.attempts,
        })
    }

    /// Operator declined; the whole stock action is abandoned
    pub fn cancel(self) -> StockDecision {
        info!(item_id = %self.item_id, "Unit confirmation cancelled");
        StockDecision::Abort
    }
}

/// Drives the extraction service through retries and confirmation
pub struct ExtractionWorkflow<E: ExtractionService> {
    service: E,
    policy: RetryPolicy,
    in_flight: InFlight,
}

impl<E: ExtractionService> ExtractionWorkflow<E> {
    pub fn new(service: E, policy: RetryPolicy) -> Self {
        Self {
            service,
            policy,
            in_flight: InFlight::new(),
        }
    }

    pub fn service(&self) -> &E {
        &self.service
    }

    /// Request packaging data for `item`.
    ///
    /// Only a concurrent call for the same item is an error; every service
    /// failure is reported as [`ExtractionOutcome::Failed`].
    pub async fn extract_with_confirmation(
        &self,
        ctx: &BusinessContext,
        item: &StockItem,
        scope: &ConfirmationScope,
    ) -> ReconResult<ExtractionOutcome> {
        let guard = self.in_flight.acquire(&item.id)?;

        let mut attempts = 0u32;
        let mut rate_limit_retries = 0u32;
        let mut network_retries = 0u32;

        loop {
            attempts += 1;
            let (class, message) = match self.service.extract(ctx, &item.text).await {
                Ok(ExtractionResult::Extracted(payload)) => {
                    return Ok(self.finish(item, payload, attempts, scope, guard));
                }
                Ok(ExtractionResult::Failed(error)) => (FailureClass::of(&error), error.message),
                Err(ReconError::Network(message)) => (FailureClass::Network, message),
                Err(other) => (FailureClass::Fatal, other.to_string()),
            };

            let retries_so_far = match class {
                FailureClass::RateLimited => &mut rate_limit_retries,
                FailureClass::Network => &mut network_retries,
                FailureClass::Fatal => {
                    warn!(item_id = %item.id, error = %message, "Extraction rejected");
                    return Ok(ExtractionOutcome::Failed(ExtractionFailure {
                        item_id: item.id.clone(),
                        reason: FailureReason::Rejected,
                        message,
                        attempts,
                    }));
                }
            };

            match self.policy.decide(class, *retries_so_far) {
                RetryDecision::Retry { delay } => {
                    *retries_so_far += 1;
                    info!(
                        item_id = %item.id,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Retrying extraction"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                RetryDecision::Stop => {
                    warn!(
                        item_id = %item.id,
                        attempts,
                        error = %message,
                        "Extraction unavailable"
                    );
                    return Ok(ExtractionOutcome::Failed(ExtractionFailure {
                        item_id: item.id.clone(),
                        reason: FailureReason::Unavailable,
                        message,
                        attempts,
                    }));
                }
            }
        }
    }

    fn finish(
        &self,
        item: &StockItem,
        payload: ExtractionPayload,
        attempts: u32,
        scope: &ConfirmationScope,
        guard: InFlightGuard,
    ) -> ExtractionOutcome {
        if payload.requires_confirmation {
            match payload.unit_confirmation.clone() {
                Some(confirmation) => {
                    debug!(
                        item_id = %item.id,
                        question = %confirmation.question,
                        "Unit needs confirmation"
                    );
                    return ExtractionOutcome::NeedsConfirmation(PendingConfirmation {
                        item_id: item.id.clone(),
                        confirmation,
                        payload,
                        attempts,
                        scope: scope.clone(),
                        _guard: guard,
                    });
                }
                None => {
                    warn!(
                        item_id = %item.id,
                        "Confirmation requested without a question; using unit as extracted"
                    );
                }
            }
        }

        ExtractionOutcome::Success(PackagingResult {
            item_id: item.id.clone(),
            description: payload.packaging_description,
            units_per_package: payload.units_per_package,
            unit: payload.unit,
            unit_confirmed: false,
            attempts,
        })
    }
}
