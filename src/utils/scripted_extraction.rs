//! Scripted extraction service for testing

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::traits::*;
use crate::types::*;

/// Extraction service that replays a fixed sequence of responses
///
/// Every call pops the next scripted response and records the item text it
/// was called with. Once the script runs out, calls fail as network errors.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExtractionService {
    script: Arc<Mutex<VecDeque<ReconResult<ExtractionResult>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedExtractionService {
    pub fn new(script: Vec<ReconResult<ExtractionResult>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append a response to the end of the script
    pub fn push(&self, response: ReconResult<ExtractionResult>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Item texts of every call made so far
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl ExtractionService for ScriptedExtractionService {
    async fn extract(
        &self,
        _ctx: &BusinessContext,
        item_text: &str,
    ) -> ReconResult<ExtractionResult> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item_text.to_string());
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(ReconError::Network("no scripted response left".to_string())))
    }
}
