//! Packaging extraction with retry and operator confirmation
//!
//! [`RetryPolicy`] is a pure decision function: given how a call failed and how
//! many retries of that kind were already made, it says whether to try again
//! and after which delay. [`ExtractionWorkflow`] drives the external
//! [`crate::ExtractionService`] with it and pauses for the operator when the
//! service is unsure about the unit.

pub mod retry;
pub mod workflow;

pub use retry::*;
pub use workflow::*;
