//! Reconciliation of statement lines against purchase receipts
//!
//! Bank and credit-card statement lines are opted out of reconciliation once
//! they have accounting entries or a terminal status; receipts are opted in
//! only when explicitly marked `unreconciled`. A statement line and a receipt
//! are candidates for each other when their currencies are equal and their
//! amounts differ by less than the configured tolerance.

pub mod candidates;
pub mod classifier;
pub mod engine;
pub mod resolver;
pub mod status;

pub use candidates::*;
pub use classifier::*;
pub use engine::*;
pub use resolver::*;
pub use status::*;
