//! # Recon Core
//!
//! Reconciliation engine for small-business bookkeeping: matching bank and
//! credit-card statement lines against purchase receipts, tracking each
//! transaction's reconciliation status, and extracting packaging data for
//! stock items with operator confirmation.
//!
//! ## Features
//!
//! - **Classification**: bank, credit-card, purchase receipt or other, derived from capture metadata
//! - **Candidate selection**: amount (within 0.01) and currency equality, in pool order
//! - **Match resolution**: auto-match a single candidate, ask the operator when there are several
//! - **Status lifecycle**: forward-only reconciliation statuses with conflict logging
//! - **Extraction workflow**: rate-limit backoff, network retry and unit confirmation
//! - **Storage abstraction**: repository and remote services are traits
//!
//! ## Quick Start
//!
//! ```rust
//! use recon_core::utils::MemoryTransactionStore;
//! use recon_core::{BusinessContext, EngineConfig, ReconciliationEngine};
//!
//! // Any TransactionRepository / ReconciliationService pair works here
//! let store = MemoryTransactionStore::new();
//! let engine = ReconciliationEngine::new(store.clone(), store, EngineConfig::default());
//! let ctx = BusinessContext::new("my-business");
//! # let _ = (engine, ctx);
//! ```

pub mod config;
pub mod extraction;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use extraction::*;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
