//! Utility modules

pub mod in_flight;
pub mod memory_storage;
pub mod scripted_extraction;
pub mod validation;

pub use in_flight::*;
pub use memory_storage::*;
pub use scripted_extraction::*;
pub use validation::*;
