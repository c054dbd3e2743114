//! Utility modules

pub mod memory_store;
pub mod validation;

pub use memory_store::MemoryStore;
pub use validation::*;
