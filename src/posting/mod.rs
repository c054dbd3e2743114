//! Posting engine: entry generation, reversal, and orchestration

pub mod engine;
pub mod entries;
mod reversal;

pub use engine::*;
pub use entries::*;
