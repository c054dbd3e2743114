//! # Posting Core
//!
//! Double-entry posting and budget control engine for public-sector (HCSN)
//! accounting: source documents, balanced general-ledger entries, inventory
//! balance cards, and budget consumption under one transactional boundary.
//!
//! ## Features
//!
//! - **Document lifecycle**: receipts, issues, transfers, vouchers and
//!   payroll runs as typed documents with DRAFT/POSTED status
//! - **Posting engine**: converts a posted document into balanced
//!   debit/credit ledger entries with defensive imbalance checks
//! - **Inventory ledger**: per-(material, fund source, year, warehouse)
//!   running balance cards with negation-based reversal
//! - **Budget control**: reservations, consumption thresholds, override
//!   authorizations, and immutable version chains for adjustments
//! - **Reversal**: editing or deleting a posted document reverses its prior
//!   effects before reapplying, inside one atomic unit
//! - **Storage abstraction**: database-agnostic design with a trait-based
//!   store and snapshot/restore unit of work
//!
//! ## Quick Start
//!
//! ```rust
//! use posting_core::{PostingEngine, MemoryStore};
//!
//! let mut engine = PostingEngine::new(MemoryStore::new());
//! // seed a chart of accounts, then create and post documents
//! ```

pub mod budget;
pub mod documents;
pub mod inventory;
pub mod posting;
pub mod registry;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use budget::{BudgetControl, BudgetPolicy, OverrideRequest, OverspendMode};
pub use documents::DocumentStore;
pub use inventory::{InventoryLedger, DEFAULT_FUND_SOURCE};
pub use posting::*;
pub use registry::{AccountRegistry, DefaultAccounts};
pub use traits::*;
pub use types::*;
pub use utils::MemoryStore;
