//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use uuid::Uuid;

use crate::types::*;

/// Storage abstraction for the posting system
///
/// This trait allows the posting core to work with any storage backend
/// (PostgreSQL, MySQL, SQLite, in-memory, etc.) by implementing these methods.
///
/// The snapshot/restore pair is the unit-of-work seam: the posting engine
/// takes a snapshot before a multi-step posting sequence and restores it if
/// any step fails, so no partial effect is ever observable. A SQL-backed
/// implementation maps snapshot/restore to BEGIN/ROLLBACK; the in-memory
/// store clones its state. Transaction boundaries are owned by the engine's
/// orchestration call, never by individual storage calls.
///
/// `apply_card_delta` and `apply_estimate_delta` exist so that mutation of
/// shared aggregate rows is an increment-in-place owned by the store (for
/// SQL, an `UPDATE ... SET x = x + ?`), never a read-then-recompute-then-
/// write in engine code. Implementations must apply each delta atomically
/// per card/estimate and may return `ConcurrencyConflict` on optimistic
/// failures; callers retry.
#[async_trait]
pub trait PostingStore: Send + Sync {
    /// Opaque captured state used to roll back a failed posting sequence
    type Snapshot: Send;

    /// Capture current state
    async fn snapshot(&self) -> PostingResult<Self::Snapshot>;

    /// Roll back to a previously captured state
    async fn restore(&mut self, snapshot: Self::Snapshot) -> PostingResult<()>;

    // Accounts

    /// Save an account (insert or replace)
    async fn save_account(&mut self, account: &Account) -> PostingResult<()>;

    /// Get an account by code
    async fn get_account(&self, code: &str) -> PostingResult<Option<Account>>;

    /// List all accounts
    async fn list_accounts(&self) -> PostingResult<Vec<Account>>;

    // Documents

    /// Save a document with its lines (insert or replace)
    async fn save_document(&mut self, document: &Document) -> PostingResult<()>;

    /// Get a document by id
    async fn get_document(&self, id: Uuid) -> PostingResult<Option<Document>>;

    /// Delete a document and its lines
    async fn delete_document(&mut self, id: Uuid) -> PostingResult<()>;

    /// Whether a document number is already used within kind + fiscal year
    async fn document_no_taken(
        &self,
        kind: DocumentKind,
        fiscal_year: i32,
        document_no: &str,
    ) -> PostingResult<bool>;

    /// Allocate the next sequence number for auto-numbering within kind + fiscal year
    async fn next_document_seq(&mut self, kind: DocumentKind, fiscal_year: i32)
        -> PostingResult<u32>;

    // Inventory cards

    /// Get an inventory card by key
    async fn get_card(&self, key: &CardKey) -> PostingResult<Option<InventoryCard>>;

    /// Atomically apply a movement delta, creating a zero-opening card if absent
    async fn apply_card_delta(
        &mut self,
        key: &CardKey,
        delta: &CardDelta,
    ) -> PostingResult<InventoryCard>;

    /// List cards for a material within a fiscal year
    async fn list_cards(
        &self,
        material_id: &str,
        fiscal_year: i32,
    ) -> PostingResult<Vec<InventoryCard>>;

    // General ledger

    /// Append ledger entries
    async fn append_entries(&mut self, entries: &[LedgerEntry]) -> PostingResult<()>;

    /// Entries previously created for a document number
    async fn entries_for_document(&self, document_no: &str) -> PostingResult<Vec<LedgerEntry>>;

    /// Remove all entries created for a document number, returning how many
    async fn remove_entries_for_document(&mut self, document_no: &str) -> PostingResult<usize>;

    // Budget estimates

    /// Save an estimate version and move the current-version pointer to it
    async fn save_estimate(&mut self, estimate: &BudgetEstimate) -> PostingResult<()>;

    /// Get an estimate version by id
    async fn get_estimate(&self, id: Uuid) -> PostingResult<Option<BudgetEstimate>>;

    /// Current version for a budget line identity
    async fn current_estimate(&self, key: &EstimateKey) -> PostingResult<Option<BudgetEstimate>>;

    /// All versions for a fiscal year + chapter, current and historical
    async fn list_estimates(
        &self,
        fiscal_year: i32,
        chapter_code: &str,
    ) -> PostingResult<Vec<BudgetEstimate>>;

    /// Atomically apply a spent/committed delta and recompute remaining
    async fn apply_estimate_delta(
        &mut self,
        id: Uuid,
        delta: &EstimateDelta,
    ) -> PostingResult<BudgetEstimate>;

    /// Record a document's consumption so reversal can undo the exact delta
    async fn save_consumption(&mut self, consumption: &BudgetConsumption) -> PostingResult<()>;

    /// Consumption records written for a document number
    async fn consumptions_for_document(
        &self,
        document_no: &str,
    ) -> PostingResult<Vec<BudgetConsumption>>;

    /// Remove a document's consumption records, returning how many
    async fn remove_consumptions_for_document(
        &mut self,
        document_no: &str,
    ) -> PostingResult<usize>;

    // Override authorizations

    /// Record an authorized overspend
    async fn save_override(&mut self, authorization: &OverrideAuthorization) -> PostingResult<()>;

    /// Overspend authorizations recorded against an estimate version
    async fn list_overrides(&self, estimate_id: Uuid)
        -> PostingResult<Vec<OverrideAuthorization>>;
}

/// Trait for implementing custom document validation rules
pub trait DocumentValidator: Send + Sync {
    /// Validate a draft before it is persisted
    fn validate_draft(&self, draft: &DocumentDraft) -> PostingResult<()>;
}

/// Default document validator enforcing the standard header and line rules
pub struct DefaultDocumentValidator;

impl DocumentValidator for DefaultDocumentValidator {
    fn validate_draft(&self, draft: &DocumentDraft) -> PostingResult<()> {
        crate::utils::validation::validate_draft(draft)
    }
}
