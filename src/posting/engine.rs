//! Posting engine orchestrating the document lifecycle
//!
//! The engine owns the transaction boundary: every create/update/delete runs
//! as one ordered sequence (validate, persist, inventory, ledger, budget)
//! under a storage snapshot, restored in full on any failure. Individual
//! components never manage transactions themselves.

use std::collections::HashSet;

use bigdecimal::BigDecimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::budget::{BudgetControl, BudgetPolicy, OverrideRequest};
use crate::documents::DocumentStore;
use crate::inventory::{document_movements, InventoryLedger};
use crate::posting::entries::generate_entries;
use crate::posting::reversal::reverse_document;
use crate::registry::{AccountRegistry, DefaultAccounts};
use crate::traits::PostingStore;
use crate::types::*;

/// Posting engine coordinating documents, inventory, ledger and budget
///
/// Callers must serialize operations per document number (no concurrent
/// post and edit of the same document). Documents touching the same
/// inventory card or budget estimate stay correct concurrently because all
/// shared-aggregate mutation goes through the store's atomic deltas.
pub struct PostingEngine<S: PostingStore> {
    documents: DocumentStore<S>,
    inventory: InventoryLedger<S>,
    budget: BudgetControl<S>,
    registry: AccountRegistry<S>,
    defaults: DefaultAccounts,
    storage: S,
}

impl<S: PostingStore + Clone> PostingEngine<S> {
    /// Create an engine with the default accounts and budget policy
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, DefaultAccounts::default(), BudgetPolicy::default())
    }

    /// Create an engine with a custom default-account table and budget policy
    pub fn with_config(storage: S, defaults: DefaultAccounts, policy: BudgetPolicy) -> Self {
        Self {
            documents: DocumentStore::new(storage.clone()),
            inventory: InventoryLedger::new(storage.clone()),
            budget: BudgetControl::with_policy(storage.clone(), policy),
            registry: AccountRegistry::new(storage.clone()),
            defaults,
            storage,
        }
    }

    /// Account registry, for chart administration
    pub fn registry(&mut self) -> &mut AccountRegistry<S> {
        &mut self.registry
    }

    /// Budget control, for estimate administration (create/approve/adjust)
    pub fn budget(&mut self) -> &mut BudgetControl<S> {
        &mut self.budget
    }

    /// Create a document; a POSTED status triggers the full posting sequence
    pub async fn create_document(
        &mut self,
        draft: DocumentDraft,
        status: DocumentStatus,
    ) -> PostingResult<Document> {
        let snapshot = self.storage.snapshot().await?;
        match self.create_inner(draft, status).await {
            Ok(document) => Ok(document),
            Err(err) => {
                self.storage.restore(snapshot).await?;
                Err(err)
            }
        }
    }

    /// Update a document, reversing a posted predecessor first
    ///
    /// Reverse and repost happen inside one snapshot scope; a reversal
    /// without its repost (or the converse) is never observable.
    pub async fn update_document(
        &mut self,
        id: Uuid,
        draft: DocumentDraft,
        status: DocumentStatus,
    ) -> PostingResult<Document> {
        let snapshot = self.storage.snapshot().await?;
        match self.update_inner(id, draft, status).await {
            Ok(document) => Ok(document),
            Err(err) => {
                self.storage.restore(snapshot).await?;
                Err(err)
            }
        }
    }

    /// Delete a document, reversing its effects first when posted
    pub async fn delete_document(&mut self, id: Uuid) -> PostingResult<()> {
        let snapshot = self.storage.snapshot().await?;
        match self.delete_inner(id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.storage.restore(snapshot).await?;
                Err(err)
            }
        }
    }

    /// Get a document by id
    pub async fn get_document(&self, id: Uuid) -> PostingResult<Option<Document>> {
        self.documents.get_document(id).await
    }

    /// Ledger entries written for a document number
    pub async fn ledger_entries(&self, document_no: &str) -> PostingResult<Vec<LedgerEntry>> {
        self.storage.entries_for_document(document_no).await
    }

    /// Read-only projection: cards of a material in a fiscal year
    pub async fn inventory_cards(
        &self,
        material_id: &str,
        fiscal_year: i32,
    ) -> PostingResult<Vec<InventoryCard>> {
        self.inventory
            .cards_for_material(material_id, fiscal_year)
            .await
    }

    /// Read-only projection: current and historical estimate versions
    pub async fn budget_estimates(
        &self,
        fiscal_year: i32,
        chapter_code: &str,
    ) -> PostingResult<Vec<BudgetEstimate>> {
        self.budget
            .estimates_for_chapter(fiscal_year, chapter_code)
            .await
    }

    async fn create_inner(
        &mut self,
        draft: DocumentDraft,
        status: DocumentStatus,
    ) -> PostingResult<Document> {
        let document = self.documents.create_document(draft, status).await?;
        if document.status == DocumentStatus::Posted {
            self.apply_effects(&document).await?;
        }
        Ok(document)
    }

    async fn update_inner(
        &mut self,
        id: Uuid,
        draft: DocumentDraft,
        status: DocumentStatus,
    ) -> PostingResult<Document> {
        let existing = self.documents.get_document_required(id).await?;
        reverse_document(
            &mut self.inventory,
            &mut self.budget,
            &mut self.storage,
            &existing,
        )
        .await?;

        let document = self.documents.update_document(id, draft, status).await?;
        if document.status == DocumentStatus::Posted {
            self.apply_effects(&document).await?;
        }
        Ok(document)
    }

    async fn delete_inner(&mut self, id: Uuid) -> PostingResult<()> {
        let existing = self.documents.get_document_required(id).await?;
        reverse_document(
            &mut self.inventory,
            &mut self.budget,
            &mut self.storage,
            &existing,
        )
        .await?;
        self.documents.delete_document(id).await?;
        info!(document_no = %existing.document_no, "document deleted");
        Ok(())
    }

    /// Steps 3-5 of the posting sequence: inventory, ledger, budget
    async fn apply_effects(&mut self, document: &Document) -> PostingResult<()> {
        for (key, delta) in document_movements(document)? {
            self.inventory.apply_movement(&key, &delta).await?;
        }

        let entries = generate_entries(document, &self.defaults)?;
        let accounts: HashSet<&str> = entries.iter().map(|e| e.account_code.as_str()).collect();
        for code in accounts {
            self.registry.ensure_postable(code).await.map_err(|err| {
                match err {
                    PostingError::AccountNotFound(detail) => PostingError::AccountNotFound(
                        format!("document {}: {}", document.document_no, detail),
                    ),
                    other => other,
                }
            })?;
        }
        self.storage.append_entries(&entries).await?;
        debug!(
            document_no = %document.document_no,
            entries = entries.len(),
            "ledger entries written"
        );

        for (index, line) in document.lines.iter().enumerate() {
            let Some(estimate_id) = line.budget_estimate_id else {
                continue;
            };
            if line.amount == BigDecimal::from(0) {
                continue;
            }
            let override_request = line.budget_override_ref.as_ref().map(|reference| {
                OverrideRequest {
                    reference: reference.clone(),
                    authorized_by: document.created_by.clone(),
                }
            });
            self.budget
                .consume_for_document(
                    &document.document_no,
                    estimate_id,
                    line.amount.clone(),
                    override_request,
                )
                .await
                .map_err(|err| match err {
                    PostingError::Validation(detail) => PostingError::Validation(format!(
                        "document {} line {}: {}",
                        document.document_no, index, detail
                    )),
                    other => other,
                })?;
        }

        info!(
            document_no = %document.document_no,
            kind = ?document.kind,
            total = %document.total_amount,
            "document posted"
        );
        Ok(())
    }
}
