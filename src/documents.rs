//! Source-document persistence: validation, numbering, storage

use bigdecimal::BigDecimal;
use chrono::Datelike;
use uuid::Uuid;

use crate::traits::{DefaultDocumentValidator, DocumentValidator, PostingStore};
use crate::types::*;

/// Document store handling persistence of source documents
///
/// Stores document state only. Inventory, ledger and budget effects are
/// driven by the posting engine, never from here.
pub struct DocumentStore<S: PostingStore> {
    pub(crate) storage: S,
    validator: Box<dyn DocumentValidator>,
}

impl<S: PostingStore> DocumentStore<S> {
    /// Create a new document store
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultDocumentValidator),
        }
    }

    /// Create a new document store with a custom validator
    pub fn with_validator(storage: S, validator: Box<dyn DocumentValidator>) -> Self {
        Self { storage, validator }
    }

    /// Validate a draft, assign id/number/year, and persist it with its lines
    pub async fn create_document(
        &mut self,
        draft: DocumentDraft,
        status: DocumentStatus,
    ) -> PostingResult<Document> {
        self.validator.validate_draft(&draft)?;

        let fiscal_year = draft
            .fiscal_year
            .unwrap_or_else(|| draft.document_date.year());
        let document_no = self.resolve_document_no(&draft, fiscal_year).await?;

        let now = chrono::Utc::now().naive_utc();
        let total_amount = total_of(&draft);
        let document = Document {
            id: Uuid::new_v4(),
            document_no,
            kind: draft.kind,
            document_date: draft.document_date,
            fiscal_year,
            status,
            description: draft.description,
            warehouse: draft.warehouse,
            transfer_to: draft.transfer_to,
            counter_account: draft.counter_account,
            payroll: draft.payroll,
            lines: draft.lines,
            total_amount,
            created_by: draft.created_by,
            created_at: now,
            updated_at: now,
        };

        self.storage.save_document(&document).await?;
        Ok(document)
    }

    /// Replace an existing document's header and lines
    ///
    /// The caller (posting engine) must have reversed a POSTED predecessor
    /// before invoking this; the store itself only swaps stored state.
    pub async fn update_document(
        &mut self,
        id: Uuid,
        draft: DocumentDraft,
        status: DocumentStatus,
    ) -> PostingResult<Document> {
        let existing = self.get_document_required(id).await?;
        self.validator.validate_draft(&draft)?;

        if draft.kind != existing.kind {
            return Err(PostingError::Validation(format!(
                "Document kind cannot change on edit ({:?} -> {:?})",
                existing.kind, draft.kind
            )));
        }

        let fiscal_year = draft
            .fiscal_year
            .unwrap_or_else(|| draft.document_date.year());

        // Keep the assigned number unless the edit explicitly renumbers.
        let document_no = match &draft.document_no {
            Some(no) if *no != existing.document_no => {
                if self
                    .storage
                    .document_no_taken(draft.kind, fiscal_year, no)
                    .await?
                {
                    return Err(PostingError::Validation(format!(
                        "Document number '{}' is already used in {}",
                        no, fiscal_year
                    )));
                }
                no.clone()
            }
            _ => existing.document_no.clone(),
        };

        let total_amount = total_of(&draft);
        let document = Document {
            id,
            document_no,
            kind: existing.kind,
            document_date: draft.document_date,
            fiscal_year,
            status,
            description: draft.description,
            warehouse: draft.warehouse,
            transfer_to: draft.transfer_to,
            counter_account: draft.counter_account,
            payroll: draft.payroll,
            lines: draft.lines,
            total_amount,
            created_by: draft.created_by,
            created_at: existing.created_at,
            updated_at: chrono::Utc::now().naive_utc(),
        };

        self.storage.save_document(&document).await?;
        Ok(document)
    }

    /// Delete a document and its lines
    pub async fn delete_document(&mut self, id: Uuid) -> PostingResult<()> {
        self.storage.delete_document(id).await
    }

    /// Get a document by id
    pub async fn get_document(&self, id: Uuid) -> PostingResult<Option<Document>> {
        self.storage.get_document(id).await
    }

    /// Get a document by id, returning an error if not found
    pub async fn get_document_required(&self, id: Uuid) -> PostingResult<Document> {
        self.storage
            .get_document(id)
            .await?
            .ok_or_else(|| PostingError::DocumentNotFound(id.to_string()))
    }

    async fn resolve_document_no(
        &mut self,
        draft: &DocumentDraft,
        fiscal_year: i32,
    ) -> PostingResult<String> {
        match &draft.document_no {
            Some(no) => {
                if self
                    .storage
                    .document_no_taken(draft.kind, fiscal_year, no)
                    .await?
                {
                    return Err(PostingError::Validation(format!(
                        "Document number '{}' is already used in {}",
                        no, fiscal_year
                    )));
                }
                Ok(no.clone())
            }
            None => {
                let seq = self
                    .storage
                    .next_document_seq(draft.kind, fiscal_year)
                    .await?;
                Ok(format!("{}-{}-{:04}", draft.kind.prefix(), fiscal_year, seq))
            }
        }
    }
}

/// Document total: payroll totals for payroll runs, sum of line amounts otherwise
fn total_of(draft: &DocumentDraft) -> BigDecimal {
    match &draft.payroll {
        Some(totals) => totals.total(),
        None => draft.lines.iter().map(|l| &l.amount).sum(),
    }
}
