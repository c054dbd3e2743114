//! In-memory storage implementation for testing and embedding

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::traits::PostingStore;
use crate::types::*;

/// All tables behind one lock so a snapshot is atomic across them
#[derive(Debug, Clone, Default)]
struct StoreState {
    accounts: HashMap<String, Account>,
    documents: HashMap<Uuid, Document>,
    cards: HashMap<CardKey, InventoryCard>,
    entries: Vec<LedgerEntry>,
    estimates: HashMap<Uuid, BudgetEstimate>,
    current_estimates: HashMap<EstimateKey, Uuid>,
    consumptions: Vec<BudgetConsumption>,
    overrides: Vec<OverrideAuthorization>,
    document_seqs: HashMap<(DocumentKind, i32), u32>,
}

/// Captured state of a [`MemoryStore`]
#[derive(Debug)]
pub struct MemorySnapshot {
    state: StoreState,
}

/// In-memory [`PostingStore`] for tests and development
///
/// Clones share state, so component managers holding cloned handles all see
/// the same tables. Mutations are serialized under a single lock; snapshot
/// and restore clone and replace the whole state, which stands in for the
/// BEGIN/ROLLBACK of a database-backed store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        *self.inner.write().unwrap() = StoreState::default();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostingStore for MemoryStore {
    type Snapshot = MemorySnapshot;

    async fn snapshot(&self) -> PostingResult<MemorySnapshot> {
        Ok(MemorySnapshot {
            state: self.inner.read().unwrap().clone(),
        })
    }

    async fn restore(&mut self, snapshot: MemorySnapshot) -> PostingResult<()> {
        *self.inner.write().unwrap() = snapshot.state;
        Ok(())
    }

    async fn save_account(&mut self, account: &Account) -> PostingResult<()> {
        self.inner
            .write()
            .unwrap()
            .accounts
            .insert(account.code.clone(), account.clone());
        Ok(())
    }

    async fn get_account(&self, code: &str) -> PostingResult<Option<Account>> {
        Ok(self.inner.read().unwrap().accounts.get(code).cloned())
    }

    async fn list_accounts(&self) -> PostingResult<Vec<Account>> {
        let mut accounts: Vec<Account> =
            self.inner.read().unwrap().accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn save_document(&mut self, document: &Document) -> PostingResult<()> {
        self.inner
            .write()
            .unwrap()
            .documents
            .insert(document.id, document.clone());
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> PostingResult<Option<Document>> {
        Ok(self.inner.read().unwrap().documents.get(&id).cloned())
    }

    async fn delete_document(&mut self, id: Uuid) -> PostingResult<()> {
        if self.inner.write().unwrap().documents.remove(&id).is_some() {
            Ok(())
        } else {
            Err(PostingError::DocumentNotFound(id.to_string()))
        }
    }

    async fn document_no_taken(
        &self,
        kind: DocumentKind,
        fiscal_year: i32,
        document_no: &str,
    ) -> PostingResult<bool> {
        Ok(self.inner.read().unwrap().documents.values().any(|d| {
            d.kind == kind && d.fiscal_year == fiscal_year && d.document_no == document_no
        }))
    }

    async fn next_document_seq(
        &mut self,
        kind: DocumentKind,
        fiscal_year: i32,
    ) -> PostingResult<u32> {
        let mut state = self.inner.write().unwrap();
        let seq = state.document_seqs.entry((kind, fiscal_year)).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn get_card(&self, key: &CardKey) -> PostingResult<Option<InventoryCard>> {
        Ok(self.inner.read().unwrap().cards.get(key).cloned())
    }

    async fn apply_card_delta(
        &mut self,
        key: &CardKey,
        delta: &CardDelta,
    ) -> PostingResult<InventoryCard> {
        let mut state = self.inner.write().unwrap();
        let card = state
            .cards
            .entry(key.clone())
            .or_insert_with(|| InventoryCard::new(key.clone()));
        card.apply(delta);
        Ok(card.clone())
    }

    async fn list_cards(
        &self,
        material_id: &str,
        fiscal_year: i32,
    ) -> PostingResult<Vec<InventoryCard>> {
        let state = self.inner.read().unwrap();
        let mut cards: Vec<InventoryCard> = state
            .cards
            .values()
            .filter(|c| c.key.material_id == material_id && c.key.fiscal_year == fiscal_year)
            .cloned()
            .collect();
        cards.sort_by(|a, b| {
            (&a.key.fund_source_id, &a.key.warehouse).cmp(&(&b.key.fund_source_id, &b.key.warehouse))
        });
        Ok(cards)
    }

    async fn append_entries(&mut self, entries: &[LedgerEntry]) -> PostingResult<()> {
        self.inner
            .write()
            .unwrap()
            .entries
            .extend_from_slice(entries);
        Ok(())
    }

    async fn entries_for_document(&self, document_no: &str) -> PostingResult<Vec<LedgerEntry>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.document_no == document_no)
            .cloned()
            .collect())
    }

    async fn remove_entries_for_document(&mut self, document_no: &str) -> PostingResult<usize> {
        let mut state = self.inner.write().unwrap();
        let before = state.entries.len();
        state.entries.retain(|e| e.document_no != document_no);
        Ok(before - state.entries.len())
    }

    async fn save_estimate(&mut self, estimate: &BudgetEstimate) -> PostingResult<()> {
        let mut state = self.inner.write().unwrap();
        state
            .current_estimates
            .insert(estimate.key(), estimate.id);
        state.estimates.insert(estimate.id, estimate.clone());
        Ok(())
    }

    async fn get_estimate(&self, id: Uuid) -> PostingResult<Option<BudgetEstimate>> {
        Ok(self.inner.read().unwrap().estimates.get(&id).cloned())
    }

    async fn current_estimate(&self, key: &EstimateKey) -> PostingResult<Option<BudgetEstimate>> {
        let state = self.inner.read().unwrap();
        Ok(state
            .current_estimates
            .get(key)
            .and_then(|id| state.estimates.get(id))
            .cloned())
    }

    async fn list_estimates(
        &self,
        fiscal_year: i32,
        chapter_code: &str,
    ) -> PostingResult<Vec<BudgetEstimate>> {
        let state = self.inner.read().unwrap();
        let mut estimates: Vec<BudgetEstimate> = state
            .estimates
            .values()
            .filter(|e| e.fiscal_year == fiscal_year && e.chapter_code == chapter_code)
            .cloned()
            .collect();
        estimates.sort_by(|a, b| (&a.item_code, a.version).cmp(&(&b.item_code, b.version)));
        Ok(estimates)
    }

    async fn apply_estimate_delta(
        &mut self,
        id: Uuid,
        delta: &EstimateDelta,
    ) -> PostingResult<BudgetEstimate> {
        let mut state = self.inner.write().unwrap();
        let estimate = state
            .estimates
            .get_mut(&id)
            .ok_or_else(|| PostingError::EstimateNotFound(id.to_string()))?;
        estimate.spent_amount += &delta.spent_delta;
        estimate.committed_amount += &delta.committed_delta;
        estimate.recompute_remaining();
        Ok(estimate.clone())
    }

    async fn save_consumption(&mut self, consumption: &BudgetConsumption) -> PostingResult<()> {
        self.inner
            .write()
            .unwrap()
            .consumptions
            .push(consumption.clone());
        Ok(())
    }

    async fn consumptions_for_document(
        &self,
        document_no: &str,
    ) -> PostingResult<Vec<BudgetConsumption>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .consumptions
            .iter()
            .filter(|c| c.document_no == document_no)
            .cloned()
            .collect())
    }

    async fn remove_consumptions_for_document(
        &mut self,
        document_no: &str,
    ) -> PostingResult<usize> {
        let mut state = self.inner.write().unwrap();
        let before = state.consumptions.len();
        state.consumptions.retain(|c| c.document_no != document_no);
        Ok(before - state.consumptions.len())
    }

    async fn save_override(
        &mut self,
        authorization: &OverrideAuthorization,
    ) -> PostingResult<()> {
        self.inner
            .write()
            .unwrap()
            .overrides
            .push(authorization.clone());
        Ok(())
    }

    async fn list_overrides(
        &self,
        estimate_id: Uuid,
    ) -> PostingResult<Vec<OverrideAuthorization>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .overrides
            .iter()
            .filter(|o| o.estimate_id == estimate_id)
            .cloned()
            .collect())
    }
}
