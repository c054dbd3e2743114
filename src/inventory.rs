//! Inventory ledger: per-card running balances and movement deltas

use crate::traits::PostingStore;
use crate::types::*;

/// Sentinel fund source used when a movement does not name one
///
/// The source system draws unattributed stock from the state budget rather
/// than FIFO-matching across fund sources holding the same material. Both
/// receipts and issues normalize to this sentinel so they meet on the same
/// card. Known simplification, kept deliberately.
pub const DEFAULT_FUND_SOURCE: &str = "NSNN";

/// Normalize an optional fund source to the card-key representation
pub fn normalize_fund_source(fund_source_id: Option<&str>) -> String {
    match fund_source_id {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => DEFAULT_FUND_SOURCE.to_string(),
    }
}

/// Inventory ledger managing running balance cards
pub struct InventoryLedger<S: PostingStore> {
    pub(crate) storage: S,
}

impl<S: PostingStore> InventoryLedger<S> {
    /// Create a new inventory ledger
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Apply one signed movement to a card, creating it on first touch
    ///
    /// Reversal is the same call with negated deltas and the same direction;
    /// the accumulators are commutative, so this restores the exact prior
    /// card state regardless of interleaving.
    pub async fn apply_movement(
        &mut self,
        key: &CardKey,
        delta: &CardDelta,
    ) -> PostingResult<InventoryCard> {
        self.storage.apply_card_delta(key, delta).await
    }

    /// Get one card by key
    pub async fn get_card(&self, key: &CardKey) -> PostingResult<Option<InventoryCard>> {
        self.storage.get_card(key).await
    }

    /// Read-only projection: all cards of a material in a fiscal year,
    /// grouped by fund source and warehouse
    pub async fn cards_for_material(
        &self,
        material_id: &str,
        fiscal_year: i32,
    ) -> PostingResult<Vec<InventoryCard>> {
        self.storage.list_cards(material_id, fiscal_year).await
    }
}

/// Card movements a document produces when posted
///
/// Receipts and issues touch one card per line. Transfers are an issue at
/// the source warehouse plus a receipt at the destination, inventory only.
/// Non-inventory documents produce no movements.
pub fn document_movements(document: &Document) -> PostingResult<Vec<(CardKey, CardDelta)>> {
    if !document.kind.is_inventory() {
        return Ok(Vec::new());
    }

    let warehouse = document.warehouse.as_deref().ok_or_else(|| {
        PostingError::Validation(format!(
            "Document {}: warehouse is required for inventory postings",
            document.document_no
        ))
    })?;

    let mut movements = Vec::new();
    for (index, line) in document.lines.iter().enumerate() {
        let material_id = line.material_id.clone().ok_or_else(|| {
            PostingError::Validation(format!(
                "Document {} line {}: material_id is required",
                document.document_no, index
            ))
        })?;
        let quantity = line.quantity.clone().ok_or_else(|| {
            PostingError::Validation(format!(
                "Document {} line {}: quantity is required",
                document.document_no, index
            ))
        })?;

        let key = |wh: &str| CardKey {
            material_id: material_id.clone(),
            fund_source_id: normalize_fund_source(line.fund_source_id.as_deref()),
            fiscal_year: document.fiscal_year,
            warehouse: wh.to_string(),
        };
        let delta = |direction: MovementDirection| CardDelta {
            direction,
            qty_delta: quantity.clone(),
            amount_delta: line.amount.clone(),
        };

        match document.kind {
            DocumentKind::Receipt => {
                movements.push((key(warehouse), delta(MovementDirection::Receipt)));
            }
            DocumentKind::Issue => {
                movements.push((key(warehouse), delta(MovementDirection::Issue)));
            }
            DocumentKind::Transfer => {
                let destination = document.transfer_to.as_deref().ok_or_else(|| {
                    PostingError::Validation(format!(
                        "Document {}: transfer destination is required",
                        document.document_no
                    ))
                })?;
                movements.push((key(warehouse), delta(MovementDirection::Issue)));
                movements.push((key(destination), delta(MovementDirection::Receipt)));
            }
            _ => unreachable!("non-inventory kinds filtered above"),
        }
    }

    Ok(movements)
}
