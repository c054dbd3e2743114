//! Reversal of a posted document's inventory, ledger and budget effects

use tracing::debug;

use crate::budget::BudgetControl;
use crate::inventory::{document_movements, InventoryLedger};
use crate::traits::PostingStore;
use crate::types::*;

/// Undo every derived effect of a posted document
///
/// Inventory movements are re-applied with negated deltas in the original
/// direction (negation, not a direction swap: the accumulators are signed).
/// Ledger entries are removed by origin document number, which is the exact
/// set written at posting time, not a recomputation from current state.
/// Budget consumption is reverted from the consumption records written at
/// posting time, restoring the matched reservation to committed. Called
/// only inside the engine's snapshot scope, so a partial reversal is never
/// observable.
pub(crate) async fn reverse_document<S: PostingStore>(
    inventory: &mut InventoryLedger<S>,
    budget: &mut BudgetControl<S>,
    storage: &mut S,
    document: &Document,
) -> PostingResult<()> {
    if document.status != DocumentStatus::Posted {
        return Ok(());
    }

    for (key, delta) in document_movements(document)? {
        inventory.apply_movement(&key, &delta.negated()).await?;
    }

    let removed = storage
        .remove_entries_for_document(&document.document_no)
        .await?;

    let reverted = budget
        .revert_document_consumption(&document.document_no)
        .await?;

    debug!(
        document_no = %document.document_no,
        entries_removed = removed,
        consumptions_reverted = reverted,
        "reversed posted document"
    );
    Ok(())
}
