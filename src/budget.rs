//! Budget control: reservations, consumption, thresholds, version chains

use bigdecimal::BigDecimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::traits::PostingStore;
use crate::types::*;

/// What happens when a consume would cross the block threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverspendMode {
    /// Fail with `BudgetExceeded`
    HardBlock,
    /// Allow, but only with an override authorization recorded
    RequireOverride,
}

/// Threshold policy applied on every consume
///
/// Thresholds are percentages of `allocated_amount`. Landing exactly on the
/// block threshold is allowed; crossing it is not.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetPolicy {
    pub warning_percent: BigDecimal,
    pub block_percent: BigDecimal,
    pub overspend: OverspendMode,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            warning_percent: BigDecimal::from(80),
            block_percent: BigDecimal::from(100),
            overspend: OverspendMode::HardBlock,
        }
    }
}

/// Approval attached to a consume that crosses the block threshold
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideRequest {
    /// External approval reference (decision number, signed memo, ...)
    pub reference: String,
    pub authorized_by: String,
}

/// Budget control component; the only authorized mutator of budget estimates
pub struct BudgetControl<S: PostingStore> {
    pub(crate) storage: S,
    policy: BudgetPolicy,
}

impl<S: PostingStore> BudgetControl<S> {
    /// Create budget control with the default policy
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            policy: BudgetPolicy::default(),
        }
    }

    /// Create budget control with a custom threshold policy
    pub fn with_policy(storage: S, policy: BudgetPolicy) -> Self {
        Self { storage, policy }
    }

    /// The active threshold policy
    pub fn policy(&self) -> &BudgetPolicy {
        &self.policy
    }

    /// Create version 1 of a budget line
    pub async fn create_estimate(
        &mut self,
        fiscal_year: i32,
        chapter_code: String,
        item_code: String,
        allocated_amount: BigDecimal,
    ) -> PostingResult<BudgetEstimate> {
        if allocated_amount < BigDecimal::from(0) {
            return Err(PostingError::Validation(
                "Allocated amount must not be negative".to_string(),
            ));
        }

        let estimate = BudgetEstimate::new(fiscal_year, chapter_code, item_code, allocated_amount);
        if self
            .storage
            .current_estimate(&estimate.key())
            .await?
            .is_some()
        {
            return Err(PostingError::Validation(format!(
                "Budget line {}/{} already exists for {}; use adjust",
                estimate.chapter_code, estimate.item_code, estimate.fiscal_year
            )));
        }

        self.storage.save_estimate(&estimate).await?;
        Ok(estimate)
    }

    /// Get an estimate version by id, or fail
    pub async fn get_estimate_required(&self, id: Uuid) -> PostingResult<BudgetEstimate> {
        self.storage
            .get_estimate(id)
            .await?
            .ok_or_else(|| PostingError::EstimateNotFound(id.to_string()))
    }

    /// Approve a draft version for execution
    pub async fn approve(&mut self, id: Uuid) -> PostingResult<BudgetEstimate> {
        let mut estimate = self.get_estimate_required(id).await?;
        if estimate.status != BudgetStatus::Draft {
            return Err(PostingError::Validation(format!(
                "Only Draft estimates can be approved, {} is {:?}",
                id, estimate.status
            )));
        }
        estimate.status = BudgetStatus::Approved;
        self.storage.save_estimate(&estimate).await?;
        Ok(estimate)
    }

    /// Close an estimate; no further consumption is allowed
    pub async fn close(&mut self, id: Uuid) -> PostingResult<BudgetEstimate> {
        let mut estimate = self.get_estimate_required(id).await?;
        estimate.status = BudgetStatus::Closed;
        self.storage.save_estimate(&estimate).await?;
        Ok(estimate)
    }

    /// Reserve budget for a pending, not-yet-executed spend
    pub async fn reserve(&mut self, id: Uuid, amount: BigDecimal) -> PostingResult<BudgetEstimate> {
        self.ensure_consumable(id).await?;
        validate_positive(&amount)?;

        let delta = EstimateDelta {
            spent_delta: BigDecimal::from(0),
            committed_delta: amount,
        };
        let updated = self.storage.apply_estimate_delta(id, &delta).await?;
        self.warn_if_past_warning(&updated);
        Ok(updated)
    }

    /// Cancel a reservation
    pub async fn release(&mut self, id: Uuid, amount: BigDecimal) -> PostingResult<BudgetEstimate> {
        validate_positive(&amount)?;
        let estimate = self.get_estimate_required(id).await?;
        if estimate.committed_amount < amount {
            return Err(PostingError::Validation(format!(
                "Cannot release {} from estimate {}: only {} committed",
                amount, id, estimate.committed_amount
            )));
        }

        let delta = EstimateDelta {
            spent_delta: BigDecimal::from(0),
            committed_delta: -amount,
        };
        self.storage.apply_estimate_delta(id, &delta).await
    }

    /// Record actual spend against an estimate
    ///
    /// Consumes a matching reservation when one exists (decrementing
    /// committed by the matched amount), otherwise increments spent
    /// directly. Crossing the block threshold fails under the hard-block
    /// policy, or requires an override authorization under the override
    /// policy. Landing exactly on the threshold succeeds.
    pub async fn consume(
        &mut self,
        id: Uuid,
        amount: BigDecimal,
        override_request: Option<OverrideRequest>,
    ) -> PostingResult<BudgetEstimate> {
        self.consume_inner(id, amount, override_request, None).await
    }

    /// Consume on behalf of a posted document, recording the applied delta
    ///
    /// The record keeps the matched reservation amount, so
    /// `revert_document_consumption` restores the exact spent/committed
    /// split the posting changed.
    pub async fn consume_for_document(
        &mut self,
        document_no: &str,
        id: Uuid,
        amount: BigDecimal,
        override_request: Option<OverrideRequest>,
    ) -> PostingResult<BudgetEstimate> {
        self.consume_inner(id, amount, override_request, Some(document_no))
            .await
    }

    async fn consume_inner(
        &mut self,
        id: Uuid,
        amount: BigDecimal,
        override_request: Option<OverrideRequest>,
        document_no: Option<&str>,
    ) -> PostingResult<BudgetEstimate> {
        self.ensure_consumable(id).await?;
        validate_positive(&amount)?;

        let before = self.get_estimate_required(id).await?;
        let matched = if before.committed_amount < amount {
            before.committed_amount.clone()
        } else {
            amount.clone()
        };

        let delta = EstimateDelta {
            spent_delta: amount.clone(),
            committed_delta: -&matched,
        };
        let updated = self.storage.apply_estimate_delta(id, &delta).await?;

        if past_threshold(&updated, &self.policy.block_percent) {
            let authorized = match (self.policy.overspend, override_request) {
                (OverspendMode::RequireOverride, Some(request)) => Some(request),
                _ => None,
            };

            match authorized {
                Some(request) => {
                    let authorization = OverrideAuthorization {
                        id: Uuid::new_v4(),
                        estimate_id: id,
                        reference: request.reference,
                        amount: amount.clone(),
                        authorized_by: request.authorized_by,
                        authorized_at: chrono::Utc::now().naive_utc(),
                    };
                    self.storage.save_override(&authorization).await?;
                    warn!(
                        estimate_id = %id,
                        amount = %amount,
                        reference = %authorization.reference,
                        "budget block threshold crossed with override authorization"
                    );
                }
                None => {
                    // Undo before surfacing so standalone callers stay consistent.
                    self.storage
                        .apply_estimate_delta(id, &delta.negated())
                        .await?;
                    return Err(PostingError::BudgetExceeded {
                        estimate_id: id,
                        requested: amount,
                        remaining: before.remaining_amount,
                        document_no: document_no.map(str::to_string),
                    });
                }
            }
        } else {
            self.warn_if_past_warning(&updated);
        }

        if let Some(document_no) = document_no {
            let consumption = BudgetConsumption {
                id: Uuid::new_v4(),
                document_no: document_no.to_string(),
                estimate_id: id,
                amount: amount.clone(),
                matched_committed: matched,
            };
            self.storage.save_consumption(&consumption).await?;
        }

        let mut updated = self.get_estimate_required(id).await?;
        if updated.status == BudgetStatus::Approved {
            updated.status = BudgetStatus::Executing;
            self.storage.save_estimate(&updated).await?;
        }
        Ok(updated)
    }

    /// Undo every consumption a document recorded, used by reversal
    ///
    /// Each record is replayed as the exact negated delta: spent goes back
    /// down by the consumed amount and the matched reservation returns to
    /// committed. Returns how many records were reverted and removed.
    pub async fn revert_document_consumption(
        &mut self,
        document_no: &str,
    ) -> PostingResult<usize> {
        let consumptions = self.storage.consumptions_for_document(document_no).await?;
        for consumption in &consumptions {
            let delta = EstimateDelta {
                spent_delta: -&consumption.amount,
                committed_delta: consumption.matched_committed.clone(),
            };
            self.storage
                .apply_estimate_delta(consumption.estimate_id, &delta)
                .await?;
        }
        self.storage
            .remove_consumptions_for_document(document_no)
            .await
    }

    /// Create a new version with a changed allocation
    ///
    /// Appends version + 1 linked through `parent_id`; spent and committed
    /// carry forward unchanged and the new version starts as Draft pending
    /// approval. `expected_version` guards against racing adjustments.
    pub async fn adjust(
        &mut self,
        id: Uuid,
        new_allocated_amount: BigDecimal,
        reason: String,
        expected_version: u32,
    ) -> PostingResult<BudgetEstimate> {
        if new_allocated_amount < BigDecimal::from(0) {
            return Err(PostingError::Validation(
                "Allocated amount must not be negative".to_string(),
            ));
        }

        let prior = self.get_estimate_required(id).await?;
        let current = self
            .storage
            .current_estimate(&prior.key())
            .await?
            .ok_or_else(|| PostingError::EstimateNotFound(id.to_string()))?;
        if current.id != prior.id || current.version != expected_version {
            return Err(PostingError::ConcurrencyConflict(format!(
                "Estimate {}/{} was adjusted concurrently: current version is {}, expected {}",
                prior.chapter_code, prior.item_code, current.version, expected_version
            )));
        }

        let mut next = BudgetEstimate {
            id: Uuid::new_v4(),
            version: prior.version + 1,
            parent_id: Some(prior.id),
            allocated_amount: new_allocated_amount,
            status: BudgetStatus::Draft,
            adjustment_reason: Some(reason),
            ..prior.clone()
        };
        next.recompute_remaining();

        self.storage.save_estimate(&next).await?;
        info!(
            chapter = %next.chapter_code,
            item = %next.item_code,
            version = next.version,
            allocated = %next.allocated_amount,
            "budget estimate adjusted"
        );
        Ok(next)
    }

    /// Current version for a budget line identity
    pub async fn current_estimate(
        &self,
        key: &EstimateKey,
    ) -> PostingResult<Option<BudgetEstimate>> {
        self.storage.current_estimate(key).await
    }

    /// Current and historical versions for a fiscal year + chapter
    pub async fn estimates_for_chapter(
        &self,
        fiscal_year: i32,
        chapter_code: &str,
    ) -> PostingResult<Vec<BudgetEstimate>> {
        self.storage.list_estimates(fiscal_year, chapter_code).await
    }

    async fn ensure_consumable(&self, id: Uuid) -> PostingResult<()> {
        let estimate = self.get_estimate_required(id).await?;
        match estimate.status {
            BudgetStatus::Approved | BudgetStatus::Executing => Ok(()),
            status => Err(PostingError::Validation(format!(
                "Estimate {} is {:?} and cannot be consumed",
                id, status
            ))),
        }
    }

    fn warn_if_past_warning(&self, estimate: &BudgetEstimate) {
        if past_threshold(estimate, &self.policy.warning_percent) {
            warn!(
                estimate_id = %estimate.id,
                spent = %estimate.spent_amount,
                committed = %estimate.committed_amount,
                allocated = %estimate.allocated_amount,
                "budget warning threshold crossed"
            );
        }
    }
}

/// Whether spent + committed exceeds `percent` of the allocation
fn past_threshold(estimate: &BudgetEstimate, percent: &BigDecimal) -> bool {
    let used = (&estimate.spent_amount + &estimate.committed_amount) * BigDecimal::from(100);
    used > &estimate.allocated_amount * percent
}

fn validate_positive(amount: &BigDecimal) -> PostingResult<()> {
    if *amount <= BigDecimal::from(0) {
        return Err(PostingError::Validation(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_store::MemoryStore;

    async fn approved_estimate(
        control: &mut BudgetControl<MemoryStore>,
        allocated: i64,
    ) -> BudgetEstimate {
        let estimate = control
            .create_estimate(
                2026,
                "622".to_string(),
                "6000".to_string(),
                BigDecimal::from(allocated),
            )
            .await
            .unwrap();
        control.approve(estimate.id).await.unwrap()
    }

    #[tokio::test]
    async fn remaining_is_always_derived() {
        let mut control = BudgetControl::new(MemoryStore::new());
        let estimate = approved_estimate(&mut control, 1_000_000).await;

        let after = control
            .reserve(estimate.id, BigDecimal::from(300_000))
            .await
            .unwrap();
        assert_eq!(after.remaining_amount, BigDecimal::from(700_000));

        let after = control
            .consume(estimate.id, BigDecimal::from(200_000), None)
            .await
            .unwrap();
        // 200k consumed against the reservation: spent 200k, committed 100k
        assert_eq!(after.spent_amount, BigDecimal::from(200_000));
        assert_eq!(after.committed_amount, BigDecimal::from(100_000));
        assert_eq!(
            after.remaining_amount,
            &after.allocated_amount - &after.spent_amount - &after.committed_amount
        );

        let after = control
            .release(estimate.id, BigDecimal::from(100_000))
            .await
            .unwrap();
        assert_eq!(after.committed_amount, BigDecimal::from(0));
        assert_eq!(after.remaining_amount, BigDecimal::from(800_000));
    }

    #[tokio::test]
    async fn consume_at_exact_threshold_succeeds_then_blocks() {
        let mut control = BudgetControl::new(MemoryStore::new());
        let estimate = approved_estimate(&mut control, 1_000_000).await;

        let after = control
            .consume(estimate.id, BigDecimal::from(1_000_000), None)
            .await
            .unwrap();
        assert_eq!(after.remaining_amount, BigDecimal::from(0));
        assert_eq!(after.status, BudgetStatus::Executing);

        let err = control
            .consume(estimate.id, BigDecimal::from(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PostingError::BudgetExceeded { .. }));

        // failed consume left no trace
        let unchanged = control.get_estimate_required(estimate.id).await.unwrap();
        assert_eq!(unchanged.spent_amount, BigDecimal::from(1_000_000));
        assert_eq!(unchanged.remaining_amount, BigDecimal::from(0));
    }

    #[tokio::test]
    async fn override_mode_requires_and_records_authorization() {
        let policy = BudgetPolicy {
            overspend: OverspendMode::RequireOverride,
            ..BudgetPolicy::default()
        };
        let store = MemoryStore::new();
        let mut control = BudgetControl::with_policy(store.clone(), policy);
        let estimate = approved_estimate(&mut control, 100_000).await;

        let err = control
            .consume(estimate.id, BigDecimal::from(150_000), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PostingError::BudgetExceeded { .. }));

        let after = control
            .consume(
                estimate.id,
                BigDecimal::from(150_000),
                Some(OverrideRequest {
                    reference: "QD-2026-17".to_string(),
                    authorized_by: "giamdoc".to_string(),
                }),
            )
            .await
            .unwrap();
        assert_eq!(after.spent_amount, BigDecimal::from(150_000));
        assert_eq!(after.remaining_amount, BigDecimal::from(-50_000));

        let overrides = control
            .storage
            .list_overrides(estimate.id)
            .await
            .unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].reference, "QD-2026-17");
    }

    #[tokio::test]
    async fn document_reversal_restores_matched_reservation() {
        let mut control = BudgetControl::new(MemoryStore::new());
        let estimate = approved_estimate(&mut control, 1_000_000).await;
        control
            .reserve(estimate.id, BigDecimal::from(200_000))
            .await
            .unwrap();

        let after = control
            .consume_for_document("PC-2026-0001", estimate.id, BigDecimal::from(150_000), None)
            .await
            .unwrap();
        assert_eq!(after.spent_amount, BigDecimal::from(150_000));
        assert_eq!(after.committed_amount, BigDecimal::from(50_000));

        let reverted = control
            .revert_document_consumption("PC-2026-0001")
            .await
            .unwrap();
        assert_eq!(reverted, 1);

        // the matched reservation is back in committed, not lost
        let estimate = control.get_estimate_required(estimate.id).await.unwrap();
        assert_eq!(estimate.spent_amount, BigDecimal::from(0));
        assert_eq!(estimate.committed_amount, BigDecimal::from(200_000));
        assert_eq!(estimate.remaining_amount, BigDecimal::from(800_000));

        // records are consumed by the revert; running it again is a no-op
        let again = control
            .revert_document_consumption("PC-2026-0001")
            .await
            .unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn adjust_chains_versions_and_detects_races() {
        let mut control = BudgetControl::new(MemoryStore::new());
        let v1 = approved_estimate(&mut control, 500_000).await;
        control
            .consume(v1.id, BigDecimal::from(200_000), None)
            .await
            .unwrap();

        let v2 = control
            .adjust(
                v1.id,
                BigDecimal::from(800_000),
                "Supplemental allocation Q3".to_string(),
                1,
            )
            .await
            .unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(v2.parent_id, Some(v1.id));
        assert_eq!(v2.spent_amount, BigDecimal::from(200_000));
        assert_eq!(v2.status, BudgetStatus::Draft);
        assert_eq!(v2.remaining_amount, BigDecimal::from(600_000));

        // stale version number is a conflict
        let err = control
            .adjust(v1.id, BigDecimal::from(900_000), "Race".to_string(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, PostingError::ConcurrencyConflict(_)));
    }

    #[tokio::test]
    async fn draft_and_closed_estimates_cannot_be_consumed() {
        let mut control = BudgetControl::new(MemoryStore::new());
        let draft = control
            .create_estimate(
                2026,
                "622".to_string(),
                "6050".to_string(),
                BigDecimal::from(100_000),
            )
            .await
            .unwrap();
        assert!(control
            .consume(draft.id, BigDecimal::from(1), None)
            .await
            .is_err());

        let approved = control.approve(draft.id).await.unwrap();
        control.close(approved.id).await.unwrap();
        assert!(control
            .consume(approved.id, BigDecimal::from(1), None)
            .await
            .is_err());
    }
}
