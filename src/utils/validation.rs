//! Validation utilities and the amount rounding policy

use bigdecimal::{BigDecimal, RoundingMode};

use crate::types::*;

/// Scale used for all monetary amounts
pub const AMOUNT_SCALE: i64 = 2;

/// Round an amount to the system-wide policy (half-up, 2 decimal places)
pub fn round_amount(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(AMOUNT_SCALE, RoundingMode::HalfUp)
}

/// Validate that an amount is not negative
pub fn validate_non_negative(amount: &BigDecimal, field: &str) -> PostingResult<()> {
    if *amount < BigDecimal::from(0) {
        Err(PostingError::Validation(format!(
            "{} must not be negative",
            field
        )))
    } else {
        Ok(())
    }
}

/// Validate that an account code is well formed
pub fn validate_account_code(code: &str) -> PostingResult<()> {
    if code.trim().is_empty() {
        return Err(PostingError::Validation(
            "Account code cannot be empty".to_string(),
        ));
    }

    if code.len() > 20 {
        return Err(PostingError::Validation(
            "Account code cannot exceed 20 characters".to_string(),
        ));
    }

    if !code.chars().all(|c| c.is_alphanumeric() || c == '.') {
        return Err(PostingError::Validation(
            "Account code can only contain alphanumeric characters and dots".to_string(),
        ));
    }

    Ok(())
}

/// Validate a single line item against the rounding policy
pub fn validate_line(line: &LineItem, index: usize) -> PostingResult<()> {
    validate_non_negative(&line.amount, &format!("line {} amount", index))?;

    if let Some(quantity) = &line.quantity {
        let unit_price = line.unit_price.as_ref().ok_or_else(|| {
            PostingError::Validation(format!(
                "line {}: unit_price is required when quantity is present",
                index
            ))
        })?;

        if *quantity <= BigDecimal::from(0) {
            return Err(PostingError::Validation(format!(
                "line {}: quantity must be positive",
                index
            )));
        }

        let expected = round_amount(&(quantity * unit_price));
        if line.amount != expected {
            return Err(PostingError::Validation(format!(
                "line {}: amount {} does not match quantity x unit_price = {}",
                index, line.amount, expected
            )));
        }
    }

    Ok(())
}

/// Validate required header fields and lines of a draft
pub fn validate_draft(draft: &DocumentDraft) -> PostingResult<()> {
    if draft.description.trim().is_empty() {
        return Err(PostingError::Validation(
            "Document description cannot be empty".to_string(),
        ));
    }

    if draft.created_by.trim().is_empty() {
        return Err(PostingError::Validation(
            "Document created_by cannot be empty".to_string(),
        ));
    }

    if draft.kind == DocumentKind::Payroll {
        let totals = draft.payroll.as_ref().ok_or_else(|| {
            PostingError::Validation("Payroll documents require payroll totals".to_string())
        })?;
        validate_non_negative(&totals.salary, "payroll salary")?;
        validate_non_negative(&totals.employer_insurance, "payroll employer insurance")?;
        validate_non_negative(&totals.employee_insurance, "payroll employee insurance")?;
        validate_non_negative(&totals.tax, "payroll tax")?;
        return Ok(());
    }

    if draft.payroll.is_some() {
        return Err(PostingError::Validation(format!(
            "Payroll totals are not valid on {:?} documents",
            draft.kind
        )));
    }

    if draft.lines.is_empty() {
        return Err(PostingError::Validation(
            "Document must have at least one line item".to_string(),
        ));
    }

    for (index, line) in draft.lines.iter().enumerate() {
        validate_line(line, index)?;

        if draft.kind.is_inventory() {
            if line.material_id.is_none() {
                return Err(PostingError::Validation(format!(
                    "line {}: material_id is required on {:?} documents",
                    index, draft.kind
                )));
            }
            if line.quantity.is_none() {
                return Err(PostingError::Validation(format!(
                    "line {}: quantity is required on {:?} documents",
                    index, draft.kind
                )));
            }
        }
    }

    if draft.kind.is_inventory() && draft.warehouse.is_none() {
        return Err(PostingError::Validation(format!(
            "warehouse is required on {:?} documents",
            draft.kind
        )));
    }

    if draft.kind == DocumentKind::Transfer {
        let destination = draft.transfer_to.as_deref().ok_or_else(|| {
            PostingError::Validation("Transfers require a destination warehouse".to_string())
        })?;
        if draft.warehouse.as_deref() == Some(destination) {
            return Err(PostingError::Validation(
                "Transfer source and destination warehouses must differ".to_string(),
            ));
        }
    } else if draft.transfer_to.is_some() {
        return Err(PostingError::Validation(format!(
            "transfer_to is not valid on {:?} documents",
            draft.kind
        )));
    }

    Ok(())
}
