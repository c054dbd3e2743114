//! Ledger entry generation: one balanced entry set per posted document

use bigdecimal::BigDecimal;

use crate::registry::DefaultAccounts;
use crate::types::*;

/// Generate the balanced ledger entries for a document
///
/// Inventory documents produce one entry per line on the material/asset
/// side plus a single aggregate entry on the counter side. Transfers move
/// stock only and produce no entries. Financial documents produce a
/// debit/credit pair per line. Payroll produces up to four fixed legs from
/// its aggregate totals, skipping zero legs.
///
/// Zero-amount lines are skipped so every emitted entry has exactly one
/// nonzero side.
pub fn generate_entries(
    document: &Document,
    defaults: &DefaultAccounts,
) -> PostingResult<Vec<LedgerEntry>> {
    let entries = match document.kind {
        DocumentKind::Transfer => Vec::new(),
        DocumentKind::Receipt => inventory_entries(document, defaults, true)?,
        DocumentKind::Issue => inventory_entries(document, defaults, false)?,
        DocumentKind::Voucher
        | DocumentKind::RevenueReceipt
        | DocumentKind::ExpenseVoucher => financial_entries(document, defaults)?,
        DocumentKind::Payroll => payroll_entries(document, defaults)?,
    };

    check_balanced(&document.document_no, &entries)?;
    Ok(entries)
}

/// Assert sum(debit) == sum(credit); an imbalance is an engine bug
pub fn check_balanced(document_no: &str, entries: &[LedgerEntry]) -> PostingResult<()> {
    let debits: BigDecimal = entries.iter().map(|e| &e.debit_amount).sum();
    let credits: BigDecimal = entries.iter().map(|e| &e.credit_amount).sum();
    if debits != credits {
        return Err(PostingError::Imbalance {
            document_no: document_no.to_string(),
            debits,
            credits,
        });
    }
    Ok(())
}

/// Receipts debit the line account and credit the counter in aggregate;
/// issues are the mirror image.
fn inventory_entries(
    document: &Document,
    defaults: &DefaultAccounts,
    lines_are_debit: bool,
) -> PostingResult<Vec<LedgerEntry>> {
    let counter = counter_account(document, defaults);

    let mut entries = Vec::new();
    let mut total = BigDecimal::from(0);
    let mut first_line_account: Option<String> = None;

    for line in &document.lines {
        if line.amount == BigDecimal::from(0) {
            continue;
        }

        let line_account = if lines_are_debit {
            line.debit_account.clone()
        } else {
            line.credit_account.clone()
        }
        .unwrap_or_else(|| defaults.materials.clone());

        first_line_account.get_or_insert_with(|| line_account.clone());
        total += &line.amount;

        let entry = if lines_are_debit {
            LedgerEntry::debit(
                document.document_no.clone(),
                document.document_date,
                line_account,
                counter.clone(),
                line.amount.clone(),
            )
        } else {
            LedgerEntry::credit(
                document.document_no.clone(),
                document.document_date,
                line_account,
                counter.clone(),
                line.amount.clone(),
            )
        };
        entries.push(entry);
    }

    // Aggregate counter entry. When lines resolve to different accounts the
    // reciprocal is the first line's account, best-effort classification.
    if let Some(reciprocal) = first_line_account {
        let aggregate = if lines_are_debit {
            LedgerEntry::credit(
                document.document_no.clone(),
                document.document_date,
                counter,
                reciprocal,
                total,
            )
        } else {
            LedgerEntry::debit(
                document.document_no.clone(),
                document.document_date,
                counter,
                reciprocal,
                total,
            )
        };
        entries.push(aggregate);
    }

    Ok(entries)
}

fn financial_entries(
    document: &Document,
    defaults: &DefaultAccounts,
) -> PostingResult<Vec<LedgerEntry>> {
    let mut entries = Vec::new();

    for (index, line) in document.lines.iter().enumerate() {
        if line.amount == BigDecimal::from(0) {
            continue;
        }

        let (default_debit, default_credit) = match document.kind {
            DocumentKind::RevenueReceipt => {
                (Some(defaults.cash.clone()), Some(defaults.revenue.clone()))
            }
            DocumentKind::ExpenseVoucher => {
                (Some(defaults.expense.clone()), Some(defaults.cash.clone()))
            }
            // Plain vouchers carry their accounts explicitly.
            _ => (None, None),
        };

        let debit_account = line
            .debit_account
            .clone()
            .or(default_debit)
            .ok_or_else(|| no_account(document, index, "debit"))?;
        let credit_account = line
            .credit_account
            .clone()
            .or(default_credit)
            .ok_or_else(|| no_account(document, index, "credit"))?;

        entries.push(LedgerEntry::debit(
            document.document_no.clone(),
            document.document_date,
            debit_account.clone(),
            credit_account.clone(),
            line.amount.clone(),
        ));
        entries.push(LedgerEntry::credit(
            document.document_no.clone(),
            document.document_date,
            credit_account,
            debit_account,
            line.amount.clone(),
        ));
    }

    Ok(entries)
}

/// Fixed payroll pattern: expense to payables, payables to withholdings
fn payroll_entries(
    document: &Document,
    defaults: &DefaultAccounts,
) -> PostingResult<Vec<LedgerEntry>> {
    let totals = document.payroll.as_ref().ok_or_else(|| {
        PostingError::Validation(format!(
            "Document {}: payroll totals are missing",
            document.document_no
        ))
    })?;

    let legs = [
        (&totals.salary, &defaults.expense, &defaults.salary_payable),
        (
            &totals.employer_insurance,
            &defaults.expense,
            &defaults.insurance_payable,
        ),
        (
            &totals.employee_insurance,
            &defaults.salary_payable,
            &defaults.insurance_payable,
        ),
        (&totals.tax, &defaults.salary_payable, &defaults.tax_payable),
    ];

    let mut entries = Vec::new();
    for (amount, debit_account, credit_account) in legs {
        if *amount == BigDecimal::from(0) {
            continue;
        }
        entries.push(LedgerEntry::debit(
            document.document_no.clone(),
            document.document_date,
            debit_account.clone(),
            credit_account.clone(),
            amount.clone(),
        ));
        entries.push(LedgerEntry::credit(
            document.document_no.clone(),
            document.document_date,
            credit_account.clone(),
            debit_account.clone(),
            amount.clone(),
        ));
    }

    Ok(entries)
}

fn counter_account(document: &Document, defaults: &DefaultAccounts) -> String {
    document.counter_account.clone().unwrap_or_else(|| {
        if document.kind == DocumentKind::Issue {
            defaults.expense.clone()
        } else {
            defaults.payables.clone()
        }
    })
}

fn no_account(document: &Document, index: usize, side: &str) -> PostingError {
    PostingError::Validation(format!(
        "Document {} line {}: no resolvable {} account",
        document.document_no, index, side
    ))
}
