//! Integration tests for posting-core

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use posting_core::{
    registry, BudgetPolicy, BudgetStatus, DocumentDraft, DocumentKind, DocumentStatus, LineItem,
    MemoryStore, OverspendMode, PayrollTotals, PostingEngine, PostingError,
};

async fn engine_with_chart() -> PostingEngine<MemoryStore> {
    let mut engine = PostingEngine::new(MemoryStore::new());
    registry::utils::create_standard_chart(engine.registry())
        .await
        .unwrap();
    engine
}

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap()
}

fn inventory_draft(kind: DocumentKind, qty: i64, unit_price: i64) -> DocumentDraft {
    DocumentDraft {
        kind,
        document_no: None,
        document_date: date(1, 15),
        fiscal_year: None,
        description: "Office supplies movement".to_string(),
        warehouse: Some("K01".to_string()),
        transfer_to: None,
        counter_account: Some("112".to_string()),
        payroll: None,
        lines: vec![LineItem::material(
            "VT001".to_string(),
            BigDecimal::from(qty),
            BigDecimal::from(unit_price),
        )],
        created_by: "ketoan1".to_string(),
    }
}

#[tokio::test]
async fn receipt_posts_card_and_balanced_entries() {
    let mut engine = engine_with_chart().await;

    let receipt = engine
        .create_document(inventory_draft(DocumentKind::Receipt, 100, 1000), DocumentStatus::Posted)
        .await
        .unwrap();

    let cards = engine.inventory_cards("VT001", 2026).await.unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].key.fund_source_id, "NSNN");
    assert_eq!(cards[0].receipts_qty, BigDecimal::from(100));
    assert_eq!(cards[0].closing_qty, BigDecimal::from(100));
    assert_eq!(cards[0].closing_amount, BigDecimal::from(100000));

    let entries = engine.ledger_entries(&receipt.document_no).await.unwrap();
    assert_eq!(entries.len(), 2);

    let debit = entries
        .iter()
        .find(|e| e.debit_amount > BigDecimal::from(0))
        .unwrap();
    assert_eq!(debit.account_code, "152");
    assert_eq!(debit.debit_amount, BigDecimal::from(100000));

    let credit = entries
        .iter()
        .find(|e| e.credit_amount > BigDecimal::from(0))
        .unwrap();
    assert_eq!(credit.account_code, "112");
    assert_eq!(credit.credit_amount, BigDecimal::from(100000));

    let debits: BigDecimal = entries.iter().map(|e| &e.debit_amount).sum();
    let credits: BigDecimal = entries.iter().map(|e| &e.credit_amount).sum();
    assert_eq!(debits, credits);
}

#[tokio::test]
async fn issue_draws_down_the_same_card() {
    let mut engine = engine_with_chart().await;
    engine
        .create_document(inventory_draft(DocumentKind::Receipt, 100, 1000), DocumentStatus::Posted)
        .await
        .unwrap();

    let mut issue_draft = inventory_draft(DocumentKind::Issue, 30, 1000);
    issue_draft.counter_account = None; // defaults to the expense account
    let issue = engine
        .create_document(issue_draft, DocumentStatus::Posted)
        .await
        .unwrap();

    let cards = engine.inventory_cards("VT001", 2026).await.unwrap();
    assert_eq!(cards[0].closing_qty, BigDecimal::from(70));
    assert_eq!(cards[0].closing_amount, BigDecimal::from(70000));
    assert_eq!(cards[0].issues_qty, BigDecimal::from(30));

    let entries = engine.ledger_entries(&issue.document_no).await.unwrap();
    let debit = entries
        .iter()
        .find(|e| e.debit_amount > BigDecimal::from(0))
        .unwrap();
    assert_eq!(debit.account_code, "611");
    assert_eq!(debit.debit_amount, BigDecimal::from(30000));
    let credit = entries
        .iter()
        .find(|e| e.credit_amount > BigDecimal::from(0))
        .unwrap();
    assert_eq!(credit.account_code, "152");
    assert_eq!(credit.credit_amount, BigDecimal::from(30000));
}

#[tokio::test]
async fn editing_a_posted_receipt_reverses_then_reposts() {
    let mut engine = engine_with_chart().await;
    let receipt = engine
        .create_document(inventory_draft(DocumentKind::Receipt, 100, 1000), DocumentStatus::Posted)
        .await
        .unwrap();
    engine
        .create_document(inventory_draft(DocumentKind::Issue, 30, 1000), DocumentStatus::Posted)
        .await
        .unwrap();

    // closing is 70 before the edit; shrinking the receipt to 80 lands at 50
    let edited = engine
        .update_document(
            receipt.id,
            inventory_draft(DocumentKind::Receipt, 80, 1000),
            DocumentStatus::Posted,
        )
        .await
        .unwrap();
    assert_eq!(edited.id, receipt.id);
    assert_eq!(edited.document_no, receipt.document_no);

    let cards = engine.inventory_cards("VT001", 2026).await.unwrap();
    assert_eq!(cards[0].closing_qty, BigDecimal::from(50));
    assert_eq!(cards[0].closing_amount, BigDecimal::from(50000));
    assert_eq!(cards[0].receipts_qty, BigDecimal::from(80));

    let entries = engine.ledger_entries(&receipt.document_no).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries
        .iter()
        .all(|e| e.debit_amount == BigDecimal::from(80000)
            || e.credit_amount == BigDecimal::from(80000)));
}

#[tokio::test]
async fn reposting_identical_content_is_a_no_op() {
    let mut engine = engine_with_chart().await;
    let receipt = engine
        .create_document(inventory_draft(DocumentKind::Receipt, 100, 1000), DocumentStatus::Posted)
        .await
        .unwrap();

    let cards_before = engine.inventory_cards("VT001", 2026).await.unwrap();
    let entries_before = engine.ledger_entries(&receipt.document_no).await.unwrap();

    engine
        .update_document(
            receipt.id,
            inventory_draft(DocumentKind::Receipt, 100, 1000),
            DocumentStatus::Posted,
        )
        .await
        .unwrap();

    let cards_after = engine.inventory_cards("VT001", 2026).await.unwrap();
    assert_eq!(cards_before, cards_after);

    // entry ids and posting timestamps are new; the numbers must not be
    let entries_after = engine.ledger_entries(&receipt.document_no).await.unwrap();
    assert_eq!(entries_before.len(), entries_after.len());
    let mut numeric_before: Vec<_> = entries_before
        .iter()
        .map(|e| (&e.account_code, &e.debit_amount, &e.credit_amount))
        .collect();
    let mut numeric_after: Vec<_> = entries_after
        .iter()
        .map(|e| (&e.account_code, &e.debit_amount, &e.credit_amount))
        .collect();
    numeric_before.sort();
    numeric_after.sort();
    assert_eq!(numeric_before, numeric_after);
}

#[tokio::test]
async fn transfer_moves_stock_without_ledger_entries() {
    let mut engine = engine_with_chart().await;
    engine
        .create_document(inventory_draft(DocumentKind::Receipt, 50, 2000), DocumentStatus::Posted)
        .await
        .unwrap();

    let mut transfer = inventory_draft(DocumentKind::Transfer, 20, 2000);
    transfer.transfer_to = Some("K02".to_string());
    transfer.counter_account = None;
    let transfer = engine
        .create_document(transfer, DocumentStatus::Posted)
        .await
        .unwrap();

    let cards = engine.inventory_cards("VT001", 2026).await.unwrap();
    assert_eq!(cards.len(), 2);
    let source = cards.iter().find(|c| c.key.warehouse == "K01").unwrap();
    let destination = cards.iter().find(|c| c.key.warehouse == "K02").unwrap();
    assert_eq!(source.closing_qty, BigDecimal::from(30));
    assert_eq!(destination.closing_qty, BigDecimal::from(20));
    assert_eq!(destination.closing_amount, BigDecimal::from(40000));

    assert!(engine
        .ledger_entries(&transfer.document_no)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn budget_consume_blocks_past_the_threshold() {
    let mut engine = engine_with_chart().await;
    let estimate = engine
        .budget()
        .create_estimate(
            2026,
            "622".to_string(),
            "6000".to_string(),
            BigDecimal::from(1_000_000),
        )
        .await
        .unwrap();
    engine.budget().approve(estimate.id).await.unwrap();

    let mut voucher = DocumentDraft {
        kind: DocumentKind::ExpenseVoucher,
        document_no: None,
        document_date: date(3, 1),
        fiscal_year: None,
        description: "Pay conference costs".to_string(),
        warehouse: None,
        transfer_to: None,
        counter_account: None,
        payroll: None,
        lines: vec![LineItem::financial(BigDecimal::from(1_000_000))],
        created_by: "ketoan1".to_string(),
    };
    voucher.lines[0].budget_estimate_id = Some(estimate.id);

    // exactly at the block threshold: succeeds with remaining = 0
    engine
        .create_document(voucher.clone(), DocumentStatus::Posted)
        .await
        .unwrap();
    let current = engine.budget_estimates(2026, "622").await.unwrap();
    assert_eq!(current[0].remaining_amount, BigDecimal::from(0));
    assert_eq!(current[0].status, BudgetStatus::Executing);

    // one more dong fails, naming the offending document, and leaves
    // nothing behind
    voucher.lines[0].amount = BigDecimal::from(1);
    let err = engine
        .create_document(voucher, DocumentStatus::Posted)
        .await
        .unwrap_err();
    match err {
        PostingError::BudgetExceeded { document_no, .. } => {
            assert_eq!(document_no.as_deref(), Some("PC-2026-0002"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let after = engine.budget_estimates(2026, "622").await.unwrap();
    assert_eq!(after[0].spent_amount, BigDecimal::from(1_000_000));
    assert_eq!(after[0].remaining_amount, BigDecimal::from(0));
}

#[tokio::test]
async fn deleting_a_posted_voucher_reverses_budget_consumption() {
    let mut engine = engine_with_chart().await;
    let estimate = engine
        .budget()
        .create_estimate(
            2026,
            "622".to_string(),
            "6100".to_string(),
            BigDecimal::from(500_000),
        )
        .await
        .unwrap();
    engine.budget().approve(estimate.id).await.unwrap();

    let mut voucher = DocumentDraft {
        kind: DocumentKind::ExpenseVoucher,
        document_no: None,
        document_date: date(4, 12),
        fiscal_year: None,
        description: "Utilities payment".to_string(),
        warehouse: None,
        transfer_to: None,
        counter_account: None,
        payroll: None,
        lines: vec![LineItem::financial(BigDecimal::from(200_000))],
        created_by: "ketoan1".to_string(),
    };
    voucher.lines[0].budget_estimate_id = Some(estimate.id);

    let posted = engine
        .create_document(voucher, DocumentStatus::Posted)
        .await
        .unwrap();
    let consumed = engine
        .budget()
        .get_estimate_required(estimate.id)
        .await
        .unwrap();
    assert_eq!(consumed.spent_amount, BigDecimal::from(200_000));

    engine.delete_document(posted.id).await.unwrap();

    let reverted = engine
        .budget()
        .get_estimate_required(estimate.id)
        .await
        .unwrap();
    assert_eq!(reverted.spent_amount, BigDecimal::from(0));
    assert_eq!(reverted.remaining_amount, BigDecimal::from(500_000));
    assert!(engine
        .ledger_entries(&posted.document_no)
        .await
        .unwrap()
        .is_empty());
    assert!(engine.get_document(posted.id).await.unwrap().is_none());
}

#[tokio::test]
async fn reversal_restores_an_active_reservation() {
    let mut engine = engine_with_chart().await;
    let estimate = engine
        .budget()
        .create_estimate(
            2026,
            "622".to_string(),
            "6300".to_string(),
            BigDecimal::from(500_000),
        )
        .await
        .unwrap();
    engine.budget().approve(estimate.id).await.unwrap();
    engine
        .budget()
        .reserve(estimate.id, BigDecimal::from(200_000))
        .await
        .unwrap();

    let mut voucher = DocumentDraft {
        kind: DocumentKind::ExpenseVoucher,
        document_no: None,
        document_date: date(7, 8),
        fiscal_year: None,
        description: "Training course fees".to_string(),
        warehouse: None,
        transfer_to: None,
        counter_account: None,
        payroll: None,
        lines: vec![LineItem::financial(BigDecimal::from(150_000))],
        created_by: "ketoan1".to_string(),
    };
    voucher.lines[0].budget_estimate_id = Some(estimate.id);

    let posted = engine
        .create_document(voucher.clone(), DocumentStatus::Posted)
        .await
        .unwrap();
    let during = engine
        .budget()
        .get_estimate_required(estimate.id)
        .await
        .unwrap();
    assert_eq!(during.spent_amount, BigDecimal::from(150_000));
    assert_eq!(during.committed_amount, BigDecimal::from(50_000));
    assert_eq!(during.remaining_amount, BigDecimal::from(300_000));

    // identical edit keeps the same spent/committed split
    engine
        .update_document(posted.id, voucher, DocumentStatus::Posted)
        .await
        .unwrap();
    let after_edit = engine
        .budget()
        .get_estimate_required(estimate.id)
        .await
        .unwrap();
    assert_eq!(after_edit.spent_amount, BigDecimal::from(150_000));
    assert_eq!(after_edit.committed_amount, BigDecimal::from(50_000));

    // delete puts the matched reservation back in committed
    engine.delete_document(posted.id).await.unwrap();
    let reverted = engine
        .budget()
        .get_estimate_required(estimate.id)
        .await
        .unwrap();
    assert_eq!(reverted.spent_amount, BigDecimal::from(0));
    assert_eq!(reverted.committed_amount, BigDecimal::from(200_000));
    assert_eq!(reverted.remaining_amount, BigDecimal::from(300_000));
}

#[tokio::test]
async fn override_policy_allows_authorized_overspend() {
    let store = MemoryStore::new();
    let policy = BudgetPolicy {
        overspend: OverspendMode::RequireOverride,
        ..BudgetPolicy::default()
    };
    let mut engine =
        PostingEngine::with_config(store, posting_core::DefaultAccounts::default(), policy);
    registry::utils::create_standard_chart(engine.registry())
        .await
        .unwrap();

    let estimate = engine
        .budget()
        .create_estimate(
            2026,
            "622".to_string(),
            "6200".to_string(),
            BigDecimal::from(100_000),
        )
        .await
        .unwrap();
    engine.budget().approve(estimate.id).await.unwrap();

    let mut voucher = DocumentDraft {
        kind: DocumentKind::ExpenseVoucher,
        document_no: None,
        document_date: date(5, 20),
        fiscal_year: None,
        description: "Emergency repair".to_string(),
        warehouse: None,
        transfer_to: None,
        counter_account: None,
        payroll: None,
        lines: vec![LineItem::financial(BigDecimal::from(150_000))],
        created_by: "ketoan2".to_string(),
    };
    voucher.lines[0].budget_estimate_id = Some(estimate.id);

    // without an override reference the posting is rejected in full
    let err = engine
        .create_document(voucher.clone(), DocumentStatus::Posted)
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::BudgetExceeded { .. }));

    voucher.lines[0].budget_override_ref = Some("QD-2026-31".to_string());
    engine
        .create_document(voucher, DocumentStatus::Posted)
        .await
        .unwrap();

    let after = engine
        .budget()
        .get_estimate_required(estimate.id)
        .await
        .unwrap();
    assert_eq!(after.spent_amount, BigDecimal::from(150_000));
    assert_eq!(after.remaining_amount, BigDecimal::from(-50_000));
}

#[tokio::test]
async fn failed_edit_restores_the_original_posting() {
    let mut engine = engine_with_chart().await;
    let receipt = engine
        .create_document(inventory_draft(DocumentKind::Receipt, 100, 1000), DocumentStatus::Posted)
        .await
        .unwrap();

    // edit that fails at the ledger step: unknown counter account
    let mut bad_edit = inventory_draft(DocumentKind::Receipt, 80, 1000);
    bad_edit.counter_account = Some("999".to_string());
    let err = engine
        .update_document(receipt.id, bad_edit, DocumentStatus::Posted)
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::AccountNotFound(_)));

    // the original posting is fully intact: no partial reversal observable
    let cards = engine.inventory_cards("VT001", 2026).await.unwrap();
    assert_eq!(cards[0].closing_qty, BigDecimal::from(100));
    let entries = engine.ledger_entries(&receipt.document_no).await.unwrap();
    assert_eq!(entries.len(), 2);
    let stored = engine.get_document(receipt.id).await.unwrap().unwrap();
    assert_eq!(stored.total_amount, BigDecimal::from(100000));
    assert_eq!(stored.status, DocumentStatus::Posted);
}

#[tokio::test]
async fn payroll_posts_fixed_legs_from_totals() {
    let mut engine = engine_with_chart().await;

    let payroll = DocumentDraft {
        kind: DocumentKind::Payroll,
        document_no: None,
        document_date: date(6, 30),
        fiscal_year: None,
        description: "June payroll".to_string(),
        warehouse: None,
        transfer_to: None,
        counter_account: None,
        payroll: Some(PayrollTotals {
            salary: BigDecimal::from(50_000_000),
            employer_insurance: BigDecimal::from(10_500_000),
            employee_insurance: BigDecimal::from(5_250_000),
            tax: BigDecimal::from(1_200_000),
        }),
        lines: vec![],
        created_by: "nhansu1".to_string(),
    };

    let posted = engine
        .create_document(payroll, DocumentStatus::Posted)
        .await
        .unwrap();
    assert_eq!(posted.document_no, "BL-2026-0001");
    assert_eq!(posted.total_amount, BigDecimal::from(60_500_000));

    let entries = engine.ledger_entries(&posted.document_no).await.unwrap();
    assert_eq!(entries.len(), 8);
    let debits: BigDecimal = entries.iter().map(|e| &e.debit_amount).sum();
    let credits: BigDecimal = entries.iter().map(|e| &e.credit_amount).sum();
    assert_eq!(debits, credits);

    // withheld amounts land on the payable accounts
    let tax_credit: BigDecimal = entries
        .iter()
        .filter(|e| e.account_code == "333")
        .map(|e| &e.credit_amount)
        .sum();
    assert_eq!(tax_credit, BigDecimal::from(1_200_000));
}

#[tokio::test]
async fn separate_fund_sources_keep_separate_cards() {
    let mut engine = engine_with_chart().await;

    let mut aid_receipt = inventory_draft(DocumentKind::Receipt, 40, 1000);
    aid_receipt.lines[0].fund_source_id = Some("VIEN_TRO".to_string());
    engine
        .create_document(aid_receipt, DocumentStatus::Posted)
        .await
        .unwrap();
    engine
        .create_document(inventory_draft(DocumentKind::Receipt, 60, 1000), DocumentStatus::Posted)
        .await
        .unwrap();

    // an issue without a fund source draws from the state-budget card
    engine
        .create_document(inventory_draft(DocumentKind::Issue, 10, 1000), DocumentStatus::Posted)
        .await
        .unwrap();

    let cards = engine.inventory_cards("VT001", 2026).await.unwrap();
    assert_eq!(cards.len(), 2);
    let state = cards.iter().find(|c| c.key.fund_source_id == "NSNN").unwrap();
    let aid = cards
        .iter()
        .find(|c| c.key.fund_source_id == "VIEN_TRO")
        .unwrap();
    assert_eq!(state.closing_qty, BigDecimal::from(50));
    assert_eq!(aid.closing_qty, BigDecimal::from(40));
}
