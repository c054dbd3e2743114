//! Core types and data structures for the posting engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account types following standard accounting principles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Assets - cash, inventory, fixed assets, receivables
    Asset,
    /// Liabilities - payables, insurance and tax obligations
    Liability,
    /// Equity - funds and accumulated surplus
    Equity,
    /// Revenue - fee income, budget allocations received
    Revenue,
    /// Expenses - operating costs charged against budget
    Expense,
}

/// Chart-of-accounts node
///
/// Accounts form a tree via `parent_code`. Aggregate accounts exist only for
/// roll-up reporting and can never be the target of a ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account code, the unique key (e.g. "152")
    pub code: String,
    /// Human-readable account name
    pub name: String,
    /// Type of account (Asset, Liability, etc.)
    pub account_type: AccountType,
    /// Optional parent code for hierarchical chart of accounts
    pub parent_code: Option<String>,
    /// Aggregate nodes cannot receive postings directly
    pub is_aggregate: bool,
    /// When the account was created
    pub created_at: NaiveDateTime,
    /// When the account was last updated
    pub updated_at: NaiveDateTime,
}

impl Account {
    /// Create a new postable (leaf) account
    pub fn new(
        code: String,
        name: String,
        account_type: AccountType,
        parent_code: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            code,
            name,
            account_type,
            parent_code,
            is_aggregate: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new aggregate (roll-up only) account
    pub fn aggregate(
        code: String,
        name: String,
        account_type: AccountType,
        parent_code: Option<String>,
    ) -> Self {
        let mut account = Self::new(code, name, account_type, parent_code);
        account.is_aggregate = true;
        account
    }
}

/// Kinds of source documents the engine can post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// Goods receipt into a warehouse
    Receipt,
    /// Goods issue out of a warehouse
    Issue,
    /// Warehouse-to-warehouse transfer, inventory only
    Transfer,
    /// General accounting voucher with explicit debit/credit lines
    Voucher,
    /// Cash/revenue receipt
    RevenueReceipt,
    /// Cash/expense payment voucher
    ExpenseVoucher,
    /// Payroll run posted from aggregate totals
    Payroll,
}

impl DocumentKind {
    /// Document-number prefix used by auto-numbering
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Receipt => "PNK",
            DocumentKind::Issue => "PXK",
            DocumentKind::Transfer => "PCK",
            DocumentKind::Voucher => "PKT",
            DocumentKind::RevenueReceipt => "PT",
            DocumentKind::ExpenseVoucher => "PC",
            DocumentKind::Payroll => "BL",
        }
    }

    /// Whether documents of this kind move warehouse stock
    pub fn is_inventory(&self) -> bool {
        matches!(
            self,
            DocumentKind::Receipt | DocumentKind::Issue | DocumentKind::Transfer
        )
    }
}

/// Lifecycle status of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    /// Stored but without any ledger/inventory/budget effect
    Draft,
    /// Posted; derived state reflects this document
    Posted,
}

/// Direction of an inventory movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementDirection {
    /// Adds to the receipts accumulators
    Receipt,
    /// Adds to the issues accumulators
    Issue,
}

/// Aggregate payroll totals for a payroll document
///
/// A payroll run is posted from these four totals rather than per-employee
/// lines; zero legs are skipped at entry generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollTotals {
    /// Gross salary expense
    pub salary: BigDecimal,
    /// Employer-side insurance contribution
    pub employer_insurance: BigDecimal,
    /// Employee-side insurance withheld from salary
    pub employee_insurance: BigDecimal,
    /// Personal income tax withheld from salary
    pub tax: BigDecimal,
}

impl PayrollTotals {
    /// Total amount charged by the payroll run
    pub fn total(&self) -> BigDecimal {
        &self.salary + &self.employer_insurance
    }
}

/// Line item belonging to a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Material reference for inventory lines, None for financial-only lines
    pub material_id: Option<String>,
    /// Quantity, None for pure financial lines
    pub quantity: Option<BigDecimal>,
    /// Unit price, required when quantity is present
    pub unit_price: Option<BigDecimal>,
    /// Line amount; equals round(quantity x unit_price) when quantity is present
    pub amount: BigDecimal,
    /// Explicit debit-side account, else resolved from kind defaults
    pub debit_account: Option<String>,
    /// Explicit credit-side account, else resolved from kind defaults
    pub credit_account: Option<String>,
    /// Funding channel the stock/spend is tracked against
    pub fund_source_id: Option<String>,
    /// Department dimension tag
    pub department: Option<String>,
    /// Project dimension tag
    pub project: Option<String>,
    /// Budget estimate consumed by this line when posted
    pub budget_estimate_id: Option<Uuid>,
    /// Reference to an overspend authorization, required by the override policy
    pub budget_override_ref: Option<String>,
}

impl LineItem {
    /// Create a financial-only line (no quantity)
    pub fn financial(amount: BigDecimal) -> Self {
        Self {
            material_id: None,
            quantity: None,
            unit_price: None,
            amount,
            debit_account: None,
            credit_account: None,
            fund_source_id: None,
            department: None,
            project: None,
            budget_estimate_id: None,
            budget_override_ref: None,
        }
    }

    /// Create an inventory line for a material with quantity and unit price
    pub fn material(material_id: String, quantity: BigDecimal, unit_price: BigDecimal) -> Self {
        let amount = crate::utils::validation::round_amount(&(&quantity * &unit_price));
        Self {
            material_id: Some(material_id),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
            amount,
            debit_account: None,
            credit_account: None,
            fund_source_id: None,
            department: None,
            project: None,
            budget_estimate_id: None,
            budget_override_ref: None,
        }
    }
}

/// Header fields and lines submitted to create or update a document
///
/// `id`, `document_no` (when absent), `fiscal_year` (when absent) and
/// `total_amount` are assigned by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDraft {
    /// Kind of document being recorded
    pub kind: DocumentKind,
    /// Explicit document number; auto-assigned when None
    pub document_no: Option<String>,
    /// Business date of the document
    pub document_date: NaiveDate,
    /// Accounting year; derived from the date when None
    pub fiscal_year: Option<i32>,
    /// Description of the business event
    pub description: String,
    /// Source warehouse for inventory documents
    pub warehouse: Option<String>,
    /// Destination warehouse, transfers only
    pub transfer_to: Option<String>,
    /// Counter (cash/payment) account for the aggregate entry side
    pub counter_account: Option<String>,
    /// Aggregate totals, payroll documents only
    pub payroll: Option<PayrollTotals>,
    /// Line items
    pub lines: Vec<LineItem>,
    /// User recording the document
    pub created_by: String,
}

/// Persisted source document with its line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Opaque, immutable identifier
    pub id: Uuid,
    /// Human-facing number, unique within kind + fiscal year
    pub document_no: String,
    /// Kind of document
    pub kind: DocumentKind,
    /// Business date
    pub document_date: NaiveDate,
    /// Accounting year the document belongs to
    pub fiscal_year: i32,
    /// Draft or Posted
    pub status: DocumentStatus,
    /// Description of the business event
    pub description: String,
    /// Source warehouse for inventory documents
    pub warehouse: Option<String>,
    /// Destination warehouse, transfers only
    pub transfer_to: Option<String>,
    /// Counter account for the aggregate entry side
    pub counter_account: Option<String>,
    /// Aggregate totals, payroll documents only
    pub payroll: Option<PayrollTotals>,
    /// Owned line items (cascade with the document)
    pub lines: Vec<LineItem>,
    /// Sum of line amounts (payroll: salary + employer insurance)
    pub total_amount: BigDecimal,
    /// User who recorded the document
    pub created_by: String,
    /// When the document was created
    pub created_at: NaiveDateTime,
    /// When the document was last updated
    pub updated_at: NaiveDateTime,
}

/// Composite key of an inventory card
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardKey {
    /// Material the card tracks
    pub material_id: String,
    /// Funding channel; unspecified sources normalize to the state-budget sentinel
    pub fund_source_id: String,
    /// Accounting year
    pub fiscal_year: i32,
    /// Warehouse location
    pub warehouse: String,
}

/// Running balance card for one (material, fund source, year, warehouse)
///
/// Closing figures are always `opening + receipts - issues`. Accumulators are
/// signed and commutative, so reversal is applying the negated delta in the
/// original direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryCard {
    /// Composite key of the card
    pub key: CardKey,
    pub opening_qty: BigDecimal,
    pub opening_amount: BigDecimal,
    pub receipts_qty: BigDecimal,
    pub receipts_amount: BigDecimal,
    pub issues_qty: BigDecimal,
    pub issues_amount: BigDecimal,
    pub closing_qty: BigDecimal,
    pub closing_amount: BigDecimal,
}

impl InventoryCard {
    /// Create a card with zero opening balances
    pub fn new(key: CardKey) -> Self {
        let zero = BigDecimal::from(0);
        Self {
            key,
            opening_qty: zero.clone(),
            opening_amount: zero.clone(),
            receipts_qty: zero.clone(),
            receipts_amount: zero.clone(),
            issues_qty: zero.clone(),
            issues_amount: zero.clone(),
            closing_qty: zero.clone(),
            closing_amount: zero,
        }
    }

    /// Apply a signed movement delta to the card accumulators
    pub fn apply(&mut self, delta: &CardDelta) {
        match delta.direction {
            MovementDirection::Receipt => {
                self.receipts_qty += &delta.qty_delta;
                self.receipts_amount += &delta.amount_delta;
                self.closing_qty += &delta.qty_delta;
                self.closing_amount += &delta.amount_delta;
            }
            MovementDirection::Issue => {
                self.issues_qty += &delta.qty_delta;
                self.issues_amount += &delta.amount_delta;
                self.closing_qty -= &delta.qty_delta;
                self.closing_amount -= &delta.amount_delta;
            }
        }
    }
}

/// Signed movement delta applied atomically to one inventory card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDelta {
    /// Which accumulator pair receives the delta
    pub direction: MovementDirection,
    pub qty_delta: BigDecimal,
    pub amount_delta: BigDecimal,
}

impl CardDelta {
    /// Exact negation of this delta, same direction
    pub fn negated(&self) -> Self {
        Self {
            direction: self.direction,
            qty_delta: -&self.qty_delta,
            amount_delta: -&self.amount_delta,
        }
    }
}

/// Single general-ledger entry; exactly one of debit/credit is nonzero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry identifier
    pub id: Uuid,
    /// Origin document number
    pub document_no: String,
    /// Business date of the origin document
    pub trx_date: NaiveDate,
    /// When the entry was written
    pub posted_at: NaiveDateTime,
    /// Account the entry posts to (always a postable leaf)
    pub account_code: String,
    /// The other side of the movement, for cash-flow classification
    pub reciprocal_account: String,
    pub debit_amount: BigDecimal,
    pub credit_amount: BigDecimal,
}

impl LedgerEntry {
    /// Create a debit entry
    pub fn debit(
        document_no: String,
        trx_date: NaiveDate,
        account_code: String,
        reciprocal_account: String,
        amount: BigDecimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_no,
            trx_date,
            posted_at: chrono::Utc::now().naive_utc(),
            account_code,
            reciprocal_account,
            debit_amount: amount,
            credit_amount: BigDecimal::from(0),
        }
    }

    /// Create a credit entry
    pub fn credit(
        document_no: String,
        trx_date: NaiveDate,
        account_code: String,
        reciprocal_account: String,
        amount: BigDecimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_no,
            trx_date,
            posted_at: chrono::Utc::now().naive_utc(),
            account_code,
            reciprocal_account,
            debit_amount: BigDecimal::from(0),
            credit_amount: amount,
        }
    }
}

/// Lifecycle status of a budget estimate version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BudgetStatus {
    /// Created or adjusted, pending approval
    Draft,
    /// Approved for execution
    Approved,
    /// Actively being consumed
    Executing,
    /// Closed; no further consumption
    Closed,
}

/// Identity of a budget line across versions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EstimateKey {
    /// Accounting year
    pub fiscal_year: i32,
    /// Chapter/department code
    pub chapter_code: String,
    /// Budget item code
    pub item_code: String,
}

/// One version of a budget estimate
///
/// Allocation changes never mutate a row in place; `adjust` appends a new
/// version linked through `parent_id`. Only spent/committed/remaining mutate
/// on the current version. `remaining_amount` is a derived cache, kept in
/// sync transactionally by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetEstimate {
    /// Version row identifier
    pub id: Uuid,
    /// Accounting year
    pub fiscal_year: i32,
    /// Chapter/department code
    pub chapter_code: String,
    /// Budget item code
    pub item_code: String,
    /// Monotonic version, starting at 1
    pub version: u32,
    /// Prior version in the adjustment chain
    pub parent_id: Option<Uuid>,
    pub allocated_amount: BigDecimal,
    pub spent_amount: BigDecimal,
    pub committed_amount: BigDecimal,
    /// allocated - spent - committed
    pub remaining_amount: BigDecimal,
    pub status: BudgetStatus,
    /// Reason recorded when this version was created by an adjustment
    pub adjustment_reason: Option<String>,
}

impl BudgetEstimate {
    /// Create version 1 of a budget line
    pub fn new(
        fiscal_year: i32,
        chapter_code: String,
        item_code: String,
        allocated_amount: BigDecimal,
    ) -> Self {
        let zero = BigDecimal::from(0);
        Self {
            id: Uuid::new_v4(),
            fiscal_year,
            chapter_code,
            item_code,
            version: 1,
            parent_id: None,
            remaining_amount: allocated_amount.clone(),
            allocated_amount,
            spent_amount: zero.clone(),
            committed_amount: zero,
            status: BudgetStatus::Draft,
            adjustment_reason: None,
        }
    }

    /// Identity shared by every version of this line
    pub fn key(&self) -> EstimateKey {
        EstimateKey {
            fiscal_year: self.fiscal_year,
            chapter_code: self.chapter_code.clone(),
            item_code: self.item_code.clone(),
        }
    }

    /// Recompute the derived remaining amount
    pub fn recompute_remaining(&mut self) {
        self.remaining_amount =
            &self.allocated_amount - &self.spent_amount - &self.committed_amount;
    }
}

/// Signed spent/committed delta applied atomically to one estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateDelta {
    pub spent_delta: BigDecimal,
    pub committed_delta: BigDecimal,
}

impl EstimateDelta {
    /// Exact negation of this delta
    pub fn negated(&self) -> Self {
        Self {
            spent_delta: -&self.spent_delta,
            committed_delta: -&self.committed_delta,
        }
    }
}

/// Record of one document's consumption against an estimate version
///
/// Written at posting time with the matched reservation amount, so reversal
/// restores the exact spent/committed split instead of recomputing it from
/// current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConsumption {
    pub id: Uuid,
    /// Document the consumption was posted from
    pub document_no: String,
    /// Estimate version consumed
    pub estimate_id: Uuid,
    /// Amount added to spent
    pub amount: BigDecimal,
    /// Portion drawn from an existing reservation (subtracted from committed)
    pub matched_committed: BigDecimal,
}

/// Record of an authorized overspend under the override policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideAuthorization {
    pub id: Uuid,
    /// Estimate version the overspend was allowed against
    pub estimate_id: Uuid,
    /// External approval reference supplied with the consume
    pub reference: String,
    /// Amount consumed past the block threshold
    pub amount: BigDecimal,
    pub authorized_by: String,
    pub authorized_at: NaiveDateTime,
}

/// Errors that can occur in the posting system
#[derive(Debug, thiserror::Error)]
pub enum PostingError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Account not found or not postable: {0}")]
    AccountNotFound(String),
    #[error("Document not found: {0}")]
    DocumentNotFound(String),
    #[error("Budget estimate not found: {0}")]
    EstimateNotFound(String),
    #[error("Ledger imbalance on document {document_no}: debits = {debits}, credits = {credits}")]
    Imbalance {
        document_no: String,
        debits: BigDecimal,
        credits: BigDecimal,
    },
    #[error(
        "Budget exceeded on estimate {estimate_id}: requested {requested}, remaining {remaining}{}",
        .document_no.as_deref().map(|no| format!(" (document {no})")).unwrap_or_default()
    )]
    BudgetExceeded {
        estimate_id: Uuid,
        requested: BigDecimal,
        remaining: BigDecimal,
        /// Originating document, when the consume came from a posting
        document_no: Option<String>,
    },
    #[error("Concurrent modification detected: {0}")]
    ConcurrencyConflict(String),
}

/// Result type for posting operations
pub type PostingResult<T> = Result<T, PostingError>;
