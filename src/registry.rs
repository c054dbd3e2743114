//! Chart-of-accounts registry and default account resolution

use std::collections::HashMap;

use crate::traits::PostingStore;
use crate::types::*;
use crate::utils::validation::validate_account_code;

/// Category-default account codes used when a line carries no explicit account
///
/// Defaults follow the HCSN chart: cash 111, materials 152, payables 331,
/// insurance payable 332, tax payable 333, salary payable 334, revenue 511,
/// operating expense 611.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultAccounts {
    pub cash: String,
    pub materials: String,
    pub payables: String,
    pub insurance_payable: String,
    pub tax_payable: String,
    pub salary_payable: String,
    pub revenue: String,
    pub expense: String,
}

impl Default for DefaultAccounts {
    fn default() -> Self {
        Self {
            cash: "111".to_string(),
            materials: "152".to_string(),
            payables: "331".to_string(),
            insurance_payable: "332".to_string(),
            tax_payable: "333".to_string(),
            salary_payable: "334".to_string(),
            revenue: "511".to_string(),
            expense: "611".to_string(),
        }
    }
}

/// Account registry managing the chart of accounts
pub struct AccountRegistry<S: PostingStore> {
    pub(crate) storage: S,
}

impl<S: PostingStore> AccountRegistry<S> {
    /// Create a new registry over the given storage
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Create a new account
    pub async fn create_account(&mut self, account: Account) -> PostingResult<Account> {
        validate_account_code(&account.code)?;

        if account.name.trim().is_empty() {
            return Err(PostingError::Validation(
                "Account name cannot be empty".to_string(),
            ));
        }

        if self.storage.get_account(&account.code).await?.is_some() {
            return Err(PostingError::Validation(format!(
                "Account with code '{}' already exists",
                account.code
            )));
        }

        if let Some(ref parent_code) = account.parent_code {
            if self.storage.get_account(parent_code).await?.is_none() {
                return Err(PostingError::Validation(format!(
                    "Parent account '{}' does not exist",
                    parent_code
                )));
            }
        }

        self.storage.save_account(&account).await?;
        Ok(account)
    }

    /// Get an account by code
    pub async fn get_account(&self, code: &str) -> PostingResult<Option<Account>> {
        self.storage.get_account(code).await
    }

    /// Get an account by code, returning an error if not found
    pub async fn get_account_required(&self, code: &str) -> PostingResult<Account> {
        self.storage
            .get_account(code)
            .await?
            .ok_or_else(|| PostingError::AccountNotFound(code.to_string()))
    }

    /// Validate that an account exists and may receive postings
    ///
    /// Every account referenced by a ledger entry must pass this check:
    /// the code must exist and must not be an aggregate roll-up node.
    pub async fn ensure_postable(&self, code: &str) -> PostingResult<()> {
        let account = self.get_account_required(code).await?;
        if account.is_aggregate {
            return Err(PostingError::AccountNotFound(format!(
                "{} is an aggregate account and cannot receive postings",
                code
            )));
        }
        Ok(())
    }

    /// List all accounts ordered by code
    pub async fn list_accounts(&self) -> PostingResult<Vec<Account>> {
        self.storage.list_accounts().await
    }

    /// All direct children of a parent account
    pub async fn children_of(&self, parent_code: &str) -> PostingResult<Vec<Account>> {
        let accounts = self.storage.list_accounts().await?;
        Ok(accounts
            .into_iter()
            .filter(|a| a.parent_code.as_deref() == Some(parent_code))
            .collect())
    }
}

/// Utility functions for seeding the chart of accounts
pub mod utils {
    use super::*;

    /// Create a minimal HCSN chart of accounts
    ///
    /// Includes aggregate roll-up nodes (class 15 inventories) so the
    /// postable-leaf invariant is exercised by real data.
    pub async fn create_standard_chart<S: PostingStore>(
        registry: &mut AccountRegistry<S>,
    ) -> PostingResult<HashMap<String, Account>> {
        let mut accounts = HashMap::new();

        let cash = registry
            .create_account(Account::new(
                "111".to_string(),
                "Cash on hand".to_string(),
                AccountType::Asset,
                None,
            ))
            .await?;
        accounts.insert("cash".to_string(), cash);

        let bank = registry
            .create_account(Account::new(
                "112".to_string(),
                "Bank deposits".to_string(),
                AccountType::Asset,
                None,
            ))
            .await?;
        accounts.insert("bank".to_string(), bank);

        let inventories = registry
            .create_account(Account::aggregate(
                "15".to_string(),
                "Inventories".to_string(),
                AccountType::Asset,
                None,
            ))
            .await?;
        accounts.insert("inventories".to_string(), inventories);

        let materials = registry
            .create_account(Account::new(
                "152".to_string(),
                "Raw materials".to_string(),
                AccountType::Asset,
                Some("15".to_string()),
            ))
            .await?;
        accounts.insert("materials".to_string(), materials);

        let tools = registry
            .create_account(Account::new(
                "153".to_string(),
                "Tools and supplies".to_string(),
                AccountType::Asset,
                Some("15".to_string()),
            ))
            .await?;
        accounts.insert("tools".to_string(), tools);

        let fixed_assets = registry
            .create_account(Account::new(
                "211".to_string(),
                "Tangible fixed assets".to_string(),
                AccountType::Asset,
                None,
            ))
            .await?;
        accounts.insert("fixed_assets".to_string(), fixed_assets);

        let payables = registry
            .create_account(Account::new(
                "331".to_string(),
                "Payables to suppliers".to_string(),
                AccountType::Liability,
                None,
            ))
            .await?;
        accounts.insert("payables".to_string(), payables);

        let insurance_payable = registry
            .create_account(Account::new(
                "332".to_string(),
                "Insurance and union dues payable".to_string(),
                AccountType::Liability,
                None,
            ))
            .await?;
        accounts.insert("insurance_payable".to_string(), insurance_payable);

        let tax_payable = registry
            .create_account(Account::new(
                "333".to_string(),
                "Taxes payable to the state".to_string(),
                AccountType::Liability,
                None,
            ))
            .await?;
        accounts.insert("tax_payable".to_string(), tax_payable);

        let salary_payable = registry
            .create_account(Account::new(
                "334".to_string(),
                "Payables to employees".to_string(),
                AccountType::Liability,
                None,
            ))
            .await?;
        accounts.insert("salary_payable".to_string(), salary_payable);

        let revenue = registry
            .create_account(Account::new(
                "511".to_string(),
                "Operating revenue".to_string(),
                AccountType::Revenue,
                None,
            ))
            .await?;
        accounts.insert("revenue".to_string(), revenue);

        let expense = registry
            .create_account(Account::new(
                "611".to_string(),
                "Operating expenses".to_string(),
                AccountType::Expense,
                None,
            ))
            .await?;
        accounts.insert("expense".to_string(), expense);

        Ok(accounts)
    }
}
