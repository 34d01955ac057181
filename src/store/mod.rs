//! Access to the `account`, `content` and `setting` tables

mod memory;
mod rest;

use async_trait::async_trait;

use crate::error::Error;
use crate::model::{Account, ContentRow, SettingPatch, SettingRow};
use crate::postgrest::Resolution;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Read/upsert/delete operations the portfolio needs from the relational store
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// Point lookup of an account
    async fn account(&self, id: &str) -> Result<Option<Account>, Error>;

    /// Accounts registered with `email`, compared case-insensitively
    async fn accounts_by_email(&self, email: &str) -> Result<Vec<Account>, Error>;

    /// Insert or overwrite an account by id
    async fn upsert_account(&self, account: &Account) -> Result<(), Error>;

    /// Every content row of an account
    async fn content(&self, account_id: &str) -> Result<Vec<ContentRow>, Error>;

    /// Upsert content rows on `(account_id, section)`
    async fn upsert_content(&self, rows: &[ContentRow], resolution: Resolution) -> Result<(), Error>;

    async fn setting(&self, account_id: &str) -> Result<Option<SettingRow>, Error>;

    /// Settings whose domain equals `domain` ignoring case, earliest created first
    async fn settings_by_domain(&self, domain: &str) -> Result<Vec<SettingRow>, Error>;

    /// Insert a setting row unless the account already has one
    async fn insert_setting(&self, setting: &SettingRow) -> Result<(), Error>;

    /// Update the account's setting row; returns the number of rows matched
    async fn update_setting(&self, account_id: &str, patch: &SettingPatch) -> Result<usize, Error>;

    /// Delete accounts together with their content and setting rows.
    ///
    /// All or nothing: on error no row of any listed account is gone.
    async fn purge_accounts(&self, ids: &[String]) -> Result<(), Error>;
}
