//! In-process store with the same uniqueness rules as the database

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::PortfolioStore;
use crate::error::Error;
use crate::model::{Account, ContentRow, SectionKey, SettingPatch, SettingRow};
use crate::postgrest::Resolution;

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<String, Account>,
    content: BTreeMap<(String, SectionKey), ContentRow>,
    settings: BTreeMap<String, (u64, SettingRow)>,
    sequence: u64,
}

impl Tables {
    fn domain_owner(&self, domain: &str, except: &str) -> Option<&str> {
        self.settings
            .values()
            .map(|(_, row)| row)
            .find(|row| {
                row.account_id != except
                    && row
                        .domain
                        .as_deref()
                        .is_some_and(|d| d.eq_ignore_ascii_case(domain))
            })
            .map(|row| row.account_id.as_str())
    }

    fn check_domain(&self, domain: Option<&str>, account_id: &str) -> Result<(), Error> {
        match domain {
            Some(domain) if self.domain_owner(domain, account_id).is_some() => Err(Error::database(
                "duplicate key value violates unique constraint \"setting_domain_key\"",
            )),
            _ => Ok(()),
        }
    }
}

/// Store kept in memory; used for tests and local development
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        match self.tables.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        match self.tables.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Every content row, ordered by account and section
    pub fn all_content(&self) -> Vec<ContentRow> {
        self.read().content.values().cloned().collect()
    }

    /// Every setting row, in insertion order
    pub fn all_settings(&self) -> Vec<SettingRow> {
        let tables = self.read();
        let mut rows: Vec<_> = tables.settings.values().cloned().collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, row)| row).collect()
    }

    /// Insert a setting row bypassing the domain constraint, to model
    /// integrity violations that predate it
    pub fn force_setting(&self, setting: SettingRow) {
        let mut tables = self.write();
        tables.sequence += 1;
        let seq = tables.sequence;
        tables
            .settings
            .insert(setting.account_id.clone(), (seq, setting));
    }
}

#[async_trait]
impl PortfolioStore for MemoryStore {
    async fn account(&self, id: &str) -> Result<Option<Account>, Error> {
        Ok(self.read().accounts.get(id).cloned())
    }

    async fn accounts_by_email(&self, email: &str) -> Result<Vec<Account>, Error> {
        Ok(self
            .read()
            .accounts
            .values()
            .filter(|a| {
                a.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned()
            .collect())
    }

    async fn upsert_account(&self, account: &Account) -> Result<(), Error> {
        self.write()
            .accounts
            .insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn content(&self, account_id: &str) -> Result<Vec<ContentRow>, Error> {
        Ok(self
            .read()
            .content
            .values()
            .filter(|row| row.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn upsert_content(&self, rows: &[ContentRow], resolution: Resolution) -> Result<(), Error> {
        let mut tables = self.write();
        for row in rows {
            let key = (row.account_id.clone(), row.section);
            if resolution == Resolution::IgnoreDuplicates && tables.content.contains_key(&key) {
                continue;
            }
            tables.content.insert(key, row.clone());
        }
        Ok(())
    }

    async fn setting(&self, account_id: &str) -> Result<Option<SettingRow>, Error> {
        Ok(self
            .read()
            .settings
            .get(account_id)
            .map(|(_, row)| row.clone()))
    }

    async fn settings_by_domain(&self, domain: &str) -> Result<Vec<SettingRow>, Error> {
        let tables = self.read();
        let mut matches: Vec<_> = tables
            .settings
            .values()
            .filter(|(_, row)| {
                row.domain
                    .as_deref()
                    .is_some_and(|d| d.eq_ignore_ascii_case(domain))
            })
            .cloned()
            .collect();
        matches.sort_by_key(|(seq, _)| *seq);
        Ok(matches.into_iter().map(|(_, row)| row).collect())
    }

    async fn insert_setting(&self, setting: &SettingRow) -> Result<(), Error> {
        let mut tables = self.write();
        if tables.settings.contains_key(&setting.account_id) {
            return Ok(());
        }
        tables.check_domain(setting.domain.as_deref(), &setting.account_id)?;
        tables.sequence += 1;
        let seq = tables.sequence;
        tables
            .settings
            .insert(setting.account_id.clone(), (seq, setting.clone()));
        Ok(())
    }

    async fn update_setting(&self, account_id: &str, patch: &SettingPatch) -> Result<usize, Error> {
        let mut tables = self.write();
        if !tables.settings.contains_key(account_id) {
            return Ok(0);
        }
        tables.check_domain(Some(patch.domain.as_str()), account_id)?;
        if let Some((_, row)) = tables.settings.get_mut(account_id) {
            row.domain = Some(patch.domain.clone());
            row.billing_status = Some(patch.billing_status.clone());
            row.billing_type = Some(patch.billing_type.clone());
            row.is_public = patch.is_public;
            row.preferences = patch.preferences.clone();
        }
        Ok(1)
    }

    async fn purge_accounts(&self, ids: &[String]) -> Result<(), Error> {
        let mut tables = self.write();
        tables
            .content
            .retain(|(account_id, _), _| !ids.contains(account_id));
        tables.settings.retain(|account_id, _| !ids.contains(account_id));
        for id in ids {
            tables.accounts.remove(id);
        }
        Ok(())
    }
}
