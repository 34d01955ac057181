//! Store backed by the Supabase REST API

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::PortfolioStore;
use crate::error::Error;
use crate::model::{Account, ContentRow, SettingPatch, SettingRow};
use crate::postgrest::{PostgrestClient, Resolution};

const ACCOUNT: &str = "account";
const CONTENT: &str = "content";
const SETTING: &str = "setting";
const PURGE_ACCOUNTS: &str = "rpc/purge_accounts";

/// [`PortfolioStore`] over PostgREST, acting as the holder of `token`
/// (or the anon role when there is none)
#[derive(Clone)]
pub struct RestStore {
    url: String,
    key: String,
    token: Option<String>,
    client: Client,
}

impl RestStore {
    pub fn new(url: &str, key: &str, client: Client) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            token: None,
            client,
        }
    }

    /// Act as the user holding `token`
    pub fn with_auth(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    fn from(&self, table: &str) -> PostgrestClient {
        let client = PostgrestClient::new(&self.url, &self.key, table, self.client.clone());
        match &self.token {
            Some(token) => client.with_auth(token),
            None => client,
        }
    }
}

/// `ilike` treats `%`, `_` and `\` as pattern characters
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\' | '*') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl PortfolioStore for RestStore {
    async fn account(&self, id: &str) -> Result<Option<Account>, Error> {
        self.from(ACCOUNT)
            .select("id,email,full_name,avatar_url")
            .eq("id", id)
            .execute_one::<Account>()
            .await
    }

    async fn accounts_by_email(&self, email: &str) -> Result<Vec<Account>, Error> {
        self.from(ACCOUNT)
            .select("id,email,full_name,avatar_url")
            .ilike("email", &escape_like(email))
            .execute::<Account>()
            .await
    }

    async fn upsert_account(&self, account: &Account) -> Result<(), Error> {
        self.from(ACCOUNT)
            .upsert(account)
            .on_conflict("id")
            .execute_no_return()
            .await
    }

    async fn content(&self, account_id: &str) -> Result<Vec<ContentRow>, Error> {
        self.from(CONTENT)
            .select("account_id,section,data")
            .eq("account_id", account_id)
            .execute::<ContentRow>()
            .await
    }

    async fn upsert_content(&self, rows: &[ContentRow], resolution: Resolution) -> Result<(), Error> {
        if rows.is_empty() {
            return Ok(());
        }
        self.from(CONTENT)
            .upsert(rows)
            .on_conflict("account_id,section")
            .resolution(resolution)
            .execute_no_return()
            .await
    }

    async fn setting(&self, account_id: &str) -> Result<Option<SettingRow>, Error> {
        self.from(SETTING)
            .select("*")
            .eq("account_id", account_id)
            .execute_one::<SettingRow>()
            .await
    }

    async fn settings_by_domain(&self, domain: &str) -> Result<Vec<SettingRow>, Error> {
        self.from(SETTING)
            .select("*")
            .ilike("domain", &escape_like(domain))
            .order("created_at", true)
            .order("account_id", true)
            .execute::<SettingRow>()
            .await
    }

    async fn insert_setting(&self, setting: &SettingRow) -> Result<(), Error> {
        self.from(SETTING)
            .upsert(setting)
            .on_conflict("account_id")
            .resolution(Resolution::IgnoreDuplicates)
            .execute_no_return()
            .await
    }

    async fn update_setting(&self, account_id: &str, patch: &SettingPatch) -> Result<usize, Error> {
        let rows = self
            .from(SETTING)
            .update(patch)
            .eq("account_id", account_id)
            .execute::<serde_json::Value>()
            .await?;
        Ok(rows.len())
    }

    /// One call to the `purge_accounts` database function, which deletes the
    /// content, setting and account rows inside the request's transaction
    async fn purge_accounts(&self, ids: &[String]) -> Result<(), Error> {
        if ids.is_empty() {
            return Ok(());
        }
        self.from(PURGE_ACCOUNTS)
            .rpc(json!({ "account_ids": ids }))
            .execute_no_return()
            .await
    }
}
