//! First-login provisioning of an account's rows
//!
//! Runs after every successful sign-in and only ever fills gaps: existing
//! content and settings are left alone, so a second run is a no-op.

use serde_json::json;

use crate::error::Error;
use crate::mapper::{derive_domain, slugify};
use crate::model::{Account, ContentRow, SectionKey, SettingRow, TemplateId};
use crate::portfolio::display_name;
use crate::postgrest::Resolution;
use crate::schema::{default_content, is_valid_domain, MAX_DOMAIN_LEN};
use crate::store::PortfolioStore;

/// Length of the account id fragment appended to a taken domain
const SUFFIX_LEN: usize = 6;

/// What a bootstrap run changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BootstrapReport {
    /// Stale accounts that shared the email and were deleted
    pub removed_accounts: Vec<String>,
    /// Sections that got their default content
    pub created_sections: Vec<SectionKey>,
    /// Domain of the setting row created, if one was
    pub created_domain: Option<String>,
}

impl BootstrapReport {
    pub fn is_noop(&self) -> bool {
        self.removed_accounts.is_empty()
            && self.created_sections.is_empty()
            && self.created_domain.is_none()
    }
}

/// Make sure `user` has an account row, a content row per section and a
/// setting row. Any failure aborts the run.
pub async fn bootstrap(store: &dyn PortfolioStore, user: &Account) -> Result<BootstrapReport, Error> {
    let mut report = BootstrapReport::default();

    report.removed_accounts = remove_stale_accounts(store, user).await?;
    sync_account(store, user).await?;
    report.created_sections = provision_content(store, &user.id).await?;
    report.created_domain = provision_setting(store, user).await?;

    if report.is_noop() {
        log::debug!("account {} already provisioned", user.id);
    } else {
        log::info!("provisioned account {}: {:?}", user.id, report);
    }
    Ok(report)
}

/// Delete every other account registered with the same email, together
/// with its content and settings
async fn remove_stale_accounts(store: &dyn PortfolioStore, user: &Account) -> Result<Vec<String>, Error> {
    let email = match user.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => email,
        _ => return Ok(Vec::new()),
    };

    let stale: Vec<String> = store
        .accounts_by_email(email)
        .await?
        .into_iter()
        .map(|account| account.id)
        .filter(|id| id != &user.id)
        .collect();
    if stale.is_empty() {
        return Ok(stale);
    }

    log::warn!("removing {} stale account(s) for {}", stale.len(), email);
    store.purge_accounts(&stale).await?;
    Ok(stale)
}

async fn sync_account(store: &dyn PortfolioStore, user: &Account) -> Result<(), Error> {
    let existing = store.account(&user.id).await?;
    let merged = match &existing {
        Some(existing) => Account {
            id: user.id.clone(),
            email: user.email.clone().or_else(|| existing.email.clone()),
            full_name: user.full_name.clone().or_else(|| existing.full_name.clone()),
            avatar_url: user.avatar_url.clone().or_else(|| existing.avatar_url.clone()),
        },
        None => user.clone(),
    };
    if existing.as_ref() != Some(&merged) {
        store.upsert_account(&merged).await?;
    }
    Ok(())
}

async fn provision_content(store: &dyn PortfolioStore, account_id: &str) -> Result<Vec<SectionKey>, Error> {
    let existing = store.content(account_id).await?;
    let missing: Vec<SectionKey> = SectionKey::CONTENT
        .iter()
        .copied()
        .filter(|key| !existing.iter().any(|row| row.section == *key))
        .collect();

    let rows: Vec<ContentRow> = missing
        .iter()
        .map(|key| ContentRow::new(account_id, *key, default_content(*key)))
        .collect();
    store
        .upsert_content(&rows, Resolution::IgnoreDuplicates)
        .await?;
    Ok(missing)
}

async fn provision_setting(store: &dyn PortfolioStore, user: &Account) -> Result<Option<String>, Error> {
    if store.setting(&user.id).await?.is_some() {
        return Ok(None);
    }

    let rows = store.content(&user.id).await?;
    let name = display_name(&rows, Some(user));
    let base = derive_domain(None, name.as_deref(), Some(&user.id));
    let domain = resolve_domain(store, &base, &user.id).await?;

    store
        .insert_setting(&SettingRow {
            account_id: user.id.clone(),
            domain: Some(domain.clone()),
            billing_status: None,
            billing_type: None,
            is_public: false,
            preferences: json!({ "template": TemplateId::default().as_str() }),
            created_at: None,
        })
        .await?;
    Ok(Some(domain))
}

/// First free domain among `base` and `base` suffixed with successive
/// fragments of the account id
async fn resolve_domain(store: &dyn PortfolioStore, base: &str, account_id: &str) -> Result<String, Error> {
    let id_chars: Vec<char> = account_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let mut candidates = vec![base.to_string()];
    for fragment in id_chars.chunks(SUFFIX_LEN) {
        let prefix: String = base.chars().take(MAX_DOMAIN_LEN - fragment.len()).collect();
        candidates.push(prefix + &fragment.iter().collect::<String>());
    }

    for candidate in candidates {
        if !is_valid_domain(&candidate) {
            continue;
        }
        let owners = store.settings_by_domain(&candidate).await?;
        if owners.iter().all(|row| row.account_id == account_id) {
            return Ok(candidate);
        }
        log::debug!("domain {} is taken", candidate);
    }

    log::error!("no free domain for account {} (base {:?})", account_id, slugify(base));
    Err(Error::database("No free domain is available for this account"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SettingPatch;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    /// Memory store whose purge is refused, like a role without delete rights
    struct RefusingPurge(MemoryStore);

    #[async_trait]
    impl PortfolioStore for RefusingPurge {
        async fn account(&self, id: &str) -> Result<Option<Account>, Error> {
            self.0.account(id).await
        }
        async fn accounts_by_email(&self, email: &str) -> Result<Vec<Account>, Error> {
            self.0.accounts_by_email(email).await
        }
        async fn upsert_account(&self, account: &Account) -> Result<(), Error> {
            self.0.upsert_account(account).await
        }
        async fn content(&self, account_id: &str) -> Result<Vec<ContentRow>, Error> {
            self.0.content(account_id).await
        }
        async fn upsert_content(&self, rows: &[ContentRow], resolution: Resolution) -> Result<(), Error> {
            self.0.upsert_content(rows, resolution).await
        }
        async fn setting(&self, account_id: &str) -> Result<Option<SettingRow>, Error> {
            self.0.setting(account_id).await
        }
        async fn settings_by_domain(&self, domain: &str) -> Result<Vec<SettingRow>, Error> {
            self.0.settings_by_domain(domain).await
        }
        async fn insert_setting(&self, setting: &SettingRow) -> Result<(), Error> {
            self.0.insert_setting(setting).await
        }
        async fn update_setting(&self, account_id: &str, patch: &SettingPatch) -> Result<usize, Error> {
            self.0.update_setting(account_id, patch).await
        }
        async fn purge_accounts(&self, _ids: &[String]) -> Result<(), Error> {
            Err(Error::database("permission denied for table setting"))
        }
    }

    fn user(id: &str, email: &str, name: Option<&str>) -> Account {
        Account {
            id: id.into(),
            email: Some(email.into()),
            full_name: name.map(str::to_string),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn second_run_changes_nothing() {
        let store = MemoryStore::new();
        let jane = user("a1b2c3d4e5f6", "jane@example.com", Some("Jane Doe"));

        let first = bootstrap(&store, &jane).await.unwrap();
        assert_eq!(first.created_sections.len(), 7);
        assert_eq!(first.created_domain.as_deref(), Some("janedoe"));

        let content = store.all_content();
        let settings = store.all_settings();

        let second = bootstrap(&store, &jane).await.unwrap();
        assert!(second.is_noop());
        assert_eq!(store.all_content(), content);
        assert_eq!(store.all_settings(), settings);
    }

    #[tokio::test]
    async fn edited_content_survives_rerun() {
        let store = MemoryStore::new();
        let jane = user("a1", "jane@example.com", Some("Jane Doe"));
        bootstrap(&store, &jane).await.unwrap();

        let edited = ContentRow::new("a1", SectionKey::Profile, json!({ "name": "Janet" }));
        store
            .upsert_content(&[edited.clone()], Resolution::MergeDuplicates)
            .await
            .unwrap();
        bootstrap(&store, &jane).await.unwrap();

        let rows = store.content("a1").await.unwrap();
        assert!(rows.contains(&edited));
    }

    #[tokio::test]
    async fn taken_domain_gets_id_suffix() {
        let store = MemoryStore::new();
        bootstrap(&store, &user("first", "one@example.com", Some("John Doe")))
            .await
            .unwrap();
        let report = bootstrap(&store, &user("9f8e7d6c-5b4a", "two@example.com", Some("John Doe")))
            .await
            .unwrap();

        assert_eq!(report.created_domain.as_deref(), Some("johndoe9f8e7d"));
        let domain = report.created_domain.unwrap();
        assert!(domain.len() <= MAX_DOMAIN_LEN);
        assert!(is_valid_domain(&domain));
    }

    #[tokio::test]
    async fn short_names_are_padded_from_the_id() {
        let store = MemoryStore::new();
        let report = bootstrap(&store, &user("xyz123", "jo@example.com", Some("Jo")))
            .await
            .unwrap();
        assert_eq!(report.created_domain.as_deref(), Some("joxyz123"));
    }

    #[tokio::test]
    async fn stale_accounts_with_same_email_are_removed() {
        let store = MemoryStore::new();
        bootstrap(&store, &user("old", "jane@example.com", Some("Jane Doe")))
            .await
            .unwrap();

        let report = bootstrap(&store, &user("new", "JANE@example.com", Some("Jane Doe")))
            .await
            .unwrap();

        assert_eq!(report.removed_accounts, vec!["old".to_string()]);
        assert!(store.account("old").await.unwrap().is_none());
        assert!(store.content("old").await.unwrap().is_empty());
        // freed by the cleanup, so no suffix is needed
        assert_eq!(report.created_domain.as_deref(), Some("janedoe"));
    }

    #[tokio::test]
    async fn missing_name_falls_back_to_id() {
        let store = MemoryStore::new();
        let report = bootstrap(&store, &user("ABC-def-123", "x@example.com", None))
            .await
            .unwrap();
        assert_eq!(report.created_domain.as_deref(), Some("abcdef123"));

        let setting = store.setting("ABC-def-123").await.unwrap().unwrap();
        assert_eq!(setting.preferred_template(), Some(TemplateId::Minimal));
        assert!(!setting.is_public);
    }

    #[tokio::test]
    async fn refused_cleanup_aborts_without_changes() {
        let store = RefusingPurge(MemoryStore::new());
        bootstrap(&store.0, &user("old", "jane@example.com", Some("Jane Doe")))
            .await
            .unwrap();
        let content = store.0.all_content();
        let settings = store.0.all_settings();

        let err = bootstrap(&store, &user("new", "jane@example.com", Some("Jane Doe")))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Database(_)));
        assert_eq!(store.0.all_content(), content);
        assert_eq!(store.0.all_settings(), settings);
        assert!(store.0.account("old").await.unwrap().is_some());
        assert!(store.0.account("new").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn exhausted_domains_do_not_leak_the_account_id() {
        let store = MemoryStore::new();
        store.force_setting(SettingRow {
            account_id: "other".into(),
            domain: Some("joxyz123".into()),
            billing_status: None,
            billing_type: None,
            is_public: false,
            preferences: json!({}),
            created_at: None,
        });

        let err = bootstrap(&store, &user("xyz123", "jo@example.com", Some("Jo")))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Database(_)));
        assert!(!err.user_message().contains("xyz123"));
        assert!(store.setting("xyz123").await.unwrap().is_none());
    }
}
