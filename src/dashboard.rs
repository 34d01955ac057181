//! Loading and saving dashboard sections for one signed-in account

use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Error;
use crate::form::{SectionForm, SnapshotCache};
use crate::mapper::{from_form_values, to_form_values, to_form_values_with, MapContext};
use crate::model::{ContentRow, SectionKey, SettingPatch, SettingRow};
use crate::portfolio::display_name;
use crate::postgrest::Resolution;
use crate::schema::{normalize_domain, FieldErrors, SectionValue, Settings};
use crate::store::PortfolioStore;

const DOMAIN_TAKEN: &str = "This domain is already taken";

/// Saves currently running, one per account and section
#[derive(Default)]
pub struct SubmitRegistry {
    running: Mutex<HashSet<(String, SectionKey)>>,
}

impl SubmitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<(String, SectionKey)>> {
        match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Claim the slot for a save; `None` while another save holds it
    pub fn acquire(self: &Arc<Self>, account_id: &str, section: SectionKey) -> Option<SubmitGuard> {
        let key = (account_id.to_string(), section);
        if !self.lock().insert(key.clone()) {
            return None;
        }
        Some(SubmitGuard {
            registry: Arc::clone(self),
            key,
        })
    }

    pub fn is_running(&self, account_id: &str, section: SectionKey) -> bool {
        self.lock().contains(&(account_id.to_string(), section))
    }
}

/// Releases its slot in the [`SubmitRegistry`] when dropped
pub struct SubmitGuard {
    registry: Arc<SubmitRegistry>,
    key: (String, SectionKey),
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
    }
}

/// Dashboard operations acting as one account
pub struct Dashboard {
    account_id: String,
    store: Arc<dyn PortfolioStore>,
    snapshots: Arc<SnapshotCache>,
    submits: Arc<SubmitRegistry>,
}

impl Dashboard {
    pub fn new(
        account_id: &str,
        store: Arc<dyn PortfolioStore>,
        snapshots: Arc<SnapshotCache>,
        submits: Arc<SubmitRegistry>,
    ) -> Self {
        Self {
            account_id: account_id.to_string(),
            store,
            snapshots,
            submits,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Load a section into a fresh form
    pub async fn open(&self, section: SectionKey) -> Result<SectionForm, Error> {
        let rows = self.store.content(&self.account_id).await?;
        let stored = rows
            .iter()
            .find(|row| row.section == section)
            .map(|row| row.data.clone())
            .unwrap_or_else(|| json!({}));

        let value = if section == SectionKey::Settings {
            let setting = self.store.setting(&self.account_id).await?;
            let account = self.store.account(&self.account_id).await?;
            let name = display_name(&rows, account.as_ref());
            let merged = overlay_setting(stored, setting.as_ref());
            let ctx = MapContext {
                display_name: name.as_deref(),
                account_id: Some(&self.account_id),
            };
            to_form_values_with(section, &merged, &ctx)
        } else {
            to_form_values(section, &stored)
        };

        self.snapshots.record(&self.account_id, &value);
        log::debug!("opened {} for {}", section, self.account_id);
        Ok(SectionForm::new(&self.account_id, value))
    }

    /// Record the form's current, possibly unsaved, values for the settings
    /// snapshot
    pub fn track(&self, form: &SectionForm) {
        if form.account_id() == self.account_id {
            self.snapshots.record(&self.account_id, form.values());
        }
    }

    /// Validate and persist the form.
    ///
    /// The form always ends in `Editing` with a notice describing the
    /// outcome; the error is also returned so the host can pick a status.
    pub async fn submit(&self, form: &mut SectionForm) -> Result<(), Error> {
        if form.account_id() != self.account_id {
            return Err(Error::auth("This form belongs to another account"));
        }
        let section = form.section();
        let _guard = match self.submits.acquire(&self.account_id, section) {
            Some(guard) => guard,
            None => {
                log::warn!("ignoring duplicate save of {} for {}", section, self.account_id);
                return Err(Error::SubmitInProgress(section.label().to_string()));
            }
        };

        let payload = form.begin_submit()?;
        let outcome = self.save(payload).await;
        match &outcome {
            Ok(saved) => self.snapshots.record(&self.account_id, saved),
            Err(err) => log::error!("saving {} for {} failed: {}", section, self.account_id, err),
        }
        form.finish_submit(&outcome);
        outcome.map(|_| ())
    }

    async fn save(&self, value: SectionValue) -> Result<SectionValue, Error> {
        let value = match value {
            SectionValue::Settings(settings) => SectionValue::Settings(self.save_settings(settings).await?),
            other => other,
        };

        let row = ContentRow::new(&self.account_id, value.key(), from_form_values(&value));
        self.store
            .upsert_content(&[row], Resolution::MergeDuplicates)
            .await?;
        log::info!("saved {} for {}", value.key(), self.account_id);
        Ok(value)
    }

    /// Write the setting row; the settings content row is only written by
    /// the caller once this succeeds
    async fn save_settings(&self, mut settings: Settings) -> Result<Settings, Error> {
        settings.domain = normalize_domain(&settings.domain);

        let taken = self
            .store
            .settings_by_domain(&settings.domain)
            .await?
            .iter()
            .any(|row| row.account_id != self.account_id);
        if taken {
            let mut errors = FieldErrors::new();
            errors.insert("domain", DOMAIN_TAKEN);
            return Err(Error::Validation(errors));
        }

        let patch = SettingPatch {
            domain: settings.domain.clone(),
            billing_status: settings.billing_status.clone(),
            billing_type: settings.billing_type.clone(),
            is_public: settings.is_public,
            preferences: json!({
                "template": settings.template.as_str(),
                "sections": self.sections_snapshot().await?,
            }),
        };

        let matched = self.store.update_setting(&self.account_id, &patch).await?;
        if matched == 0 {
            return Err(Error::not_found("Settings not found for this account"));
        }
        Ok(settings)
    }

    /// Stored content overlaid with the values currently being edited
    async fn sections_snapshot(&self) -> Result<Value, Error> {
        let rows = self.store.content(&self.account_id).await?;
        let cached = self.snapshots.get(&self.account_id).unwrap_or_default();

        let mut sections = Map::new();
        for key in SectionKey::CONTENT {
            let value = match cached.get(&key) {
                Some(value) => value.clone(),
                None => match rows.iter().find(|row| row.section == key) {
                    Some(row) => to_form_values(key, &row.data),
                    None => continue,
                },
            };
            sections.insert(key.as_str().to_string(), from_form_values(&value));
        }
        Ok(Value::Object(sections))
    }
}

/// Columns of the setting row take precedence over the settings content row
fn overlay_setting(stored: Value, setting: Option<&SettingRow>) -> Value {
    let mut merged = match stored {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Some(setting) = setting {
        if let Some(domain) = setting.domain.as_deref().filter(|d| !d.is_empty()) {
            merged.insert("domain".into(), json!(domain));
        }
        merged.insert("isPublic".into(), json!(setting.is_public));
        if let Some(status) = &setting.billing_status {
            merged.insert("billingStatus".into(), json!(status));
        }
        if let Some(kind) = &setting.billing_type {
            merged.insert("billingType".into(), json!(kind));
        }
        if let Some(template) = setting.preferred_template() {
            merged.insert("template".into(), json!(template.as_str()));
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormState;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn dashboard(store: Arc<MemoryStore>) -> Dashboard {
        Dashboard::new(
            "a1",
            store,
            Arc::new(SnapshotCache::new(Duration::from_secs(60), 16)),
            Arc::new(SubmitRegistry::new()),
        )
    }

    #[test]
    fn registry_releases_on_drop() {
        let registry = Arc::new(SubmitRegistry::new());
        let guard = registry.acquire("a1", SectionKey::Work).unwrap();
        assert!(registry.acquire("a1", SectionKey::Work).is_none());
        assert!(registry.acquire("a1", SectionKey::Contact).is_some());
        drop(guard);
        assert!(!registry.is_running("a1", SectionKey::Work));
    }

    #[tokio::test]
    async fn open_missing_row_gives_empty_form() {
        let store = Arc::new(MemoryStore::new());
        let form = dashboard(store).open(SectionKey::Work).await.unwrap();
        assert_eq!(form.values(), &SectionValue::Work(Vec::new()));
        assert_eq!(form.state(), FormState::Editing);
    }

    #[tokio::test]
    async fn settings_overlay_the_setting_row() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_setting(&SettingRow {
                account_id: "a1".into(),
                domain: Some("janedoe".into()),
                billing_status: Some("active".into()),
                billing_type: None,
                is_public: true,
                preferences: json!({ "template": "modern" }),
                created_at: None,
            })
            .await
            .unwrap();

        let form = dashboard(store).open(SectionKey::Settings).await.unwrap();
        let SectionValue::Settings(settings) = form.values() else {
            panic!("expected settings");
        };
        assert_eq!(settings.domain, "janedoe");
        assert!(settings.is_public);
        assert_eq!(settings.billing_status, "active");
        assert_eq!(settings.template.as_str(), "modern");
    }

    #[tokio::test]
    async fn foreign_forms_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut form = SectionForm::new("someone-else", SectionValue::Contact(Vec::new()));
        let err = dashboard(store).submit(&mut form).await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
