//! Read-only portfolio aggregate served at `/{domain}`

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::mapper::to_form_values;
use crate::model::{Account, ContentRow, SectionKey, SettingRow, TemplateId};
use crate::schema::*;
use crate::store::PortfolioStore;

/// Everything a template needs to render one portfolio
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Portfolio {
    pub account_id: String,
    pub domain: Option<String>,
    pub template: TemplateId,
    pub is_public: bool,
    pub profile: Profile,
    pub work: Vec<WorkEntry>,
    pub writing: Vec<WritingEntry>,
    pub speaking: Vec<SpeakingEntry>,
    pub projects: Vec<ProjectEntry>,
    pub education: Vec<EducationEntry>,
    pub contact: Vec<ContactEntry>,
}

/// Name shown for the account: the profile name, else the account's full name
pub fn display_name(rows: &[ContentRow], account: Option<&Account>) -> Option<String> {
    let from_profile = section_data(rows, SectionKey::Profile)
        .and_then(|data| data.get("name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let from_account = account
        .and_then(|a| a.full_name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty());
    from_profile.or(from_account).map(str::to_string)
}

fn section_data(rows: &[ContentRow], key: SectionKey) -> Option<&Value> {
    rows.iter().find(|row| row.section == key).map(|row| &row.data)
}

fn section(rows: &[ContentRow], key: SectionKey) -> SectionValue {
    match section_data(rows, key) {
        Some(data) => to_form_values(key, data),
        None => SectionValue::empty(key),
    }
}

macro_rules! list_section {
    ($rows:expr, $variant:ident) => {
        match section($rows, SectionKey::$variant) {
            SectionValue::$variant(entries) => entries,
            _ => Vec::new(),
        }
    };
}

/// Assemble the aggregate from whatever rows exist. Missing rows and
/// fields come out as their empty defaults; nothing here fails.
pub fn assemble(account: Option<&Account>, rows: &[ContentRow], setting: Option<&SettingRow>) -> Portfolio {
    let mut profile = match section(rows, SectionKey::Profile) {
        SectionValue::Profile(profile) => profile,
        _ => Profile::default(),
    };
    if profile.name.trim().is_empty() {
        profile.name = display_name(rows, account).unwrap_or_default();
    }
    if profile.avatar.is_empty() {
        if let Some(url) = account
            .and_then(|a| a.avatar_url.as_deref())
            .filter(|url| !url.trim().is_empty())
        {
            profile.avatar.push(Image {
                src: url.to_string(),
                alt: profile.name.clone(),
                storage_path: String::new(),
            });
        }
    }

    let template = setting
        .and_then(SettingRow::preferred_template)
        .or_else(|| {
            section_data(rows, SectionKey::Settings)
                .and_then(|data| TemplateId::from_value(data.get("template")))
        })
        .unwrap_or_default();

    let account_id = account
        .map(|a| a.id.clone())
        .or_else(|| setting.map(|s| s.account_id.clone()))
        .or_else(|| rows.first().map(|r| r.account_id.clone()))
        .unwrap_or_default();

    Portfolio {
        account_id,
        domain: setting.and_then(|s| s.domain.clone()),
        template,
        is_public: setting.is_some_and(|s| s.is_public),
        profile,
        work: list_section!(rows, Work),
        writing: list_section!(rows, Writing),
        speaking: list_section!(rows, Speaking),
        projects: list_section!(rows, Projects),
        education: list_section!(rows, Education),
        contact: list_section!(rows, Contact),
    }
}

/// [`assemble`], but only for accounts that made their portfolio public
pub fn assemble_public(
    account: Option<&Account>,
    rows: &[ContentRow],
    setting: Option<&SettingRow>,
) -> Option<Portfolio> {
    match setting {
        Some(setting) if setting.is_public => Some(assemble(account, rows, Some(setting))),
        _ => None,
    }
}

/// Resolve a public portfolio by domain.
///
/// Matching ignores case. When more than one account claims the domain the
/// earliest setting row wins. Unknown, malformed and private domains all
/// resolve to `None`. Length is not checked here, so rows stored before the
/// current length limit still resolve.
pub async fn portfolio_by_domain(store: &dyn PortfolioStore, domain: &str) -> Result<Option<Portfolio>, Error> {
    let domain = normalize_domain(domain);
    let well_formed =
        !domain.is_empty() && domain.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if !well_formed {
        log::debug!("rejecting malformed domain {:?}", domain);
        return Ok(None);
    }

    let matches = store.settings_by_domain(&domain).await?;
    if matches.len() > 1 {
        log::warn!(
            "domain {} is claimed by {} accounts; serving {}",
            domain,
            matches.len(),
            matches[0].account_id
        );
    }
    let setting = match matches.into_iter().next() {
        Some(setting) if setting.is_public => setting,
        _ => return Ok(None),
    };

    let account = store.account(&setting.account_id).await?;
    let rows = store.content(&setting.account_id).await?;
    Ok(assemble_public(account.as_ref(), &rows, Some(&setting)))
}

/// The owner's own view of their portfolio, regardless of visibility
pub async fn portfolio_for_owner(store: &dyn PortfolioStore, account_id: &str) -> Result<Portfolio, Error> {
    let account = store.account(account_id).await?;
    let rows = store.content(account_id).await?;
    let setting = store.setting(account_id).await?;
    Ok(assemble(account.as_ref(), &rows, setting.as_ref()))
}
