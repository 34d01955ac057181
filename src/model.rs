//! Rows of the three backing tables and the closed key sets

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One of the eight content sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKey {
    Profile,
    Work,
    Writing,
    Speaking,
    Projects,
    Education,
    Contact,
    Settings,
}

impl SectionKey {
    /// Every section, in dashboard order
    pub const ALL: [SectionKey; 8] = [
        SectionKey::Profile,
        SectionKey::Work,
        SectionKey::Writing,
        SectionKey::Speaking,
        SectionKey::Projects,
        SectionKey::Education,
        SectionKey::Contact,
        SectionKey::Settings,
    ];

    /// The sections that carry portfolio content
    pub const CONTENT: [SectionKey; 7] = [
        SectionKey::Profile,
        SectionKey::Work,
        SectionKey::Writing,
        SectionKey::Speaking,
        SectionKey::Projects,
        SectionKey::Education,
        SectionKey::Contact,
    ];

    /// Convert the key to its stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::Profile => "profile",
            SectionKey::Work => "work",
            SectionKey::Writing => "writing",
            SectionKey::Speaking => "speaking",
            SectionKey::Projects => "projects",
            SectionKey::Education => "education",
            SectionKey::Contact => "contact",
            SectionKey::Settings => "settings",
        }
    }

    /// Human label used in notices
    pub fn label(&self) -> &'static str {
        match self {
            SectionKey::Profile => "Profile",
            SectionKey::Work => "Work",
            SectionKey::Writing => "Writing",
            SectionKey::Speaking => "Speaking",
            SectionKey::Projects => "Projects",
            SectionKey::Education => "Education",
            SectionKey::Contact => "Contact",
            SectionKey::Settings => "Settings",
        }
    }

    /// Whether the section is edited as a list of repeatable entries
    pub fn is_collection(&self) -> bool {
        !matches!(self, SectionKey::Profile | SectionKey::Settings)
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::not_found(format!("section '{}'", s)))
    }
}

/// Display templates a portfolio can be rendered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateId {
    #[default]
    Minimal,
    Classic,
    Modern,
}

impl TemplateId {
    pub const ALL: [TemplateId; 3] = [TemplateId::Minimal, TemplateId::Classic, TemplateId::Modern];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateId::Minimal => "minimal",
            TemplateId::Classic => "classic",
            TemplateId::Modern => "modern",
        }
    }

    /// Parse a stored value; anything outside the known set is unset
    pub fn parse(value: &str) -> Option<Self> {
        TemplateId::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == value.trim())
    }

    /// Parse a stored JSON value the same way
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        value.and_then(Value::as_str).and_then(TemplateId::parse)
    }
}

/// A row of the `account` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A row of the `content` table; unique on `(account_id, section)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRow {
    pub account_id: String,
    pub section: SectionKey,
    #[serde(default)]
    pub data: Value,
}

impl ContentRow {
    pub fn new(account_id: &str, section: SectionKey, data: Value) -> Self {
        Self {
            account_id: account_id.to_string(),
            section,
            data,
        }
    }
}

/// A row of the `setting` table; unique on `account_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingRow {
    pub account_id: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub billing_status: Option<String>,
    #[serde(default)]
    pub billing_type: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub preferences: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl SettingRow {
    /// Template chosen in the preferences blob, if it is a known one
    pub fn preferred_template(&self) -> Option<TemplateId> {
        TemplateId::from_value(self.preferences.get("template"))
    }
}

/// Columns written by a settings save; never creates a row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingPatch {
    pub domain: String,
    pub billing_status: String,
    pub billing_type: String,
    pub is_public: bool,
    pub preferences: Value,
}
