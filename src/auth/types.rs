//! Types for authentication

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::session::Session;
use crate::model::Account;

/// User data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user ID
    pub id: String,

    /// The user's email address
    #[serde(default)]
    pub email: Option<String>,

    /// Profile data supplied by the sign-in provider
    #[serde(default)]
    pub user_metadata: Value,

    /// When the email address was confirmed
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
}

impl User {
    fn metadata_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.user_metadata.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Full name from the provider metadata
    pub fn full_name(&self) -> Option<String> {
        self.metadata_str(&["full_name", "name"])
    }

    /// Avatar URL from the provider metadata
    pub fn avatar_url(&self) -> Option<String> {
        self.metadata_str(&["avatar_url", "picture"])
    }

    /// The account row this user maps to
    pub fn to_account(&self) -> Account {
        Account {
            id: self.id.clone(),
            email: self.email.clone(),
            full_name: self.full_name(),
            avatar_url: self.avatar_url(),
        }
    }
}

/// Result of a sign-up
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// The user is signed in right away
    Session(Session),
    /// The user must confirm their email before a session exists
    ConfirmationRequired { user: Option<User> },
}
