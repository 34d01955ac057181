//! Typed section values and their validation
//!
//! Each section is a tagged variant of [`SectionValue`]. The stored JSON for
//! a section is exactly the serialized form of its variant, see
//! [`crate::mapper`] for the way back.

mod defaults;
mod validate;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{SectionKey, TemplateId};

pub use defaults::*;
pub use validate::*;

/// An uploaded or attached image
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub src: String,
    pub alt: String,
    pub storage_path: String,
}

/// A labelled link; label and url are set together or not at all
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Website {
    pub label: String,
    pub url: String,
}

/// A start/end pair. `to == None` means the range is ongoing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub from: String,
    pub to: Option<String>,
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: Some(String::new()),
        }
    }
}

impl DateRange {
    pub fn is_present(&self) -> bool {
        self.to.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Profile {
    pub name: String,
    pub title: String,
    pub about: String,
    pub location: String,
    pub avatar: Vec<Image>,
    pub website: Website,
}

impl Profile {
    /// The avatar shown when only one is expected
    pub fn primary_avatar(&self) -> Option<&Image> {
        self.avatar.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkEntry {
    pub company: String,
    pub title: String,
    pub location: String,
    pub url: String,
    pub description: String,
    pub range: DateRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WritingEntry {
    pub title: String,
    pub publisher: String,
    pub year: String,
    pub url: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpeakingEntry {
    pub title: String,
    pub event: String,
    pub location: String,
    pub year: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectEntry {
    pub title: String,
    pub description: String,
    pub year: String,
    pub url: String,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EducationEntry {
    pub school: String,
    pub degree: String,
    pub description: String,
    pub range: DateRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContactEntry {
    pub label: String,
    pub value: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub domain: String,
    pub template: TemplateId,
    pub is_public: bool,
    pub billing_status: String,
    pub billing_type: String,
}

/// Form-ready value of one section
#[derive(Debug, Clone, PartialEq)]
pub enum SectionValue {
    Profile(Profile),
    Work(Vec<WorkEntry>),
    Writing(Vec<WritingEntry>),
    Speaking(Vec<SpeakingEntry>),
    Projects(Vec<ProjectEntry>),
    Education(Vec<EducationEntry>),
    Contact(Vec<ContactEntry>),
    Settings(Settings),
}

impl SectionValue {
    pub fn key(&self) -> SectionKey {
        match self {
            SectionValue::Profile(_) => SectionKey::Profile,
            SectionValue::Work(_) => SectionKey::Work,
            SectionValue::Writing(_) => SectionKey::Writing,
            SectionValue::Speaking(_) => SectionKey::Speaking,
            SectionValue::Projects(_) => SectionKey::Projects,
            SectionValue::Education(_) => SectionKey::Education,
            SectionValue::Contact(_) => SectionKey::Contact,
            SectionValue::Settings(_) => SectionKey::Settings,
        }
    }

    /// An empty value for the section: empty strings and empty lists
    pub fn empty(key: SectionKey) -> Self {
        match key {
            SectionKey::Profile => SectionValue::Profile(Profile::default()),
            SectionKey::Work => SectionValue::Work(Vec::new()),
            SectionKey::Writing => SectionValue::Writing(Vec::new()),
            SectionKey::Speaking => SectionValue::Speaking(Vec::new()),
            SectionKey::Projects => SectionValue::Projects(Vec::new()),
            SectionKey::Education => SectionValue::Education(Vec::new()),
            SectionKey::Contact => SectionValue::Contact(Vec::new()),
            SectionKey::Settings => SectionValue::Settings(Settings::default()),
        }
    }

    /// Number of repeatable entries; `None` for scalar sections
    pub fn entry_count(&self) -> Option<usize> {
        match self {
            SectionValue::Profile(_) | SectionValue::Settings(_) => None,
            SectionValue::Work(v) => Some(v.len()),
            SectionValue::Writing(v) => Some(v.len()),
            SectionValue::Speaking(v) => Some(v.len()),
            SectionValue::Projects(v) => Some(v.len()),
            SectionValue::Education(v) => Some(v.len()),
            SectionValue::Contact(v) => Some(v.len()),
        }
    }

    /// Append one default-valued entry. Returns false for scalar sections.
    pub fn push_default_entry(&mut self) -> bool {
        match self {
            SectionValue::Profile(_) | SectionValue::Settings(_) => return false,
            SectionValue::Work(v) => v.push(WorkEntry::default()),
            SectionValue::Writing(v) => v.push(WritingEntry::default()),
            SectionValue::Speaking(v) => v.push(SpeakingEntry::default()),
            SectionValue::Projects(v) => v.push(ProjectEntry::default()),
            SectionValue::Education(v) => v.push(EducationEntry::default()),
            SectionValue::Contact(v) => v.push(ContactEntry::default()),
        }
        true
    }

    /// Remove exactly one entry. Returns false if there is none at `index`.
    pub fn remove_entry(&mut self, index: usize) -> bool {
        fn remove<T>(v: &mut Vec<T>, index: usize) -> bool {
            if index < v.len() {
                v.remove(index);
                true
            } else {
                false
            }
        }

        match self {
            SectionValue::Profile(_) | SectionValue::Settings(_) => false,
            SectionValue::Work(v) => remove(v, index),
            SectionValue::Writing(v) => remove(v, index),
            SectionValue::Speaking(v) => remove(v, index),
            SectionValue::Projects(v) => remove(v, index),
            SectionValue::Education(v) => remove(v, index),
            SectionValue::Contact(v) => remove(v, index),
        }
    }

    /// The date range of an entry, for sections that have one
    pub fn range_mut(&mut self, index: usize) -> Option<&mut DateRange> {
        match self {
            SectionValue::Work(v) => v.get_mut(index).map(|e| &mut e.range),
            SectionValue::Education(v) => v.get_mut(index).map(|e| &mut e.range),
            _ => None,
        }
    }

    pub fn range(&self, index: usize) -> Option<&DateRange> {
        match self {
            SectionValue::Work(v) => v.get(index).map(|e| &e.range),
            SectionValue::Education(v) => v.get(index).map(|e| &e.range),
            _ => None,
        }
    }
}

/// Current values of several sections for one account
pub type SectionSnapshot = BTreeMap<SectionKey, SectionValue>;
