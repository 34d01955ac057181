//! Per-section validation rules

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::*;
use crate::mapper;

pub const MAX_NAME_LEN: usize = 32;
pub const MAX_TITLE_LEN: usize = 32;
pub const MAX_ABOUT_LEN: usize = 500;
pub const MIN_DOMAIN_LEN: usize = 3;
pub const MAX_DOMAIN_LEN: usize = 16;

const REQUIRED: &str = "This field is required";
const INVALID_URL: &str = "Enter a valid URL starting with http:// or https://";
const INVALID_YEAR: &str = "Enter a year such as 2024";
const AT_LEAST_ONE: &str = "Add at least one entry";
const INVALID_DOMAIN: &str = "Use 3 to 16 lowercase letters or digits";
const LABEL_WITHOUT_URL: &str = "Add a URL for this label or clear the label";
const URL_WITHOUT_LABEL: &str = "Add a label for this URL or clear the URL";

/// Error messages keyed by field path, e.g. `work[2].range.to`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error; the first message for a path wins
    pub fn insert(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.entry(path.into()).or_insert_with(|| message.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.0.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Drop errors of entry `list[index]` and shift later entries down by one
    pub fn remove_index(&mut self, list: &str, index: usize) {
        let prefix = format!("{}[", list);
        let old = std::mem::take(&mut self.0);
        for (path, message) in old {
            let Some((i, rest)) = split_index(&path, &prefix) else {
                self.0.insert(path, message);
                continue;
            };
            if i == index {
                continue;
            }
            let i = if i > index { i - 1 } else { i };
            self.0.insert(format!("{}{}]{}", prefix, i, rest), message);
        }
    }
}

fn split_index<'a>(path: &'a str, prefix: &str) -> Option<(usize, &'a str)> {
    let tail = path.strip_prefix(prefix)?;
    let close = tail.find(']')?;
    let index = tail[..close].parse().ok()?;
    Some((index, &tail[close + 1..]))
}

/// Validate a form-ready section value
pub fn validate(value: &SectionValue) -> Result<(), FieldErrors> {
    let mut rules = Rules::default();

    match value {
        SectionValue::Profile(profile) => {
            rules.required("name", &profile.name);
            rules.max_len("name", &profile.name, MAX_NAME_LEN);
            rules.required("title", &profile.title);
            rules.max_len("title", &profile.title, MAX_TITLE_LEN);
            rules.max_len("about", &profile.about, MAX_ABOUT_LEN);
            rules.website("website", &profile.website);
        }
        SectionValue::Work(entries) => {
            rules.at_least_one("work", entries.len());
            for (i, entry) in entries.iter().enumerate() {
                let at = |field: &str| format!("work[{}].{}", i, field);
                rules.required(&at("company"), &entry.company);
                rules.required(&at("title"), &entry.title);
                rules.url_or_empty(&at("url"), &entry.url);
                rules.range(&at("range"), &entry.range);
            }
        }
        SectionValue::Writing(entries) => {
            rules.at_least_one("writing", entries.len());
            for (i, entry) in entries.iter().enumerate() {
                let at = |field: &str| format!("writing[{}].{}", i, field);
                rules.required(&at("title"), &entry.title);
                rules.year_or_empty(&at("year"), &entry.year);
                rules.url_or_empty(&at("url"), &entry.url);
            }
        }
        SectionValue::Speaking(entries) => {
            rules.at_least_one("speaking", entries.len());
            for (i, entry) in entries.iter().enumerate() {
                let at = |field: &str| format!("speaking[{}].{}", i, field);
                rules.required(&at("title"), &entry.title);
                rules.required(&at("event"), &entry.event);
                rules.year_or_empty(&at("year"), &entry.year);
                rules.url_or_empty(&at("url"), &entry.url);
            }
        }
        SectionValue::Projects(entries) => {
            for (i, entry) in entries.iter().enumerate() {
                let at = |field: &str| format!("projects[{}].{}", i, field);
                rules.required(&at("title"), &entry.title);
                rules.year_or_empty(&at("year"), &entry.year);
                rules.url_or_empty(&at("url"), &entry.url);
            }
        }
        SectionValue::Education(entries) => {
            rules.at_least_one("education", entries.len());
            for (i, entry) in entries.iter().enumerate() {
                let at = |field: &str| format!("education[{}].{}", i, field);
                rules.required(&at("school"), &entry.school);
                rules.required(&at("degree"), &entry.degree);
                rules.range(&at("range"), &entry.range);
            }
        }
        SectionValue::Contact(entries) => {
            rules.at_least_one("contact", entries.len());
            for (i, entry) in entries.iter().enumerate() {
                let at = |field: &str| format!("contact[{}].{}", i, field);
                rules.required(&at("label"), &entry.label);
                rules.required(&at("value"), &entry.value);
                rules.url_or_empty(&at("url"), &entry.url);
            }
        }
        SectionValue::Settings(settings) => {
            if !is_valid_domain(&settings.domain) {
                rules.errors.insert("domain", INVALID_DOMAIN);
            }
        }
    }

    rules.finish()
}

/// Validate a raw stored payload for `key`
pub fn validate_json(key: SectionKey, candidate: &Value) -> Result<(), FieldErrors> {
    validate(&mapper::to_form_values(key, candidate))
}

/// Trim and lowercase a domain the way it is stored
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().to_lowercase()
}

/// `^[a-z0-9]{3,16}$`
pub fn is_valid_domain(domain: &str) -> bool {
    (MIN_DOMAIN_LEN..=MAX_DOMAIN_LEN).contains(&domain.len())
        && domain
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

#[derive(Default)]
struct Rules {
    errors: FieldErrors,
}

impl Rules {
    fn required(&mut self, path: &str, value: &str) {
        if value.trim().is_empty() {
            self.errors.insert(path, REQUIRED);
        }
    }

    fn max_len(&mut self, path: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.errors
                .insert(path, format!("Must be at most {} characters", max));
        }
    }

    fn url_or_empty(&mut self, path: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        let ok = url::Url::parse(value)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
            .unwrap_or(false);
        if !ok {
            self.errors.insert(path, INVALID_URL);
        }
    }

    fn year_or_empty(&mut self, path: &str, value: &str) {
        let value = value.trim();
        if !value.is_empty() && mapper::render_year(value).is_none() {
            self.errors.insert(path, INVALID_YEAR);
        }
    }

    fn at_least_one(&mut self, path: &str, len: usize) {
        if len == 0 {
            self.errors.insert(path, AT_LEAST_ONE);
        }
    }

    fn website(&mut self, path: &str, website: &Website) {
        let has_label = !website.label.trim().is_empty();
        let has_url = !website.url.trim().is_empty();
        match (has_label, has_url) {
            (true, false) => self.errors.insert(format!("{}.url", path), LABEL_WITHOUT_URL),
            (false, true) => self
                .errors
                .insert(format!("{}.label", path), URL_WITHOUT_LABEL),
            _ => {}
        }
        self.url_or_empty(&format!("{}.url", path), &website.url);
    }

    fn range(&mut self, path: &str, range: &DateRange) {
        self.required(&format!("{}.from", path), &range.from);
        // `None` is the ongoing sentinel and needs no end date
        if let Some(to) = &range.to {
            self.required(&format!("{}.to", path), to);
        }
    }

    fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn work(range: DateRange) -> SectionValue {
        SectionValue::Work(vec![WorkEntry {
            company: "Acme".into(),
            title: "Engineer".into(),
            range,
            ..Default::default()
        }])
    }

    #[test]
    fn present_sentinel_bypasses_required_end() {
        let ongoing = DateRange {
            from: "2020".into(),
            to: None,
        };
        assert!(validate(&work(ongoing)).is_ok());

        let unset = DateRange {
            from: "2020".into(),
            to: Some(String::new()),
        };
        let errors = validate(&work(unset)).unwrap_err();
        assert_eq!(errors.get("work[0].range.to"), Some(REQUIRED));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn list_sections_need_one_entry_except_projects() {
        for key in [
            SectionKey::Work,
            SectionKey::Writing,
            SectionKey::Speaking,
            SectionKey::Education,
            SectionKey::Contact,
        ] {
            let errors = validate(&SectionValue::empty(key)).unwrap_err();
            assert_eq!(errors.get(key.as_str()), Some(AT_LEAST_ONE), "{}", key);
        }
        assert!(validate(&SectionValue::empty(SectionKey::Projects)).is_ok());
    }

    #[test]
    fn profile_limits_and_website_pairing() {
        let profile = Profile {
            name: "x".repeat(33),
            title: "Engineer".into(),
            about: "y".repeat(501),
            website: Website {
                label: "Blog".into(),
                url: String::new(),
            },
            ..Default::default()
        };
        let errors = validate(&SectionValue::Profile(profile)).unwrap_err();
        assert!(errors.contains("name"));
        assert!(errors.contains("about"));
        assert_eq!(errors.get("website.url"), Some(LABEL_WITHOUT_URL));
        assert!(!errors.contains("title"));
    }

    #[test]
    fn website_url_without_label_flags_label() {
        let profile = Profile {
            name: "Jane".into(),
            title: "Engineer".into(),
            website: Website {
                label: String::new(),
                url: "https://jane.dev".into(),
            },
            ..Default::default()
        };
        let errors = validate(&SectionValue::Profile(profile)).unwrap_err();
        assert_eq!(errors.get("website.label"), Some(URL_WITHOUT_LABEL));
    }

    #[test]
    fn urls_must_be_http() {
        let entries = vec![ContactEntry {
            label: "GitHub".into(),
            value: "jane".into(),
            url: "ftp://example.com".into(),
        }];
        let errors = validate(&SectionValue::Contact(entries)).unwrap_err();
        assert_eq!(errors.get("contact[0].url"), Some(INVALID_URL));
    }

    #[test]
    fn domain_must_already_be_normalized() {
        let settings = |domain: &str| {
            SectionValue::Settings(Settings {
                domain: domain.into(),
                ..Default::default()
            })
        };
        assert!(validate(&settings("johndoe")).is_ok());
        assert!(validate(&settings(" JohnDoe ")).is_err());
        assert!(validate(&settings("jo")).is_err());
        assert!(validate(&settings("john-doe")).is_err());
        assert!(validate(&settings("abcdefghijklmnopq")).is_err());
    }

    #[test]
    fn validate_json_tolerates_numeric_years() {
        let stored = json!({ "writing": [{ "title": "Essay", "year": 2021 }] });
        assert!(validate_json(SectionKey::Writing, &stored).is_ok());
    }

    #[test]
    fn removing_an_entry_reindexes_errors() {
        let mut errors = FieldErrors::new();
        errors.insert("work[0].title", REQUIRED);
        errors.insert("work[1].company", REQUIRED);
        errors.insert("work[2].range.to", REQUIRED);
        errors.insert("work", AT_LEAST_ONE);

        errors.remove_index("work", 1);

        assert_eq!(errors.get("work[0].title"), Some(REQUIRED));
        assert_eq!(errors.get("work[1].range.to"), Some(REQUIRED));
        assert!(!errors.contains("work[1].company"));
        assert!(!errors.contains("work[2].range.to"));
        assert!(errors.contains("work"));
    }
}
