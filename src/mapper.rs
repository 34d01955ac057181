//! Stored section JSON <-> form-ready section values
//!
//! Stored payloads are whatever the client last wrote, so every read goes
//! through the named normalizers below instead of a strict deserialize:
//! avatars may be a single object or a list, years may be numbers or
//! strings, legacy images may lack `storagePath`, and any field may be
//! missing.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

use crate::model::{SectionKey, TemplateId};
use crate::schema::*;

/// Context used to fill in derived settings values
#[derive(Debug, Clone, Default)]
pub struct MapContext<'a> {
    /// Display name from the profile section or the account
    pub display_name: Option<&'a str>,
    /// Account id, the last fallback for a domain
    pub account_id: Option<&'a str>,
}

/// Convert a stored payload into a complete form value
pub fn to_form_values(key: SectionKey, stored: &Value) -> SectionValue {
    to_form_values_with(key, stored, &MapContext::default())
}

/// Like [`to_form_values`], deriving a missing settings domain from `ctx`
pub fn to_form_values_with(key: SectionKey, stored: &Value, ctx: &MapContext<'_>) -> SectionValue {
    let obj = as_object(stored);
    match key {
        SectionKey::Profile => SectionValue::Profile(profile(obj)),
        SectionKey::Work => SectionValue::Work(entries(obj, "work", work_entry)),
        SectionKey::Writing => SectionValue::Writing(entries(obj, "writing", writing_entry)),
        SectionKey::Speaking => SectionValue::Speaking(entries(obj, "speaking", speaking_entry)),
        SectionKey::Projects => SectionValue::Projects(entries(obj, "projects", project_entry)),
        SectionKey::Education => {
            SectionValue::Education(entries(obj, "education", education_entry))
        }
        SectionKey::Contact => SectionValue::Contact(entries(obj, "contact", contact_entry)),
        SectionKey::Settings => SectionValue::Settings(settings(obj, ctx)),
    }
}

/// Convert a form value into the payload stored in the content row
pub fn from_form_values(value: &SectionValue) -> Value {
    match value {
        SectionValue::Profile(profile) => to_json(profile),
        SectionValue::Work(v) => json!({ "work": to_json(v) }),
        SectionValue::Writing(v) => json!({ "writing": to_json(v) }),
        SectionValue::Speaking(v) => json!({ "speaking": to_json(v) }),
        SectionValue::Projects(v) => json!({ "projects": to_json(v) }),
        SectionValue::Education(v) => json!({ "education": to_json(v) }),
        SectionValue::Contact(v) => json!({ "contact": to_json(v) }),
        SectionValue::Settings(settings) => to_json(settings),
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    // Plain structs of strings, bools and lists always serialize
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn profile(obj: &Map<String, Value>) -> Profile {
    Profile {
        name: text(obj, "name"),
        title: text(obj, "title"),
        about: text(obj, "about"),
        location: text(obj, "location"),
        avatar: normalize_images(obj.get("avatar")),
        website: website(obj.get("website")),
    }
}

fn work_entry(obj: &Map<String, Value>) -> WorkEntry {
    WorkEntry {
        company: text(obj, "company"),
        title: text(obj, "title"),
        location: text(obj, "location"),
        url: text(obj, "url"),
        description: text(obj, "description"),
        range: normalize_range(obj.get("range")),
    }
}

fn writing_entry(obj: &Map<String, Value>) -> WritingEntry {
    WritingEntry {
        title: text(obj, "title"),
        publisher: text(obj, "publisher"),
        year: coerce_year(obj.get("year")),
        url: text(obj, "url"),
        description: text(obj, "description"),
    }
}

fn speaking_entry(obj: &Map<String, Value>) -> SpeakingEntry {
    SpeakingEntry {
        title: text(obj, "title"),
        event: text(obj, "event"),
        location: text(obj, "location"),
        year: coerce_year(obj.get("year")),
        url: text(obj, "url"),
    }
}

fn project_entry(obj: &Map<String, Value>) -> ProjectEntry {
    ProjectEntry {
        title: text(obj, "title"),
        description: text(obj, "description"),
        year: coerce_year(obj.get("year")),
        url: text(obj, "url"),
        images: normalize_images(obj.get("images")),
    }
}

fn education_entry(obj: &Map<String, Value>) -> EducationEntry {
    EducationEntry {
        school: text(obj, "school"),
        degree: text(obj, "degree"),
        description: text(obj, "description"),
        range: normalize_range(obj.get("range")),
    }
}

fn contact_entry(obj: &Map<String, Value>) -> ContactEntry {
    ContactEntry {
        label: text(obj, "label"),
        value: text(obj, "value"),
        url: text(obj, "url"),
    }
}

fn settings(obj: &Map<String, Value>, ctx: &MapContext<'_>) -> Settings {
    let stored = text(obj, "domain");
    Settings {
        domain: derive_domain(Some(stored.as_str()), ctx.display_name, ctx.account_id),
        template: TemplateId::from_value(obj.get("template")).unwrap_or_default(),
        is_public: flag(obj.get("isPublic")),
        billing_status: text(obj, "billingStatus"),
        billing_type: text(obj, "billingType"),
    }
}

fn website(value: Option<&Value>) -> Website {
    let obj = value.map(as_object).unwrap_or_else(|| empty());
    Website {
        label: text(obj, "label"),
        url: text(obj, "url"),
    }
}

fn empty() -> &'static Map<String, Value> {
    static EMPTY: OnceLock<Map<String, Value>> = OnceLock::new();
    EMPTY.get_or_init(Map::new)
}

fn as_object(value: &Value) -> &Map<String, Value> {
    value.as_object().unwrap_or_else(|| empty())
}

fn entries<T>(obj: &Map<String, Value>, key: &str, map: fn(&Map<String, Value>) -> T) -> Vec<T> {
    one_or_many(obj.get(key))
        .into_iter()
        .filter_map(Value::as_object)
        .map(map)
        .collect()
}

/// A list stays a list, a single value becomes a one-element list, and
/// null or a missing value becomes empty
pub fn one_or_many(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    }
}

fn text(obj: &Map<String, Value>, key: &str) -> String {
    scalar_text(obj.get(key))
}

fn scalar_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Years are edited as text whether stored as `2021` or `"2021"`
pub fn coerce_year(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 => format!("{:.0}", f),
                    _ => n.to_string(),
                }
            }
        }
        other => scalar_text(other),
    }
}

/// Parse an edited year for rendering; the stored form is left untouched
pub fn render_year(value: &str) -> Option<i32> {
    let value = value.trim();
    if value.len() != 4 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Date range where an explicit `null` end is the ongoing sentinel and a
/// missing end is an unset one
pub fn normalize_range(value: Option<&Value>) -> DateRange {
    let obj = value.map(as_object).unwrap_or_else(|| empty());
    let to = match obj.get("to") {
        Some(Value::Null) => None,
        other => Some(coerce_year(other)),
    };
    DateRange {
        from: coerce_year(obj.get("from")),
        to,
    }
}

/// Images stored as a list, a single object or a bare URL string
pub fn normalize_images(value: Option<&Value>) -> Vec<Image> {
    one_or_many(value)
        .into_iter()
        .filter_map(normalize_image)
        .collect()
}

fn normalize_image(value: &Value) -> Option<Image> {
    match value {
        Value::String(src) if !src.is_empty() => Some(Image {
            src: src.clone(),
            ..Default::default()
        }),
        Value::Object(obj) => Some(Image {
            src: text(obj, "src"),
            alt: text(obj, "alt"),
            // legacy uploads predate storage paths
            storage_path: text(obj, "storagePath"),
        }),
        _ => None,
    }
}

/// Derive a domain from, in order, the stored domain, a slug of the display
/// name, and a slug of the account id. Always lowercase and at most
/// [`MAX_DOMAIN_LEN`] characters; empty when nothing yields a slug. A stored
/// domain is kept as typed apart from case so validation can reject it.
pub fn derive_domain(
    stored: Option<&str>,
    display_name: Option<&str>,
    account_id: Option<&str>,
) -> String {
    let stored: String = stored
        .map(normalize_domain)
        .unwrap_or_default()
        .chars()
        .take(MAX_DOMAIN_LEN)
        .collect();
    if !stored.is_empty() {
        return stored;
    }
    [display_name, account_id]
        .into_iter()
        .flatten()
        .map(slugify)
        .find(|slug| !slug.is_empty())
        .unwrap_or_default()
}

/// Lowercase ASCII letters and digits only, truncated to the domain length
pub fn slugify(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(MAX_DOMAIN_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stored_object_yields_defined_defaults() {
        for key in SectionKey::ALL {
            let value = to_form_values(key, &json!({}));
            assert_eq!(value, SectionValue::empty(key), "{}", key);
        }
        assert_eq!(
            to_form_values(SectionKey::Profile, &Value::Null),
            SectionValue::empty(SectionKey::Profile)
        );
    }

    #[test]
    fn avatar_single_object_becomes_list() {
        let stored = json!({ "avatar": { "src": "https://cdn/a.png", "alt": "me" } });
        let SectionValue::Profile(profile) = to_form_values(SectionKey::Profile, &stored) else {
            panic!("expected profile");
        };
        assert_eq!(profile.avatar.len(), 1);
        let primary = profile.primary_avatar().unwrap();
        assert_eq!(primary.src, "https://cdn/a.png");
        assert_eq!(primary.storage_path, "");
    }

    #[test]
    fn years_are_coerced_to_strings() {
        assert_eq!(coerce_year(Some(&json!(2021))), "2021");
        assert_eq!(coerce_year(Some(&json!("2019"))), "2019");
        assert_eq!(coerce_year(Some(&json!(2021.0))), "2021");
        assert_eq!(coerce_year(None), "");
        assert_eq!(render_year("2021"), Some(2021));
        assert_eq!(render_year("21"), None);
    }

    #[test]
    fn large_years_keep_every_digit() {
        assert_eq!(coerce_year(Some(&json!(9_007_199_254_740_993i64))), "9007199254740993");
        assert_eq!(coerce_year(Some(&json!(u64::MAX))), u64::MAX.to_string());
        assert_eq!(coerce_year(Some(&json!(1e20))), "100000000000000000000");
    }

    #[test]
    fn range_distinguishes_null_from_missing() {
        let present = normalize_range(Some(&json!({ "from": 2018, "to": null })));
        assert_eq!(present.from, "2018");
        assert!(present.is_present());

        let unset = normalize_range(Some(&json!({ "from": "2018" })));
        assert_eq!(unset.to, Some(String::new()));
    }

    #[test]
    fn round_trip_preserves_valid_values() {
        let value = SectionValue::Work(vec![WorkEntry {
            company: "Acme".into(),
            title: "Engineer".into(),
            url: "https://acme.dev".into(),
            range: DateRange {
                from: "2020".into(),
                to: None,
            },
            ..Default::default()
        }]);
        assert!(validate(&value).is_ok());

        let stored = from_form_values(&value);
        assert!(stored["work"][0]["range"]["to"].is_null());
        assert_eq!(to_form_values(SectionKey::Work, &stored), value);

        let settings = SectionValue::Settings(Settings {
            domain: "janedoe".into(),
            template: TemplateId::Classic,
            is_public: true,
            billing_status: "active".into(),
            billing_type: "monthly".into(),
        });
        let stored = from_form_values(&settings);
        assert_eq!(stored["isPublic"], true);
        assert_eq!(to_form_values(SectionKey::Settings, &stored), settings);
    }

    #[test]
    fn projects_keep_image_lists() {
        let stored = json!({ "projects": [{
            "title": "Site",
            "images": [{ "src": "a", "alt": "b", "storagePath": "u/projects/a.png" }, "legacy.png"]
        }]});
        let SectionValue::Projects(projects) = to_form_values(SectionKey::Projects, &stored) else {
            panic!("expected projects");
        };
        assert_eq!(projects[0].images.len(), 2);
        assert_eq!(projects[0].images[0].storage_path, "u/projects/a.png");
        assert_eq!(projects[0].images[1].src, "legacy.png");
    }

    #[test]
    fn domain_fallback_chain() {
        assert_eq!(derive_domain(Some("JaneDoe"), Some("Other"), Some("id")), "janedoe");
        assert_eq!(derive_domain(Some(""), Some("Jane Q. Doe!"), Some("id")), "janeqdoe");
        assert_eq!(
            derive_domain(None, Some("---"), Some("3F2A-99B1-0000-1111-2222")),
            "3f2a99b100001111"
        );
        assert_eq!(derive_domain(None, None, None), "");
        assert_eq!(derive_domain(Some(" John-Doe "), None, None), "john-doe");
    }

    #[test]
    fn settings_domain_uses_context() {
        let ctx = MapContext {
            display_name: Some("Jane Doe"),
            account_id: Some("abc"),
        };
        let SectionValue::Settings(settings) =
            to_form_values_with(SectionKey::Settings, &json!({ "template": "retro" }), &ctx)
        else {
            panic!("expected settings");
        };
        assert_eq!(settings.domain, "janedoe");
        assert_eq!(settings.template, TemplateId::Minimal);
    }
}
