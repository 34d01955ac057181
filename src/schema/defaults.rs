//! The fixed template new accounts are provisioned with

use serde_json::Value;

use super::*;
use crate::mapper;

/// Default value of a section for a freshly provisioned account.
///
/// List sections that require an entry start with one blank entry so the
/// form has something to fill in; projects start empty.
pub fn default_value(key: SectionKey) -> SectionValue {
    let mut value = SectionValue::empty(key);
    if key.is_collection() && key != SectionKey::Projects {
        value.push_default_entry();
    }
    value
}

/// Stored JSON of [`default_value`]
pub fn default_content(key: SectionKey) -> Value {
    mapper::from_form_values(&default_value(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_one_blank_entry_where_required() {
        assert_eq!(default_value(SectionKey::Work).entry_count(), Some(1));
        assert_eq!(default_value(SectionKey::Contact).entry_count(), Some(1));
        assert_eq!(default_value(SectionKey::Projects).entry_count(), Some(0));
        assert_eq!(default_value(SectionKey::Profile).entry_count(), None);
    }

    #[test]
    fn default_content_is_keyed_by_section() {
        let work = default_content(SectionKey::Work);
        assert_eq!(work["work"].as_array().map(Vec::len), Some(1));
        assert_eq!(work["work"][0]["range"]["to"], "");
    }
}
