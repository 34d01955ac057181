//! Section form engine
//!
//! A [`SectionForm`] edits exactly one section. Field input is bound by
//! path (`work[0].range.from`) and never validated on keystroke; validation
//! runs on blur and when a submit starts. Saving itself is driven by
//! [`crate::dashboard::Dashboard`], which owns the store.

mod path;
mod snapshot;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value;

use crate::error::Error;
use crate::mapper;
use crate::model::SectionKey;
use crate::schema::{self, FieldErrors, Image, SectionValue};

pub use path::*;
pub use snapshot::*;

/// Where a section form is in its edit/save cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Editing,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Toast-level message shown after a submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

/// Image list an attachment goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTarget {
    /// The profile avatar list
    Avatar,
    /// Images of the project entry at the index
    Project(usize),
}

/// Editable state of one section
#[derive(Debug, Clone)]
pub struct SectionForm {
    account_id: String,
    values: SectionValue,
    defaults: SectionValue,
    errors: FieldErrors,
    collapsed: Vec<bool>,
    state: FormState,
    notice: Option<Notice>,
}

impl SectionForm {
    pub fn new(account_id: &str, initial: SectionValue) -> Self {
        let collapsed = vec![false; initial.entry_count().unwrap_or(0)];
        Self {
            account_id: account_id.to_string(),
            defaults: initial.clone(),
            values: initial,
            errors: FieldErrors::new(),
            collapsed,
            state: FormState::Editing,
            notice: None,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn section(&self) -> SectionKey {
        self.values.key()
    }

    pub fn values(&self) -> &SectionValue {
        &self.values
    }

    /// Values a reset returns to: the last loaded or saved state
    pub fn defaults(&self) -> &SectionValue {
        &self.defaults
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn error(&self, path: &str) -> Option<&str> {
        self.errors.get(path)
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.values != self.defaults
    }

    /// Current value at a field path, as stored JSON
    pub fn field(&self, path: &str) -> Result<Value, Error> {
        let path = FieldPath::parse(path)?;
        let json = mapper::from_form_values(&self.values);
        path.get(&json)
            .cloned()
            .ok_or_else(|| Error::InvalidField(path.to_string()))
    }

    /// Bind an input to a field. Never validates.
    ///
    /// The path must name an existing field, and lists and objects can only
    /// be replaced by lists and objects. A settings domain is stored trimmed
    /// and lowercased as it is typed.
    pub fn set_field(&mut self, path: &str, value: Value) -> Result<(), Error> {
        let path = FieldPath::parse(path)?;
        let mut json = mapper::from_form_values(&self.values);
        let fits = match path.get(&json) {
            Some(Value::Object(_)) => value.is_object(),
            Some(Value::Array(_)) => value.is_array(),
            Some(_) => !value.is_object() && !value.is_array(),
            None => false,
        };
        if !fits {
            return Err(Error::InvalidField(path.to_string()));
        }
        let value = match (&self.values, path.segments(), value) {
            (SectionValue::Settings(_), [Segment::Key(key)], Value::String(domain)) if key == "domain" => {
                Value::String(schema::normalize_domain(&domain))
            }
            (_, _, value) => value,
        };
        path.set(&mut json, value)?;
        self.values = mapper::to_form_values(self.section(), &json);
        Ok(())
    }

    /// Validate after a field loses focus, updating only that field's error
    pub fn blur(&mut self, path: &str) {
        let message = schema::validate(&self.values)
            .err()
            .and_then(|errors| errors.get(path).map(str::to_string));
        match message {
            Some(message) => self.errors.insert(path, message),
            None => {
                self.errors.remove(path);
            }
        }
    }

    /// Append a default entry; returns its index
    pub fn add_entry(&mut self) -> Result<usize, Error> {
        if !self.values.push_default_entry() {
            return Err(self.not_a_collection());
        }
        self.collapsed.push(false);
        Ok(self.collapsed.len() - 1)
    }

    /// Remove exactly one entry and shift later entries' errors down
    pub fn remove_entry(&mut self, index: usize) -> Result<(), Error> {
        let section = self.section();
        if self.values.entry_count().is_none() {
            return Err(self.not_a_collection());
        }
        if !self.values.remove_entry(index) {
            return Err(Error::InvalidField(format!("{}[{}]", section, index)));
        }
        if index < self.collapsed.len() {
            self.collapsed.remove(index);
        }
        self.errors.remove_index(section.as_str(), index);
        Ok(())
    }

    /// Flip an entry between collapsed and expanded; returns the new state
    pub fn toggle_collapsed(&mut self, index: usize) -> bool {
        match self.collapsed.get_mut(index) {
            Some(collapsed) => {
                *collapsed = !*collapsed;
                *collapsed
            }
            None => false,
        }
    }

    pub fn is_collapsed(&self, index: usize) -> bool {
        self.collapsed.get(index).copied().unwrap_or(false)
    }

    /// Toggle "present" on an entry's date range. Checking it stores the
    /// ongoing sentinel; unchecking restores an editable empty end.
    pub fn set_present(&mut self, index: usize, present: bool) -> Result<(), Error> {
        let section = self.section();
        let range = self
            .values
            .range_mut(index)
            .ok_or_else(|| Error::InvalidField(format!("{}[{}].range", section, index)))?;
        range.to = if present { None } else { Some(String::new()) };
        if present {
            self.errors.remove(&format!("{}[{}].range.to", section, index));
        }
        Ok(())
    }

    /// Whether the end-date input of an entry is disabled
    pub fn is_end_disabled(&self, index: usize) -> bool {
        self.values
            .range(index)
            .map(|range| range.is_present())
            .unwrap_or(false)
    }

    /// Attach a locally selected file as a data URL preview. Uploading to
    /// object storage is left to the caller.
    pub fn attach_image(
        &mut self,
        target: ImageTarget,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<&Image, Error> {
        let image = Image {
            src: format!("data:{};base64,{}", content_type, BASE64.encode(bytes)),
            alt: file_name.to_string(),
            storage_path: String::new(),
        };
        let images = self.images_mut(target)?;
        images.push(image);
        images
            .last()
            .ok_or_else(|| Error::general("image list is empty after push"))
    }

    /// Append an already uploaded image
    pub fn push_image(&mut self, target: ImageTarget, image: Image) -> Result<(), Error> {
        self.images_mut(target)?.push(image);
        Ok(())
    }

    /// Replace the preview of an attached image once it has been uploaded
    pub fn set_image_location(
        &mut self,
        target: ImageTarget,
        index: usize,
        public_url: &str,
        storage_path: &str,
    ) -> Result<(), Error> {
        let image = self
            .images_mut(target)?
            .get_mut(index)
            .ok_or_else(|| Error::InvalidField(format!("{:?}[{}]", target, index)))?;
        image.src = public_url.to_string();
        image.storage_path = storage_path.to_string();
        Ok(())
    }

    /// Detach an image; the caller deletes its stored object if it has one
    pub fn remove_image(&mut self, target: ImageTarget, index: usize) -> Result<Image, Error> {
        let images = self.images_mut(target)?;
        if index >= images.len() {
            return Err(Error::InvalidField(format!("{:?}[{}]", target, index)));
        }
        Ok(images.remove(index))
    }

    /// Throw away unsaved edits. Also leaves a submit whose save never
    /// reported back.
    pub fn reset(&mut self) {
        self.state = FormState::Editing;
        self.values = self.defaults.clone();
        self.collapsed = vec![false; self.values.entry_count().unwrap_or(0)];
        self.errors.clear();
        self.notice = None;
    }

    /// Validate the whole section and enter `Submitting`.
    ///
    /// Returns the payload to persist. On validation failure the form stays
    /// in `Editing` with one error per invalid field and an error notice.
    pub fn begin_submit(&mut self) -> Result<SectionValue, Error> {
        if self.state == FormState::Submitting {
            return Err(Error::SubmitInProgress(self.section().label().to_string()));
        }
        if let Err(errors) = schema::validate(&self.values) {
            self.errors = errors.clone();
            let err = Error::Validation(errors);
            self.notice = Some(Notice::error(err.user_message()));
            return Err(err);
        }
        self.errors.clear();
        self.state = FormState::Submitting;
        Ok(self.values.clone())
    }

    /// Leave `Submitting` with the outcome of the save.
    ///
    /// On success the saved payload becomes both the values and the reset
    /// target. On failure the user's edits are kept untouched.
    pub fn finish_submit(&mut self, outcome: &Result<SectionValue, Error>) {
        self.state = FormState::Editing;
        match outcome {
            Ok(saved) => {
                self.values = saved.clone();
                self.defaults = saved.clone();
                self.collapsed
                    .resize(self.values.entry_count().unwrap_or(0), false);
                self.errors.clear();
                self.notice = Some(Notice::success(format!("{} saved", self.section().label())));
            }
            Err(Error::Validation(errors)) => {
                self.errors = errors.clone();
                self.notice = Some(Notice::error(Error::Validation(errors.clone()).user_message()));
            }
            Err(err) => {
                self.notice = Some(Notice::error(err.user_message()));
            }
        }
    }

    fn images_mut(&mut self, target: ImageTarget) -> Result<&mut Vec<Image>, Error> {
        match (&mut self.values, target) {
            (SectionValue::Profile(profile), ImageTarget::Avatar) => Ok(&mut profile.avatar),
            (SectionValue::Projects(projects), ImageTarget::Project(i)) => projects
                .get_mut(i)
                .map(|p| &mut p.images)
                .ok_or_else(|| Error::InvalidField(format!("projects[{}].images", i))),
            (value, target) => Err(Error::InvalidField(format!(
                "{:?} images in {}",
                target,
                value.key()
            ))),
        }
    }

    fn not_a_collection(&self) -> Error {
        Error::InvalidField(format!("{} has no entries", self.section()))
    }
}
