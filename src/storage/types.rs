//! Types for storage operations

use serde::{Deserialize, Serialize};

/// Options for uploading an image
#[derive(Debug, Clone)]
pub struct FileOptions {
    /// Cache control header value
    pub cache_control: Option<String>,

    /// MIME type of the file
    pub content_type: Option<String>,

    /// Overwrite an object already at the path
    pub upsert: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            cache_control: Some("3600".to_string()),
            content_type: None,
            upsert: false,
        }
    }
}

impl FileOptions {
    pub fn with_content_type(mut self, value: &str) -> Self {
        self.content_type = Some(value.to_string());
        self
    }

    pub fn with_upsert(mut self, value: bool) -> Self {
        self.upsert = value;
        self
    }
}

/// Response of an object upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// `{bucket}/{path}` of the stored object
    #[serde(rename = "Key")]
    pub key: String,
}

/// A stored image: where it lives and where it is served from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Path inside the bucket
    pub path: String,

    /// Public URL of the object
    pub public_url: String,
}
