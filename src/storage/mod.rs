//! Image uploads to object storage

mod types;

use reqwest::{multipart, Client};
use std::path::Path;

use crate::error::Error;
use crate::fetch::{upstream_error, Fetch, Service, CLIENT_INFO};
use crate::model::SectionKey;

pub use types::*;

/// Client for Supabase Storage
#[derive(Clone)]
pub struct StorageClient {
    /// The base URL for the Supabase project
    url: String,

    /// The anonymous API key for the Supabase project
    key: String,

    /// Access token of the acting user
    token: Option<String>,

    /// HTTP client used for requests
    client: Client,
}

/// Client for a specific storage bucket
pub struct BucketClient<'a> {
    /// Reference to the storage client
    storage: &'a StorageClient,

    /// The bucket ID
    bucket_id: String,
}

impl StorageClient {
    /// Create a new StorageClient
    pub fn new(url: &str, key: &str, client: Client) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            token: None,
            client,
        }
    }

    /// Act as the user holding `token`
    pub fn with_auth(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Get the base URL for storage operations
    fn get_url(&self, path: &str) -> String {
        format!("{}/storage/v1{}", self.url, path)
    }

    fn token(&self) -> Result<&str, Error> {
        self.token
            .as_deref()
            .ok_or_else(|| Error::auth("Not logged in"))
    }

    /// Get a client for a specific bucket
    pub fn from(&self, bucket_id: &str) -> BucketClient {
        BucketClient {
            storage: self,
            bucket_id: bucket_id.to_string(),
        }
    }
}

impl<'a> BucketClient<'a> {
    /// Upload a file and return where it is served from
    pub async fn upload(
        &self,
        path: &str,
        file_data: Vec<u8>,
        options: FileOptions,
    ) -> Result<StoredObject, Error> {
        let token = self.storage.token()?;
        let url = self
            .storage
            .get_url(&format!("/object/{}/{}", self.bucket_id, path));

        let file_name = Path::new(path)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        let mut part = multipart::Part::bytes(file_data).file_name(file_name);
        if let Some(content_type) = &options.content_type {
            part = part.mime_str(content_type)?;
        }
        let form = multipart::Form::new().part("file", part);

        let response = self
            .storage
            .client
            .post(&url)
            .header("apikey", &self.storage.key)
            .header("X-Client-Info", CLIENT_INFO)
            .bearer_auth(token)
            .header(
                "Cache-Control",
                options.cache_control.as_deref().unwrap_or("3600"),
            )
            .header("x-upsert", options.upsert.to_string())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = upstream_error(Service::Storage, status, &text);
            log::error!("upload of {} failed with {}: {}", path, status, err);
            return Err(err);
        }

        let uploaded = response.json::<UploadResponse>().await?;
        log::debug!("uploaded {}", uploaded.key);

        Ok(StoredObject {
            path: path.to_string(),
            public_url: self.get_public_url(path),
        })
    }

    /// Delete objects in the bucket
    pub async fn remove(&self, paths: &[String]) -> Result<(), Error> {
        if paths.is_empty() {
            return Ok(());
        }
        let token = self.storage.token()?;
        let url = self.storage.get_url(&format!("/object/{}", self.bucket_id));

        Fetch::delete(&self.storage.client, &url, Service::Storage)
            .api_key(&self.storage.key)
            .bearer_auth(token)
            .json(&serde_json::json!({ "prefixes": paths }))?
            .execute_empty()
            .await
    }

    /// Get the public URL for a file
    pub fn get_public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.storage.url, self.bucket_id, path
        )
    }
}

/// Object path for a new image: `{account}/{section}/{uuid}-{file}`.
///
/// The file name keeps only characters safe in a URL path segment.
pub fn image_path(account_id: &str, section: SectionKey, file_name: &str) -> String {
    let name = Path::new(file_name)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.trim_matches(['.', '_']).is_empty() {
        safe = "image".to_string();
    }
    format!(
        "{}/{}/{}-{}",
        account_id,
        section.as_str(),
        uuid::Uuid::new_v4(),
        safe
    )
}
