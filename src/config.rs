//! Configuration for the portfolio backend

use std::env;
use std::time::Duration;

use crate::error::Error;

/// Configuration for the Supabase-backed services
#[derive(Debug, Clone)]
pub struct FolioConfig {
    /// The base URL for the Supabase project
    pub supabase_url: String,

    /// The anonymous API key
    pub anon_key: String,

    /// Service role key, used for the bootstrap cleanup of stray accounts
    pub service_role_key: Option<String>,

    /// Bucket holding uploaded images
    pub storage_bucket: String,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// How long an idle account's form snapshot is kept
    pub snapshot_ttl: Duration,

    /// Maximum number of accounts held in the snapshot cache
    pub snapshot_capacity: usize,

    /// Public site URL, used to build auth redirect targets
    pub site_url: Option<String>,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            anon_key: String::new(),
            service_role_key: None,
            storage_bucket: "images".to_string(),
            request_timeout: Some(Duration::from_secs(30)),
            snapshot_ttl: Duration::from_secs(30 * 60),
            snapshot_capacity: 1024,
            site_url: None,
        }
    }
}

impl FolioConfig {
    /// Create a configuration for the given project
    pub fn new(supabase_url: &str, anon_key: &str) -> Self {
        Self {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            ..Self::default()
        }
    }

    /// Load the configuration from the environment.
    ///
    /// `SUPABASE_URL` and `SUPABASE_KEY` are required. Optional:
    /// `SUPABASE_SERVICE_ROLE_KEY`, `FOLIO_STORAGE_BUCKET`, `FOLIO_SITE_URL`.
    pub fn from_env() -> Result<Self, Error> {
        let url = required_var("SUPABASE_URL")?;
        let key = required_var("SUPABASE_KEY")?;

        let mut config = Self::new(&url, &key);
        if let Some(service_key) = optional_var("SUPABASE_SERVICE_ROLE_KEY") {
            config = config.with_service_role_key(&service_key);
        }
        if let Some(bucket) = optional_var("FOLIO_STORAGE_BUCKET") {
            config = config.with_storage_bucket(&bucket);
        }
        if let Some(site_url) = optional_var("FOLIO_SITE_URL") {
            config = config.with_site_url(&site_url);
        }
        Ok(config)
    }

    /// Check that the wiring needed to reach the backend is present
    pub fn validate(&self) -> Result<(), Error> {
        if self.supabase_url.is_empty() {
            return Err(Error::config("Supabase URL is not configured"));
        }
        url::Url::parse(&self.supabase_url)
            .map_err(|e| Error::config(format!("Supabase URL is invalid: {}", e)))?;
        if self.anon_key.is_empty() {
            return Err(Error::config("Supabase key is not configured"));
        }
        Ok(())
    }

    /// Set the service role key
    pub fn with_service_role_key(mut self, value: &str) -> Self {
        self.service_role_key = Some(value.to_string());
        self
    }

    /// Set the storage bucket
    pub fn with_storage_bucket(mut self, value: &str) -> Self {
        self.storage_bucket = value.to_string();
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the snapshot cache TTL
    pub fn with_snapshot_ttl(mut self, value: Duration) -> Self {
        self.snapshot_ttl = value;
        self
    }

    /// Set the snapshot cache capacity
    pub fn with_snapshot_capacity(mut self, value: usize) -> Self {
        self.snapshot_capacity = value;
        self
    }

    /// Set the public site URL
    pub fn with_site_url(mut self, value: &str) -> Self {
        self.site_url = Some(value.trim_end_matches('/').to_string());
        self
    }
}

fn required_var(name: &str) -> Result<String, Error> {
    optional_var(name).ok_or_else(|| Error::config(format!("{} is not set", name)))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
