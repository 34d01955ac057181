//! Supafolio
//!
//! Backend of a portfolio builder on top of Supabase: signed-in users edit
//! their portfolio section by section on a dashboard, and published
//! portfolios are served read-only at `/{domain}`.

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod form;
pub mod mapper;
pub mod model;
pub mod portfolio;
pub mod postgrest;
pub mod routes;
pub mod schema;
pub mod storage;
pub mod store;

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

use crate::auth::{
    decode_claims, Auth, AuthCompletion, AuthOutcome, CallbackParams, Session, SessionSink, SignUpOutcome,
};
use crate::bootstrap::bootstrap;
use crate::config::FolioConfig;
use crate::dashboard::{Dashboard, SubmitRegistry};
use crate::error::Error;
use crate::form::{ImageTarget, SectionForm, SnapshotCache};
use crate::model::Account;
use crate::portfolio::Portfolio;
use crate::schema::Image;
use crate::storage::{image_path, FileOptions, StorageClient};
use crate::store::RestStore;

/// The main entry point, shared by every request of the host
pub struct Folio {
    config: FolioConfig,
    http_client: Client,
    auth: Auth,
    snapshots: Arc<SnapshotCache>,
    submits: Arc<SubmitRegistry>,
}

impl Folio {
    /// Create a new client from a validated configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use supafolio::{config::FolioConfig, Folio};
    ///
    /// # fn main() -> Result<(), supafolio::error::Error> {
    /// let config = FolioConfig::new("https://your-project-url.supabase.co", "your-anon-key");
    /// let folio = Folio::new(config)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: FolioConfig) -> Result<Self, Error> {
        config.validate()?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let auth = Auth::new(&config.supabase_url, &config.anon_key, http_client.clone());
        let snapshots = Arc::new(SnapshotCache::new(
            config.snapshot_ttl,
            config.snapshot_capacity,
        ));

        Ok(Self {
            config,
            http_client,
            auth,
            snapshots,
            submits: Arc::new(SubmitRegistry::new()),
        })
    }

    /// Create a client configured from the environment
    pub fn from_env() -> Result<Self, Error> {
        Self::new(FolioConfig::from_env()?)
    }

    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    /// Get a reference to the auth client
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Where the identity provider sends users back after confirming their
    /// email or signing in with a provider
    pub fn callback_url(&self) -> Option<String> {
        self.config
            .site_url
            .as_deref()
            .map(|site| format!("{}{}", site, routes::Route::Callback.path()))
    }

    /// Register a new user, asking the provider to redirect back to the
    /// callback route
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, Error> {
        let redirect = self.callback_url();
        self.auth.sign_up(email, password, redirect.as_deref()).await
    }

    /// Table access as the holder of `access_token`, or as the anon role
    pub fn store(&self, access_token: Option<&str>) -> RestStore {
        let store = RestStore::new(
            &self.config.supabase_url,
            &self.config.anon_key,
            self.http_client.clone(),
        );
        match access_token {
            Some(token) => store.with_auth(token),
            None => store,
        }
    }

    /// Table access with the service role, which bypasses row level security
    pub fn admin_store(&self) -> Result<RestStore, Error> {
        let key = self
            .config
            .service_role_key
            .as_deref()
            .ok_or_else(|| Error::config("Service role key is not configured"))?;
        Ok(RestStore::new(&self.config.supabase_url, key, self.http_client.clone()).with_auth(key))
    }

    /// Object storage acting as the holder of `access_token`
    pub fn storage(&self, access_token: &str) -> StorageClient {
        StorageClient::new(
            &self.config.supabase_url,
            &self.config.anon_key,
            self.http_client.clone(),
        )
        .with_auth(access_token)
    }

    /// Dashboard for the account owning `access_token`
    pub fn dashboard(&self, access_token: &str) -> Result<Dashboard, Error> {
        let claims = decode_claims(access_token).ok_or_else(|| Error::auth("Not logged in"))?;
        if claims.is_expired() {
            return Err(Error::auth("Session expired"));
        }
        Ok(Dashboard::new(
            &claims.sub,
            Arc::new(self.store(Some(access_token))),
            Arc::clone(&self.snapshots),
            Arc::clone(&self.submits),
        ))
    }

    /// Public portfolio served at `domain`
    pub async fn portfolio(&self, domain: &str) -> Result<Option<Portfolio>, Error> {
        portfolio::portfolio_by_domain(&self.store(None), domain).await
    }

    /// Complete the sign-in redirect described by `query`
    pub async fn complete_sign_in(&self, query: &str) -> AuthOutcome {
        AuthCompletion::start(CallbackParams::from_query(query))
            .run(&self.auth, self)
            .await
    }

    /// Upload an image picked in `form` and point the form at its public URL
    pub async fn upload_image(
        &self,
        access_token: &str,
        form: &mut SectionForm,
        target: ImageTarget,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Image, Error> {
        let path = image_path(form.account_id(), form.section(), file_name);
        let storage = self.storage(access_token);
        let stored = storage
            .from(&self.config.storage_bucket)
            .upload(
                &path,
                bytes,
                FileOptions::default().with_content_type(content_type),
            )
            .await?;

        let image = Image {
            src: stored.public_url,
            alt: file_name.to_string(),
            storage_path: stored.path,
        };
        form.push_image(target, image.clone())?;
        Ok(image)
    }

    /// Detach an image from `form` and delete its stored object, if any
    pub async fn remove_image(
        &self,
        access_token: &str,
        form: &mut SectionForm,
        target: ImageTarget,
        index: usize,
    ) -> Result<Image, Error> {
        let image = form.remove_image(target, index)?;
        if !image.storage_path.is_empty() {
            self.storage(access_token)
                .from(&self.config.storage_bucket)
                .remove(&[image.storage_path.clone()])
                .await?;
        }
        Ok(image)
    }

    async fn session_account(&self, session: &Session) -> Result<Account, Error> {
        match &session.user {
            Some(user) => Ok(user.to_account()),
            None => Ok(self.auth.get_user(&session.access_token).await?.to_account()),
        }
    }
}

#[async_trait]
impl SessionSink for Folio {
    /// Provision the account's rows. Cleanup of stale accounts needs the
    /// service role; without it the user's own token is used.
    async fn persist(&self, session: &Session) -> Result<(), Error> {
        let account = self.session_account(session).await?;
        let store = match self.admin_store() {
            Ok(store) => store,
            Err(_) => self.store(Some(&session.access_token)),
        };
        bootstrap(&store, &account).await?;
        Ok(())
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::auth::{Auth, Session};
    pub use crate::config::FolioConfig;
    pub use crate::dashboard::Dashboard;
    pub use crate::error::Error;
    pub use crate::form::{FormState, SectionForm};
    pub use crate::model::{SectionKey, TemplateId};
    pub use crate::portfolio::Portfolio;
    pub use crate::schema::SectionValue;
    pub use crate::Folio;
}
