//! Client for the hosted identity provider

mod callback;
mod session;
mod types;

use reqwest::Client;
use serde_json::{json, Value};

use crate::error::Error;
use crate::fetch::{Fetch, Service};

pub use callback::*;
pub use session::*;
pub use types::*;

/// Client for Supabase Authentication
///
/// Sessions are not held here: every call that needs one takes the
/// access token the host read from its cookie.
#[derive(Clone)]
pub struct Auth {
    /// The base URL for the Supabase project
    url: String,

    /// The anonymous API key for the Supabase project
    key: String,

    /// HTTP client used for requests
    client: Client,
}

impl Auth {
    /// Create a new Auth client
    pub fn new(url: &str, key: &str, client: Client) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            client,
        }
    }

    fn get_auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    /// Sign in a user with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, Error> {
        let url = self.get_auth_url("/token");

        let session = Fetch::post(&self.client, &url, Service::Auth)
            .api_key(&self.key)
            .query([("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))?
            .execute::<Session>()
            .await?;

        log::info!("signed in {}", email);
        Ok(session)
    }

    /// Sign up a new user with email and password.
    ///
    /// `redirect_to` is where the confirmation link lands, normally the
    /// callback route of the site.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: Option<&str>,
    ) -> Result<SignUpOutcome, Error> {
        let url = self.get_auth_url("/signup");

        let mut request = Fetch::post(&self.client, &url, Service::Auth)
            .api_key(&self.key)
            .json(&json!({ "email": email, "password": password }))?;
        if let Some(redirect_to) = redirect_to {
            request = request.query([("redirect_to", redirect_to)]);
        }
        let body = request.execute::<Value>().await?;

        if body.get("access_token").is_some() {
            return Ok(SignUpOutcome::Session(serde_json::from_value(body)?));
        }

        let user = body
            .get("user")
            .cloned()
            .or_else(|| body.get("id").map(|_| body.clone()))
            .and_then(|user| serde_json::from_value::<User>(user).ok());
        log::info!("sign up for {} awaits email confirmation", email);
        Ok(SignUpOutcome::ConfirmationRequired { user })
    }

    /// Sign out the session holding `access_token`
    pub async fn sign_out(&self, access_token: &str) -> Result<(), Error> {
        let url = self.get_auth_url("/logout");

        Fetch::post(&self.client, &url, Service::Auth)
            .api_key(&self.key)
            .bearer_auth(access_token)
            .execute_empty()
            .await
    }

    /// Exchange a one-time authorization code for a session
    pub async fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Session, Error> {
        let url = self.get_auth_url("/token");

        Fetch::post(&self.client, &url, Service::Auth)
            .api_key(&self.key)
            .query([("grant_type", "pkce")])
            .json(&json!({ "auth_code": code, "code_verifier": code_verifier }))?
            .execute::<Session>()
            .await
    }

    /// Get the user owning `access_token`
    pub async fn get_user(&self, access_token: &str) -> Result<User, Error> {
        let url = self.get_auth_url("/user");

        Fetch::get(&self.client, &url, Service::Auth)
            .api_key(&self.key)
            .bearer_auth(access_token)
            .execute::<User>()
            .await
    }

    /// Best-effort lookup of the signed-in user.
    ///
    /// A missing token, an expired one, or any provider failure all yield
    /// `None`; the caller renders the signed-out view.
    pub async fn current_user(&self, access_token: Option<&str>) -> Option<User> {
        let token = access_token?;
        if decode_claims(token)?.is_expired() {
            return None;
        }
        match self.get_user(token).await {
            Ok(user) => Some(user),
            Err(err) => {
                log::debug!("current user lookup failed: {}", err);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_token(claims: Value) -> String {
    session::tests::token(claims)
}
