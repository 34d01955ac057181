//! Completion of a sign-in redirect
//!
//! The identity provider sends the browser back with either a one-time
//! code or a token pair. [`AuthCompletion`] walks that through exchange,
//! persistence and the final redirect, one state at a time.

use async_trait::async_trait;
use url::form_urlencoded;

use super::session::Session;
use super::Auth;
use crate::error::Error;
use crate::routes::{post_login_route, Route};

const MISSING_CODE: &str = "Missing authorization code";

/// Query parameters of the callback request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub next: Option<String>,
}

impl CallbackParams {
    /// Parse a query (or fragment) string; empty values count as absent
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        let query = query.trim_start_matches(['?', '#']);
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "code" => params.code = Some(value),
                "code_verifier" => params.code_verifier = Some(value),
                "access_token" => params.access_token = Some(value),
                "refresh_token" => params.refresh_token = Some(value),
                "expires_at" => params.expires_at = value.parse().ok(),
                "error" => params.error = Some(value),
                "error_description" => params.error_description = Some(value),
                "next" => params.next = Some(value),
                _ => {}
            }
        }
        params
    }
}

/// Where a session goes once the provider hands it over.
///
/// `persist` runs once per successful completion; it stores the session
/// for the browser and provisions the account's rows.
#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn persist(&self, session: &Session) -> Result<(), Error>;
}

/// One state of the callback flow
#[derive(Debug, Clone, PartialEq)]
pub enum AuthCompletion {
    AwaitingCode(CallbackParams),
    ExchangingCode {
        code: String,
        code_verifier: Option<String>,
        next: Option<String>,
    },
    PersistingSession {
        session: Session,
        next: Option<String>,
    },
    Redirecting {
        to: Route,
        session: Session,
    },
    Failed {
        reason: String,
    },
}

/// Final result of the flow
#[derive(Debug, Clone, PartialEq)]
pub struct AuthOutcome {
    pub redirect: Route,
    pub session: Option<Session>,
}

impl AuthCompletion {
    pub fn start(params: CallbackParams) -> Self {
        AuthCompletion::AwaitingCode(params)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuthCompletion::Redirecting { .. } | AuthCompletion::Failed { .. }
        )
    }

    /// Take one step. Terminal states return themselves.
    pub async fn advance(self, auth: &Auth, sink: &dyn SessionSink) -> AuthCompletion {
        match self {
            AuthCompletion::AwaitingCode(params) => Self::read_params(params),
            AuthCompletion::ExchangingCode {
                code,
                code_verifier,
                next,
            } => match auth
                .exchange_code_for_session(&code, code_verifier.as_deref())
                .await
            {
                Ok(session) => AuthCompletion::PersistingSession { session, next },
                Err(err) => {
                    log::warn!("code exchange failed: {}", err);
                    AuthCompletion::Failed {
                        reason: err.user_message(),
                    }
                }
            },
            AuthCompletion::PersistingSession { session, next } => {
                match sink.persist(&session).await {
                    Ok(()) => AuthCompletion::Redirecting {
                        to: post_login_route(next.as_deref()),
                        session,
                    },
                    Err(err) => {
                        log::error!("persisting session failed: {}", err);
                        AuthCompletion::Failed {
                            reason: err.user_message(),
                        }
                    }
                }
            }
            terminal => terminal,
        }
    }

    fn read_params(params: CallbackParams) -> AuthCompletion {
        if let Some(error) = params.error {
            return AuthCompletion::Failed {
                reason: params.error_description.unwrap_or(error),
            };
        }
        if let Some(code) = params.code {
            return AuthCompletion::ExchangingCode {
                code,
                code_verifier: params.code_verifier,
                next: params.next,
            };
        }
        match (params.access_token, params.refresh_token) {
            (Some(access_token), Some(refresh_token)) => AuthCompletion::PersistingSession {
                session: Session::from_tokens(&access_token, &refresh_token, params.expires_at),
                next: params.next,
            },
            _ => AuthCompletion::Failed {
                reason: MISSING_CODE.to_string(),
            },
        }
    }

    /// Drive the flow to a terminal state
    pub async fn run(self, auth: &Auth, sink: &dyn SessionSink) -> AuthOutcome {
        let mut state = self;
        while !state.is_terminal() {
            state = state.advance(auth, sink).await;
        }
        match state {
            AuthCompletion::Redirecting { to, session } => AuthOutcome {
                redirect: to,
                session: Some(session),
            },
            AuthCompletion::Failed { reason } => AuthOutcome {
                redirect: Route::Login {
                    error: Some(reason),
                },
                session: None,
            },
            _ => AuthOutcome {
                redirect: Route::Login { error: None },
                session: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_token;
    use crate::model::SectionKey;
    use reqwest::Client;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct CountingSink {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SessionSink for CountingSink {
        async fn persist(&self, _session: &Session) -> Result<(), Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::database("permission denied for table account"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_params_from_query() {
        let params = CallbackParams::from_query("?code=abc&next=%2Fdashboard%2Fwork&error=");
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.next.as_deref(), Some("/dashboard/work"));
        assert!(params.error.is_none());
    }

    #[tokio::test]
    async fn test_code_is_exchanged_and_persisted_once() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "pkce"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": test_token(json!({ "sub": "u1" })),
                "refresh_token": "refresh"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let auth = Auth::new(&mock_server.uri(), "anon", Client::new());
        let sink = CountingSink::default();
        let params = CallbackParams::from_query("code=abc&next=/dashboard/writing");

        let outcome = AuthCompletion::start(params).run(&auth, &sink).await;

        assert_eq!(outcome.redirect, Route::Dashboard(SectionKey::Writing));
        assert_eq!(outcome.session.unwrap().refresh_token, "refresh");
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_error_goes_back_to_login() {
        let auth = Auth::new("http://localhost:1", "anon", Client::new());
        let sink = CountingSink::default();
        let params = CallbackParams::from_query("error=access_denied&error_description=Link+expired");

        let outcome = AuthCompletion::start(params).run(&auth, &sink).await;

        assert_eq!(
            outcome.redirect,
            Route::Login {
                error: Some("Link expired".into())
            }
        );
        assert!(outcome.session.is_none());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_code_fails() {
        let auth = Auth::new("http://localhost:1", "anon", Client::new());
        let sink = CountingSink::default();

        let state = AuthCompletion::start(CallbackParams::default())
            .advance(&auth, &sink)
            .await;

        assert_eq!(
            state,
            AuthCompletion::Failed {
                reason: MISSING_CODE.into()
            }
        );
    }

    #[tokio::test]
    async fn test_token_pair_skips_exchange() {
        let auth = Auth::new("http://localhost:1", "anon", Client::new());
        let sink = CountingSink::default();
        let query = format!(
            "access_token={}&refresh_token=r&expires_at=99",
            test_token(json!({ "sub": "u1" }))
        );

        let outcome = AuthCompletion::start(CallbackParams::from_query(&query))
            .run(&auth, &sink)
            .await;

        assert_eq!(outcome.redirect, Route::Dashboard(SectionKey::Profile));
        assert_eq!(outcome.session.unwrap().expires_at, Some(99));
    }

    #[tokio::test]
    async fn test_persist_failure_reports_message() {
        let auth = Auth::new("http://localhost:1", "anon", Client::new());
        let sink = CountingSink {
            fail: true,
            ..Default::default()
        };
        let query = format!("access_token={}&refresh_token=r", test_token(json!({ "sub": "u1" })));

        let outcome = AuthCompletion::start(CallbackParams::from_query(&query))
            .run(&auth, &sink)
            .await;

        assert_eq!(
            outcome.redirect,
            Route::Login {
                error: Some("permission denied for table account".into())
            }
        );
    }
}
