use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use supafolio::auth::SignUpOutcome;
use supafolio::config::FolioConfig;
use supafolio::model::SectionKey;
use supafolio::routes::Route;
use supafolio::Folio;

fn access_token(sub: &str) -> String {
    encode(
        &Header::default(),
        &json!({ "sub": sub, "exp": 4_000_000_000i64 }),
        &EncodingKey::from_secret(b"secret"),
    )
    .unwrap()
}

async fn mount_empty_tables(server: &MockServer) {
    for table in ["account", "content", "setting"] {
        Mock::given(method("GET"))
            .and(path(format!("/rest/v1/{}", table)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/rest/v1/{}", table)))
            .respond_with(ResponseTemplate::new(201))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_code_callback_provisions_and_redirects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "pkce"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token("u1"),
            "refresh_token": "refresh",
            "user": {
                "id": "u1",
                "email": "john@example.com",
                "user_metadata": { "full_name": "John Doe" }
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_empty_tables(&mock_server).await;

    let folio = Folio::new(FolioConfig::new(&mock_server.uri(), "anon")).unwrap();
    let outcome = folio
        .complete_sign_in("?code=one-time&next=%2Fdashboard%2Fwork")
        .await;

    assert_eq!(outcome.redirect, Route::Dashboard(SectionKey::Work));
    assert_eq!(outcome.session.unwrap().refresh_token, "refresh");

    let requests = mock_server.received_requests().await.unwrap();
    let setting_insert = requests
        .iter()
        .find(|r| r.url.path() == "/rest/v1/setting" && !r.body.is_empty())
        .expect("setting row inserted");
    let body: Value = serde_json::from_slice(&setting_insert.body).unwrap();
    assert_eq!(body["domain"], "johndoe");
    assert_eq!(body["preferences"]["template"], "minimal");

    let content_insert = requests
        .iter()
        .find(|r| r.url.path() == "/rest/v1/content" && !r.body.is_empty())
        .expect("content rows inserted");
    let rows: Value = serde_json::from_slice(&content_insert.body).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_failed_exchange_returns_to_login() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Code has expired"
        })))
        .mount(&mock_server)
        .await;

    let folio = Folio::new(FolioConfig::new(&mock_server.uri(), "anon")).unwrap();
    let outcome = folio.complete_sign_in("code=stale").await;

    assert_eq!(
        outcome.redirect,
        Route::Login {
            error: Some("Code has expired".into())
        }
    );
    assert!(outcome.session.is_none());

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| !r.url.path().starts_with("/rest/")));
}

#[tokio::test]
async fn test_dashboard_requires_a_decodable_token() {
    let folio = Folio::new(FolioConfig::new("http://localhost:54321", "anon")).unwrap();

    assert!(folio.dashboard("not-a-token").is_err());
    let dashboard = folio.dashboard(&access_token("u1")).unwrap();
    assert_eq!(dashboard.account_id(), "u1");
}

#[tokio::test]
async fn test_sign_up_redirects_to_callback_route() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(query_param("redirect_to", "https://folio.example/auth/callback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u2",
            "email": "jane@example.com"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config =
        FolioConfig::new(&mock_server.uri(), "anon").with_site_url("https://folio.example/");
    let folio = Folio::new(config).unwrap();

    let outcome = folio.sign_up("jane@example.com", "secret-password").await.unwrap();
    assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired { user: Some(_) }));
}

#[test]
fn test_missing_configuration_is_fatal() {
    let err = Folio::new(FolioConfig::new("", "anon")).err().unwrap();
    assert!(err.is_fatal());
}
