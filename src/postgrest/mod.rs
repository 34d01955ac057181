//! Database operations through the PostgREST API

mod filter;
mod query;
mod types;

use reqwest::Client;
use serde::Serialize;

use query::Target;

pub use filter::*;
pub use query::*;
pub use types::*;

/// Client for one table
pub struct PostgrestClient {
    target: Target,
}

impl PostgrestClient {
    /// Create a new PostgrestClient
    pub fn new(url: &str, key: &str, table: &str, client: Client) -> Self {
        Self {
            target: Target {
                url: format!("{}/rest/v1/{}", url.trim_end_matches('/'), table),
                key: key.to_string(),
                token: None,
                client,
            },
        }
    }

    /// Send requests as the holder of `token` instead of the anon role
    pub fn with_auth(mut self, token: &str) -> Self {
        self.target.token = Some(token.to_string());
        self
    }

    /// Select specific columns from the table
    pub fn select(&self, columns: &str) -> SelectBuilder {
        SelectBuilder::new(self.target.clone(), columns)
    }

    /// Upsert rows (insert, or resolve on the conflict target)
    pub fn upsert<T: Serialize>(&self, values: T) -> UpsertBuilder<T> {
        UpsertBuilder::new(self.target.clone(), values)
    }

    /// Update rows matching the filters
    pub fn update<T: Serialize>(&self, values: T) -> UpdateBuilder<T> {
        UpdateBuilder::new(self.target.clone(), values)
    }

    /// Call the database function this client points at, as in
    /// `PostgrestClient::new(url, key, "rpc/my_function", client)`
    pub fn rpc<T: Serialize>(&self, params: T) -> RpcBuilder<T> {
        RpcBuilder::new(self.target.clone(), params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{body_json, header, headers, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_select_with_filters_and_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/setting"))
            .and(query_param("select", "*"))
            .and(query_param("domain", "ilike.johndoe"))
            .and(query_param("order", "created_at.asc,account_id.asc"))
            .and(header("apikey", "anon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "account_id": "a1", "domain": "johndoe" }
            ])))
            .mount(&mock_server)
            .await;

        let client = PostgrestClient::new(&mock_server.uri(), "anon", "setting", Client::new());
        let rows: Vec<Value> = client
            .select("*")
            .ilike("domain", "johndoe")
            .order("created_at", true)
            .order("account_id", true)
            .execute()
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["account_id"], "a1");
    }

    #[tokio::test]
    async fn test_upsert_sends_conflict_target() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/content"))
            .and(query_param("on_conflict", "account_id,section"))
            .and(headers("Prefer", vec!["resolution=ignore-duplicates", "return=minimal"]))
            .and(header("Authorization", "Bearer user-token"))
            .and(body_json(json!([{ "account_id": "a1", "section": "work" }])))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = PostgrestClient::new(&mock_server.uri(), "anon", "content", Client::new())
            .with_auth("user-token");
        client
            .upsert(json!([{ "account_id": "a1", "section": "work" }]))
            .on_conflict("account_id,section")
            .resolution(Resolution::IgnoreDuplicates)
            .execute_no_return()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_message_is_kept() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/setting"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint \"setting_domain_key\""
            })))
            .mount(&mock_server)
            .await;

        let client = PostgrestClient::new(&mock_server.uri(), "anon", "setting", Client::new());
        let err = client
            .update(json!({ "domain": "taken" }))
            .eq("account_id", "a1")
            .execute::<Value>()
            .await
            .unwrap_err();

        assert!(err.user_message().contains("setting_domain_key"));
    }

    #[tokio::test]
    async fn test_rpc_posts_params() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/domain_taken"))
            .and(body_json(json!({ "domain": "johndoe" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
            .mount(&mock_server)
            .await;

        let client =
            PostgrestClient::new(&mock_server.uri(), "anon", "rpc/domain_taken", Client::new());
        let taken: bool = client
            .rpc(json!({ "domain": "johndoe" }))
            .execute()
            .await
            .unwrap();

        assert!(taken);
    }
}
