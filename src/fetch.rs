//! HTTP helper for requests to the Supabase services

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method, RequestBuilder, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::Error;

/// Value sent in the `X-Client-Info` header
pub const CLIENT_INFO: &str = concat!("supafolio/", env!("CARGO_PKG_VERSION"));

/// Which collaborator a request talks to; decides the error variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Auth,
    Database,
    Storage,
}

/// Helper for building and executing HTTP requests
pub struct FetchBuilder<'a> {
    client: &'a Client,
    url: String,
    method: Method,
    service: Service,
    headers: HeaderMap,
    query_params: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl<'a> FetchBuilder<'a> {
    /// Create a new FetchBuilder
    pub fn new(client: &'a Client, url: &str, method: Method, service: Service) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("X-Client-Info", HeaderValue::from_static(CLIENT_INFO));

        Self {
            client,
            url: url.to_string(),
            method,
            service,
            headers,
            query_params: Vec::new(),
            body: None,
        }
    }

    /// Add a header to the request, replacing any previous value
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Send the project API key
    pub fn api_key(self, key: &str) -> Self {
        self.header("apikey", key)
    }

    /// Add bearer token authentication to the request
    pub fn bearer_auth(self, token: &str) -> Self {
        self.header("Authorization", &format!("Bearer {}", token))
    }

    /// Append query parameters to the request
    pub fn query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, Error> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Add a raw body with its content type
    pub fn bytes(mut self, body: Vec<u8>, content_type: &str) -> Self {
        self.body = Some(body);
        self.header("Content-Type", content_type)
    }

    fn build(&self) -> Result<RequestBuilder, Error> {
        let mut url = Url::parse(&self.url)?;

        if !self.query_params.is_empty() {
            let mut query_pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                query_pairs.append_pair(key, value);
            }
        }

        let mut req = self.client.request(self.method.clone(), url.as_str());
        req = req.headers(self.headers.clone());

        if let Some(body) = &self.body {
            req = req.body(body.clone());
        }

        Ok(req)
    }

    /// Execute the request and parse the response as JSON
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let response = self.send().await?;
        let result = response.json::<T>().await?;
        Ok(result)
    }

    /// Execute the request, checking the status and discarding the body
    pub async fn execute_empty(&self) -> Result<(), Error> {
        self.send().await?;
        Ok(())
    }

    /// Execute the request and return the raw response without a status check
    pub async fn execute_raw(&self) -> Result<Response, Error> {
        let req = self.build()?;
        Ok(req.send().await?)
    }

    async fn send(&self) -> Result<Response, Error> {
        let response = self.execute_raw().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let err = upstream_error(self.service, status, &text);
        log::error!("{} {} failed with {}: {}", self.method, self.url, status, err);
        Err(err)
    }
}

/// Map a failed upstream response to an error, keeping the upstream message
pub fn upstream_error(service: Service, status: StatusCode, body: &str) -> Error {
    let message = upstream_message(body)
        .unwrap_or_else(|| format!("Request failed with status {}", status));
    match service {
        Service::Auth => Error::auth(message),
        Service::Database => Error::database(message),
        Service::Storage => Error::storage(message),
    }
}

/// Pull the human-readable message out of a Supabase error body
pub fn upstream_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|msg| !msg.is_empty())
        .map(str::to_string)
}

/// Helper for creating HTTP requests
pub struct Fetch;

impl Fetch {
    /// Create a GET request
    pub fn get<'a>(client: &'a Client, url: &str, service: Service) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::GET, service)
    }

    /// Create a POST request
    pub fn post<'a>(client: &'a Client, url: &str, service: Service) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::POST, service)
    }

    /// Create a PATCH request
    pub fn patch<'a>(client: &'a Client, url: &str, service: Service) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::PATCH, service)
    }

    /// Create a DELETE request
    pub fn delete<'a>(client: &'a Client, url: &str, service: Service) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::DELETE, service)
    }
}
