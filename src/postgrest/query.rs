//! Query builders for PostgrestClient

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Error;
use crate::fetch::{Fetch, FetchBuilder, Service};
use crate::postgrest::filter::*;
use crate::postgrest::types::*;

/// Connection details shared by every builder
#[derive(Clone)]
pub(crate) struct Target {
    pub url: String,
    pub key: String,
    pub token: Option<String>,
    pub client: Client,
}

impl Target {
    fn authorize<'a>(&self, fetch: FetchBuilder<'a>) -> FetchBuilder<'a> {
        let fetch = fetch.api_key(&self.key);
        match &self.token {
            Some(token) => fetch.bearer_auth(token),
            None => fetch.bearer_auth(&self.key),
        }
    }
}

/// Column filters and modifiers, in the order they were added
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    params: Vec<(String, String)>,
}

impl QueryBuilder {
    /// Create a new QueryBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the query
    pub fn add_param(&mut self, key: &str, value: &str) {
        self.params.push((key.to_string(), value.to_string()));
    }

    /// Add a column filter
    pub fn filter(&mut self, column: &str, op: FilterOperator, value: &str) {
        self.add_param(column, &op.render(value));
    }

    /// Get the query parameters
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

macro_rules! filter_methods {
    () => {
        /// Filter rows where column equals a value
        pub fn eq(&mut self, column: &str, value: &str) -> &mut Self {
            self.query.filter(column, FilterOperator::Eq, value);
            self
        }
    };
}

/// Builder for SELECT queries
pub struct SelectBuilder {
    target: Target,
    query: QueryBuilder,
}

impl SelectBuilder {
    pub(crate) fn new(target: Target, columns: &str) -> Self {
        let mut query = QueryBuilder::new();
        query.add_param("select", columns);
        Self { target, query }
    }

    filter_methods!();

    /// Filter rows where column matches a pattern (case insensitive)
    pub fn ilike(&mut self, column: &str, pattern: &str) -> &mut Self {
        self.query.filter(column, FilterOperator::ILike, pattern);
        self
    }

    /// Order the results by a column; call again for secondary keys
    pub fn order(&mut self, column: &str, ascending: bool) -> &mut Self {
        let direction = if ascending { "asc" } else { "desc" };
        let term = format!("{}.{}", column, direction);
        match self.query.params.iter_mut().find(|(k, _)| k == "order") {
            Some((_, existing)) => {
                existing.push(',');
                existing.push_str(&term);
            }
            None => self.query.add_param("order", &term),
        }
        self
    }

    /// Limit the number of rows returned
    pub fn limit(&mut self, count: usize) -> &mut Self {
        self.query.add_param("limit", &count.to_string());
        self
    }

    /// Execute the query and return the rows
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>, Error> {
        let fetch = Fetch::get(&self.target.client, &self.target.url, Service::Database)
            .query(self.query.params().iter().cloned());
        self.target.authorize(fetch).execute::<Vec<T>>().await
    }

    /// Execute the query and return the first row
    pub async fn execute_one<T: DeserializeOwned>(&mut self) -> Result<Option<T>, Error> {
        self.limit(1);
        let rows = self.execute::<T>().await?;
        Ok(rows.into_iter().next())
    }
}

/// Builder for UPSERT queries
pub struct UpsertBuilder<T: Serialize> {
    target: Target,
    values: T,
    on_conflict: Option<String>,
    resolution: Resolution,
}

impl<T: Serialize> UpsertBuilder<T> {
    pub(crate) fn new(target: Target, values: T) -> Self {
        Self {
            target,
            values,
            on_conflict: None,
            resolution: Resolution::MergeDuplicates,
        }
    }

    /// Specify the column(s) to check for conflicts
    pub fn on_conflict(&mut self, columns: &str) -> &mut Self {
        self.on_conflict = Some(columns.to_string());
        self
    }

    /// Choose whether an existing row is overwritten or kept
    pub fn resolution(&mut self, resolution: Resolution) -> &mut Self {
        self.resolution = resolution;
        self
    }

    fn fetch(&self, returning: ReturnOption) -> Result<FetchBuilder<'_>, Error> {
        let prefer = format!("{},{}", self.resolution.as_str(), returning.as_str());
        let mut fetch = Fetch::post(&self.target.client, &self.target.url, Service::Database)
            .header("Prefer", &prefer);
        if let Some(columns) = &self.on_conflict {
            fetch = fetch.query([("on_conflict", columns.as_str())]);
        }
        self.target.authorize(fetch).json(&self.values)
    }

    /// Execute the upsert and return the written rows
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<R, Error> {
        self.fetch(ReturnOption::Representation)?.execute::<R>().await
    }

    /// Execute the upsert without returning data
    pub async fn execute_no_return(&self) -> Result<(), Error> {
        self.fetch(ReturnOption::Minimal)?.execute_empty().await
    }
}

/// Builder for UPDATE queries
pub struct UpdateBuilder<T: Serialize> {
    target: Target,
    values: T,
    query: QueryBuilder,
}

impl<T: Serialize> UpdateBuilder<T> {
    pub(crate) fn new(target: Target, values: T) -> Self {
        Self {
            target,
            values,
            query: QueryBuilder::new(),
        }
    }

    filter_methods!();

    /// Execute the update and return the updated rows
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<Vec<R>, Error> {
        let fetch = Fetch::patch(&self.target.client, &self.target.url, Service::Database)
            .header("Prefer", ReturnOption::Representation.as_str())
            .query(self.query.params().iter().cloned());
        self.target
            .authorize(fetch)
            .json(&self.values)?
            .execute::<Vec<R>>()
            .await
    }
}

/// Builder for calls to database functions
pub struct RpcBuilder<T: Serialize> {
    target: Target,
    params: T,
}

impl<T: Serialize> RpcBuilder<T> {
    pub(crate) fn new(target: Target, params: T) -> Self {
        Self { target, params }
    }

    /// Execute the call and return the function's result
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<R, Error> {
        let fetch = Fetch::post(&self.target.client, &self.target.url, Service::Database);
        self.target
            .authorize(fetch)
            .json(&self.params)?
            .execute::<R>()
            .await
    }

    /// Execute the call, discarding any result
    pub async fn execute_no_return(&self) -> Result<(), Error> {
        let fetch = Fetch::post(&self.target.client, &self.target.url, Service::Database)
            .header("Prefer", ReturnOption::Minimal.as_str());
        self.target
            .authorize(fetch)
            .json(&self.params)?
            .execute_empty()
            .await
    }
}
