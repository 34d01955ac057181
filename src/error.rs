//! Error handling for the portfolio backend

use std::fmt;
use thiserror::Error;

use crate::schema::FieldErrors;

/// Message shown when an upstream failure carries nothing worth surfacing
pub const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

/// Unified error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Identity provider errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Relational store errors
    #[error("Database error: {0}")]
    Database(String),

    /// Object storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Missing or invalid backend wiring
    #[error("Configuration error: {0}")]
    Config(String),

    /// A section payload failed validation
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(FieldErrors),

    /// A field path that does not exist in the section being edited
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// A save for the same section is already running
    #[error("A save for {0} is already in progress")]
    SubmitInProgress(String),

    /// A row the operation depends on does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new database error
    pub fn database<T: fmt::Display>(msg: T) -> Self {
        Error::Database(msg.to_string())
    }

    /// Create a new storage error
    pub fn storage<T: fmt::Display>(msg: T) -> Self {
        Error::Storage(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new not-found error
    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Error::NotFound(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// The single message shown to the user for this error.
    ///
    /// Upstream failures surface the message the collaborator returned;
    /// anything else (transport, decoding, configuration) falls back to a
    /// generic message so internals never reach the page.
    pub fn user_message(&self) -> String {
        match self {
            Error::Auth(msg)
            | Error::Database(msg)
            | Error::Storage(msg)
            | Error::NotFound(msg)
                if !msg.trim().is_empty() =>
            {
                msg.clone()
            }
            Error::Validation(_) => "Please fix the highlighted fields.".to_string(),
            Error::SubmitInProgress(section) => {
                format!("{} is already being saved.", section)
            }
            _ => GENERIC_MESSAGE.to_string(),
        }
    }

    /// Whether this error must abort the request as a server fault
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// HTTP status the host should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config(_) => 500,
            Error::Validation(_) | Error::InvalidField(_) => 422,
            Error::SubmitInProgress(_) => 409,
            Error::NotFound(_) => 404,
            Error::Auth(_) | Error::Jwt(_) => 401,
            _ => 502,
        }
    }
}
