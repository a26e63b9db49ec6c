//! Database client seam
//!
//! The collector never talks to the wire directly. A [`Connector`] builds a
//! [`QueryClient`] for one endpoint and credential set; the pool caches the
//! result per [`ConnectionKey`].

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::value::ColumnValue;

/// Timestamp precision requested from the database
pub const PRECISION_NS: &str = "ns";

/// Client-level errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Client is closed")]
    Closed,
}

/// Endpoint and credentials for one connection
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub address: String,
    pub username: String,
    pub password: String,
}

impl ConnectParams {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn key(&self) -> ConnectionKey {
        ConnectionKey {
            address: self.address.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Identity of a pooled connection: endpoint plus credentials
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    address: String,
    username: String,
    password: String,
}

impl fmt::Debug for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.address)
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A query against one database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub command: String,
    pub database: String,
    pub precision: String,
}

impl Query {
    pub fn new(command: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            database: database.into(),
            precision: PRECISION_NS.to_string(),
        }
    }
}

/// Body of a query response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    #[serde(default)]
    pub error: Option<String>,
}

impl QueryResponse {
    /// The response-level error, or the first statement error
    pub fn error(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.results.iter().find_map(|r| r.error.as_deref()))
    }
}

/// Result of one statement in the query
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub statement_id: u32,
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A named table of rows
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<ColumnValue>>,
}

/// A live client for one endpoint
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Execute a query
    async fn query(&self, query: &Query) -> Result<QueryResponse, ClientError>;

    /// Release the client's resources
    async fn close(&self) -> Result<(), ClientError>;
}

/// Builds clients for the pool
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn QueryClient>, ClientError>;
}
