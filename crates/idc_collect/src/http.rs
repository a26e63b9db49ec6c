//! HTTP client for the InfluxDB 1.x query API

use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::client::{ClientError, ConnectParams, Connector, Query, QueryClient, QueryResponse};

/// Builds [`HttpClient`]s
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    timeout: Option<Duration>,
}

impl HttpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every query issued by clients from this connector
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn QueryClient>, ClientError> {
        let client = HttpClient::new(params, self.timeout)?;
        Ok(Arc::new(client))
    }
}

/// Client bound to one endpoint and credential set
pub struct HttpClient {
    query_url: Url,
    username: String,
    password: String,
    timeout: Option<Duration>,
    client: reqwest::Client,
    closed: AtomicBool,
}

impl HttpClient {
    /// Validate the address and build the underlying HTTP client.
    ///
    /// No request is made here.
    pub fn new(params: &ConnectParams, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let query_url = query_url(&params.address)?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Http(e.to_string()))?;

        Ok(Self {
            query_url,
            username: params.username.clone(),
            password: params.password.clone(),
            timeout,
            client,
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn map_send_error(&self, err: reqwest::Error) -> ClientError {
        match self.timeout {
            Some(timeout) if err.is_timeout() => ClientError::Timeout(timeout),
            _ => ClientError::Http(err.to_string()),
        }
    }
}

#[async_trait]
impl QueryClient for HttpClient {
    async fn query(&self, query: &Query) -> Result<QueryResponse, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        debug!(url = %self.query_url, database = %query.database, "Issuing query");

        let response = self
            .client
            .get(self.query_url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .query(&[
                ("db", query.database.as_str()),
                ("q", query.command.as_str()),
                ("epoch", query.precision.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        // Error statuses usually still carry a JSON body with an "error" field
        match serde_json::from_str::<QueryResponse>(&body) {
            Ok(decoded) => Ok(decoded),
            Err(_) if !status.is_success() => Err(ClientError::Status {
                status: status.as_u16(),
                body,
            }),
            Err(e) => Err(ClientError::Decode(e.to_string())),
        }
    }

    async fn close(&self) -> Result<(), ClientError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(ClientError::Closed);
        }
        Ok(())
    }
}

/// `{address}/query`, keeping any path prefix of the address
fn query_url(address: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    let mut url = Url::parse(address).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported protocol scheme: {other}"))),
    }

    url.path_segments_mut()
        .map_err(|()| invalid("address cannot be a base URL".to_string()))?
        .pop_if_empty()
        .push("query");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(address: &str) -> ConnectParams {
        ConnectParams::new(address, "admin", "secret")
    }

    #[test]
    fn test_query_url() {
        assert_eq!(
            query_url("http://localhost:8086").unwrap().as_str(),
            "http://localhost:8086/query"
        );
        assert_eq!(
            query_url("https://db.example.com/influx/").unwrap().as_str(),
            "https://db.example.com/influx/query"
        );
    }

    #[test]
    fn test_query_url_rejects_bad_addresses() {
        assert!(matches!(
            query_url("localhost:8086"),
            Err(ClientError::InvalidAddress { .. })
        ));
        assert!(matches!(
            query_url("udp://localhost:8089"),
            Err(ClientError::InvalidAddress { ref reason, .. }) if reason.contains("udp")
        ));
        assert!(query_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_connector_rejects_invalid_address() {
        let connector = HttpConnector::new();
        let result = connector.connect(&params("ftp://db")).await;
        assert!(matches!(result, Err(ClientError::InvalidAddress { .. })));
    }

    #[tokio::test]
    async fn test_closed_client_refuses_queries() {
        let client = HttpClient::new(&params("http://127.0.0.1:8086"), None).unwrap();
        client.close().await.unwrap();
        assert!(client.is_closed());

        let result = client.query(&Query::new("SELECT 1", "db")).await;
        assert!(matches!(result, Err(ClientError::Closed)));
        assert!(matches!(client.close().await, Err(ClientError::Closed)));
    }

    #[test]
    fn test_with_timeout() {
        let connector = HttpConnector::new().with_timeout(Some(Duration::from_secs(5)));
        assert_eq!(connector.timeout, Some(Duration::from_secs(5)));
        let client =
            HttpClient::new(&params("http://localhost:8086"), connector.timeout).unwrap();
        assert_eq!(client.timeout, Some(Duration::from_secs(5)));
    }
}
