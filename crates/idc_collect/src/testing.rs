//! In-memory connector and client used by the unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::{ClientError, ConnectParams, Connector, Query, QueryClient, QueryResponse};

type Responder = dyn Fn(&Query) -> Result<QueryResponse, ClientError> + Send + Sync;

/// Counts connects, closes and queries; answers queries from a closure
pub(crate) struct FakeConnector {
    connects: AtomicUsize,
    closes: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<Query>>>,
    responder: Arc<Responder>,
    connect_delay: Option<Duration>,
    fail_connect: bool,
    fail_close: bool,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self {
            connects: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            queries: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(|_| Ok(QueryResponse::default())),
            connect_delay: None,
            fail_connect: false,
            fail_close: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_connect: true,
            ..Self::new()
        }
    }

    pub(crate) fn responding<F>(responder: F) -> Self
    where
        F: Fn(&Query) -> Result<QueryResponse, ClientError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            ..Self::new()
        }
    }

    pub(crate) fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub(crate) fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn QueryClient>, ClientError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_connect {
            return Err(ClientError::InvalidAddress {
                address: params.address.clone(),
                reason: "refused by fake".to_string(),
            });
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeClient {
            closes: Arc::clone(&self.closes),
            queries: Arc::clone(&self.queries),
            responder: Arc::clone(&self.responder),
            fail_close: self.fail_close,
        }))
    }
}

struct FakeClient {
    closes: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<Query>>>,
    responder: Arc<Responder>,
    fail_close: bool,
}

#[async_trait]
impl QueryClient for FakeClient {
    async fn query(&self, query: &Query) -> Result<QueryResponse, ClientError> {
        self.queries.lock().unwrap().push(query.clone());
        (self.responder)(query)
    }

    async fn close(&self) -> Result<(), ClientError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            Err(ClientError::Http("close failed".to_string()))
        } else {
            Ok(())
        }
    }
}
