use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use stampede_http::{HttpClient, HttpRequest, HttpTransportErrorKind};

/// Status recorded when no HTTP response was received at all.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: HttpTransportErrorKind,
    pub message: String,
}

/// Result of one request: an HTTP response of any status, or a transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub status: u16,
    /// Wall clock from dispatch until the full body was read (or the failure surfaced).
    pub latency: Duration,
    pub body: Bytes,
    pub failure: Option<TransportFailure>,
}

impl RequestOutcome {
    pub fn response(status: u16, latency: Duration, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            latency,
            body: body.into(),
            failure: None,
        }
    }

    pub fn transport_failure(
        kind: HttpTransportErrorKind,
        message: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            status: TRANSPORT_FAILURE_STATUS,
            latency,
            body: Bytes::new(),
            failure: Some(TransportFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    #[must_use]
    pub fn is_transport_failure(&self) -> bool {
        self.status == TRANSPORT_FAILURE_STATUS || self.failure.is_some()
    }
}

/// Issues a single request. Implementations never fail: every error becomes a
/// transport-failure outcome, and nothing is retried.
pub trait HttpExecutor: Send + Sync + 'static {
    fn execute(&self, req: HttpRequest) -> impl Future<Output = RequestOutcome> + Send;
}

impl HttpExecutor for HttpClient {
    fn execute(&self, req: HttpRequest) -> impl Future<Output = RequestOutcome> + Send {
        async move {
            let method = req.method.clone();
            let url = req.url.clone();
            let started = std::time::Instant::now();
            let res = self.request(req).await;
            let latency = started.elapsed();

            match res {
                Ok(res) => RequestOutcome::response(res.status, latency, res.body),
                Err(err) => {
                    let kind = err.transport_error_kind();
                    tracing::debug!(%method, %url, %kind, error = %err, "request failed");
                    RequestOutcome::transport_failure(kind, err.to_string(), latency)
                }
            }
        }
    }
}
