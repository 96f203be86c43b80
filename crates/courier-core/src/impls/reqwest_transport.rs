//! ReqwestTransport - reqwest による Transport
//!
//! - sync: `reqwest::blocking::Client`。body は Response::body() まで読まない（chunk 単位で読むので進捗も出る）
//! - async: `reqwest::Client` を tokio task で実行し、body をその場で読み切る
//!
//! The blocking client is created on first use. Like every reqwest blocking
//! client it must not be created or dropped on a tokio worker thread, so sync
//! descriptors belong on plain threads (or `spawn_blocking`).

use std::io::Read;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::domain::{BodySource, RequestDescriptor, TransportError, TransportErrorKind};
use crate::ports::{Call, Completion, RawReply, Transport, WireRequest};

const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

struct Clients {
    blocking: OnceLock<reqwest::blocking::Client>,
    nonblocking: reqwest::Client,
    connect_timeout: Duration,
}

impl Clients {
    fn blocking(&self) -> &reqwest::blocking::Client {
        self.blocking.get_or_init(|| {
            reqwest::blocking::Client::builder()
                .connect_timeout(self.connect_timeout)
                .user_agent(DEFAULT_USER_AGENT)
                .build()
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "falling back to default blocking client");
                    reqwest::blocking::Client::new()
                })
        })
    }
}

/// Transport backed by reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    clients: Arc<Clients>,
    runtime: Option<Handle>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        let nonblocking = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default client");
                reqwest::Client::new()
            });
        Self {
            clients: Arc::new(Clients {
                blocking: OnceLock::new(),
                nonblocking,
                connect_timeout,
            }),
            runtime: None,
        }
    }

    /// Runtime async sends run on. Defaults to the runtime current at send time.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ReqwestTransport {
    fn acquire(&self, _descriptor: &RequestDescriptor) -> Result<Box<dyn Call>, TransportError> {
        Ok(Box::new(ReqwestCall {
            clients: self.clients.clone(),
            runtime: self.runtime.clone(),
            in_flight: None,
        }))
    }
}

struct ReqwestCall {
    clients: Arc<Clients>,
    runtime: Option<Handle>,
    in_flight: Option<JoinHandle<()>>,
}

impl Call for ReqwestCall {
    fn send_sync(&mut self, request: &WireRequest) -> Result<RawReply, TransportError> {
        let mut builder = self
            .clients
            .blocking()
            .request(request.method.clone(), request.url.clone())
            .timeout(request.timeout);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send().map_err(transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        Ok(RawReply::new(status, BlockingBody(Some(response))).with_headers(headers))
    }

    fn send_async(&mut self, request: WireRequest, completion: Completion) {
        let runtime = match self.runtime.clone().or_else(|| Handle::try_current().ok()) {
            Some(runtime) => runtime,
            None => {
                completion.fail(TransportError::new(
                    TransportErrorKind::Other,
                    "no tokio runtime for async send",
                ));
                return;
            }
        };

        let mut builder = self
            .clients
            .nonblocking
            .request(request.method, request.url)
            .timeout(request.timeout);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        self.in_flight = Some(runtime.spawn(async move {
            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) => {
                    completion.fail(transport_error(e));
                    return;
                }
            };
            let status = response.status();
            let headers = response.headers().clone();
            match response.bytes().await {
                Ok(body) => completion.complete(RawReply::new(status, body).with_headers(headers)),
                Err(e) => completion.fail(transport_error(e)),
            };
        }));
    }

    fn close(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}

/// Blocking response whose body is read on first access.
struct BlockingBody(Option<reqwest::blocking::Response>);

impl BodySource for BlockingBody {
    fn read_all(&mut self) -> Result<Bytes, TransportError> {
        match self.0.take() {
            Some(response) => response.bytes().map_err(transport_error),
            None => Ok(Bytes::new()),
        }
    }

    fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>, TransportError> {
        let Some(response) = self.0.as_mut() else {
            return Ok(None);
        };
        let mut buf = vec![0u8; max.max(1)];
        loop {
            match response.read(&mut buf) {
                Ok(0) => {
                    self.0 = None;
                    return Ok(None);
                }
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Some(Bytes::from(buf)));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::new(TransportErrorKind::Reset, e.to_string())),
            }
        }
    }

    fn content_length(&self) -> Option<u64> {
        self.0.as_ref().and_then(reqwest::blocking::Response::content_length)
    }
}

fn transport_error(e: reqwest::Error) -> TransportError {
    let kind = if e.is_timeout() {
        TransportErrorKind::Timeout
    } else if e.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ExecutionEngine;
    use crate::impls::MemoryLogSink;
    use http::Method;

    #[tokio::test]
    async fn unreachable_host_fails_with_transport_error() {
        let logs = Arc::new(MemoryLogSink::new());
        let engine = ExecutionEngine::builder(ReqwestTransport::with_connect_timeout(
            Duration::from_millis(200),
        ))
        .log_sink(logs.clone())
        .build();
        // port 9 (discard) on loopback is closed on any sane test host
        let d = RequestDescriptor::builder(Method::GET, "http://127.0.0.1:9/")
            .async_mode(true)
            .build()
            .unwrap();

        let err = engine.send(d).join().await.unwrap_err();

        assert!(err.is_transport());
        assert_eq!(logs.count_starting_with("Response: Status = -1"), 1);
    }
}
