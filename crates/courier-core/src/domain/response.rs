//! Response model: what the caller gets back for one logical request.
//!
//! A `Response` always exists, even when no reply was obtained: the sentinel
//! form has no status and is never successful. Downstream code (log sink,
//! lifecycle handler) therefore deals with a single type.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use super::errors::{EngineError, TransportError};

/// Where the body bytes of a raw reply come from.
///
/// Transports hand one of these over with each reply. It is drained at most
/// once, either by `read_all` or by repeated `read_chunk` calls.
pub trait BodySource: Send {
    fn read_all(&mut self) -> Result<Bytes, TransportError>;

    /// Next chunk of at most `max` bytes, `None` once drained.
    ///
    /// The default hands the whole remaining body over as one chunk.
    fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>, TransportError> {
        let _ = max;
        let bytes = self.read_all()?;
        Ok((!bytes.is_empty()).then_some(bytes))
    }

    /// Total body length when known up front.
    fn content_length(&self) -> Option<u64> {
        None
    }
}

impl BodySource for Bytes {
    fn read_all(&mut self) -> Result<Bytes, TransportError> {
        Ok(std::mem::take(self))
    }

    fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>, TransportError> {
        if self.is_empty() {
            return Ok(None);
        }
        let n = max.clamp(1, self.len());
        Ok(Some(self.split_to(n)))
    }

    fn content_length(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

/// Lazily materialized body.
///
/// The first read drains the source; the bytes (or the read error) are cached
/// and returned by every later read without touching the source again.
pub struct Body {
    source: Mutex<Option<Box<dyn BodySource>>>,
    cached: OnceLock<Result<Bytes, TransportError>>,
}

impl Body {
    pub fn new(source: Box<dyn BodySource>) -> Self {
        Self {
            source: Mutex::new(Some(source)),
            cached: OnceLock::new(),
        }
    }

    pub fn empty() -> Self {
        let cached = OnceLock::new();
        let _ = cached.set(Ok(Bytes::new()));
        Self {
            source: Mutex::new(None),
            cached,
        }
    }

    pub fn read(&self) -> Result<Bytes, TransportError> {
        self.cached
            .get_or_init(|| {
                let source = self
                    .source
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .take();
                match source {
                    Some(mut source) => source.read_all(),
                    None => Ok(Bytes::new()),
                }
            })
            .clone()
    }

    pub fn is_materialized(&self) -> bool {
        self.cached.get().is_some()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cached.get() {
            Some(Ok(bytes)) => write!(f, "Body({} bytes)", bytes.len()),
            Some(Err(e)) => write!(f, "Body(error: {e})"),
            None => f.write_str("Body(<unread>)"),
        }
    }
}

/// Everything the response factory has decided about one reply.
pub struct ResponseParts {
    pub status: StatusCode,
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Body,
    pub success: bool,
    pub attempt: u32,
    pub started_at: Instant,
}

/// Cloning is cheap and clones share the body cache.
#[derive(Debug, Clone)]
pub struct Response {
    status: Option<StatusCode>,
    reason: Option<String>,
    headers: HeaderMap,
    body: Arc<Body>,
    success: bool,
    cause: Option<EngineError>,
    attempt: u32,
    started_at: Instant,
    elapsed: Duration,
}

impl Response {
    pub fn from_parts(parts: ResponseParts) -> Self {
        Self {
            status: Some(parts.status),
            reason: parts.reason,
            headers: parts.headers,
            body: Arc::new(parts.body),
            success: parts.success,
            cause: None,
            attempt: parts.attempt,
            elapsed: parts.started_at.elapsed(),
            started_at: parts.started_at,
        }
    }

    /// Absent-reply response: undefined status, never successful.
    pub fn sentinel(attempt: u32, started_at: Instant) -> Self {
        Self {
            status: None,
            reason: None,
            headers: HeaderMap::new(),
            body: Arc::new(Body::empty()),
            success: false,
            cause: None,
            attempt,
            elapsed: started_at.elapsed(),
            started_at,
        }
    }

    pub fn with_cause(mut self, cause: EngineError) -> Self {
        self.cause = Some(cause);
        self
    }

    pub(crate) fn set_cause(&mut self, cause: EngineError) {
        self.cause = Some(cause);
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Numeric status, `-1` for the sentinel.
    pub fn status_code(&self) -> i32 {
        self.status.map(|s| i32::from(s.as_u16())).unwrap_or(-1)
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> Result<Bytes, EngineError> {
        Ok(self.body.read()?)
    }

    pub fn text(&self) -> Result<String, EngineError> {
        let bytes = self.body()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| EngineError::Decode(format!("utf-8: {e}")))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, EngineError> {
        let bytes = self.body()?;
        serde_json::from_slice(&bytes).map_err(|e| EngineError::Decode(format!("json decode: {e}")))
    }

    pub fn is_body_materialized(&self) -> bool {
        self.body.is_materialized()
    }

    /// Verdict of the descriptor's success predicate, decided once at creation.
    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_error(&self) -> bool {
        !self.success
    }

    pub fn is_sentinel(&self) -> bool {
        self.status.is_none()
    }

    pub fn cause(&self) -> Option<&EngineError> {
        self.cause.as_ref()
    }

    /// Zero-based attempt that produced this response.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        reads: Arc<AtomicUsize>,
        data: &'static [u8],
    }

    impl BodySource for CountingSource {
        fn read_all(&mut self) -> Result<Bytes, TransportError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(self.data))
        }
    }

    struct FailingSource;

    impl BodySource for FailingSource {
        fn read_all(&mut self) -> Result<Bytes, TransportError> {
            Err(TransportError::reset("stream reset mid-body"))
        }
    }

    fn response_with(body: Body) -> Response {
        Response::from_parts(ResponseParts {
            status: StatusCode::OK,
            reason: Some("OK".to_string()),
            headers: HeaderMap::new(),
            body,
            success: true,
            attempt: 0,
            started_at: Instant::now(),
        })
    }

    #[test]
    fn body_is_read_once_and_cached() {
        let reads = Arc::new(AtomicUsize::new(0));
        let response = response_with(Body::new(Box::new(CountingSource {
            reads: reads.clone(),
            data: b"ok",
        })));

        assert!(!response.is_body_materialized());
        let first = response.body().unwrap();
        let second = response.body().unwrap();

        assert_eq!(first, second);
        assert_eq!(&first[..], b"ok");
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(response.is_body_materialized());
    }

    #[test]
    fn clones_share_the_body_cache() {
        let reads = Arc::new(AtomicUsize::new(0));
        let response = response_with(Body::new(Box::new(CountingSource {
            reads: reads.clone(),
            data: b"shared",
        })));
        let cloned = response.clone();

        assert_eq!(&cloned.body().unwrap()[..], b"shared");
        assert!(response.is_body_materialized());
        assert_eq!(&response.body().unwrap()[..], b"shared");
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn read_error_is_cached_too() {
        let response = response_with(Body::new(Box::new(FailingSource)));
        let e1 = response.body().unwrap_err();
        let e2 = response.body().unwrap_err();
        assert_eq!(e1, e2);
        assert!(e1.is_transport());
    }

    #[test]
    fn sentinel_has_no_status_and_is_error() {
        let r = Response::sentinel(2, Instant::now());
        assert!(r.is_sentinel());
        assert!(r.is_error());
        assert_eq!(r.status_code(), -1);
        assert_eq!(r.attempt(), 2);
        assert!(r.body().unwrap().is_empty());
    }

    #[test]
    fn json_decode_failure_maps_to_decode_error() {
        let response = response_with(Body::new(Box::new(Bytes::from_static(b"not json"))));
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
    }

    #[test]
    fn text_and_json_share_the_cached_body() {
        let response = response_with(Body::new(Box::new(Bytes::from_static(br#"{"a":1}"#))));
        assert_eq!(response.text().unwrap(), r#"{"a":1}"#);
        let v: serde_json::Value = response.json().unwrap();
        assert_eq!(v["a"], 1);
    }
}
