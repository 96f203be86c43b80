//! Transport port - 実際のネットワーク I/O
//!
//! Transport は engine が blocking I/O や独自スレッドを持てる唯一の場所です。
//! engine は Transport の thread model を仮定しません。
//!
//! # 実装
//! - **ScriptedTransport**: 開発・テスト用（impls/scripted）
//! - **ReqwestTransport**: reqwest ベース（`reqwest` feature）

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use http::{HeaderMap, StatusCode};
use tokio::sync::oneshot;

use super::wire::WireRequest;
use crate::domain::{BodySource, RequestDescriptor, TransportError};

/// A reply as the transport received it. The body is not read yet.
pub struct RawReply {
    pub status: StatusCode,
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Box<dyn BodySource>,
}

impl RawReply {
    pub fn new(status: StatusCode, body: impl BodySource + 'static) -> Self {
        Self {
            status,
            reason: status.canonical_reason().map(str::to_string),
            headers: HeaderMap::new(),
            body: Box::new(body),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

impl fmt::Debug for RawReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawReply")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Transport は attempt ごとに Call を払い出す
///
/// # 設計原則
/// - 1 attempt = 1 Call（engine が必ず 1 回だけ close する）
/// - timeout は Transport 側の責務（TransportError::Timeout として返す）
pub trait Transport: Send + Sync {
    fn acquire(&self, descriptor: &RequestDescriptor) -> Result<Box<dyn Call>, TransportError>;
}

/// One attempt's connection/call object.
pub trait Call: Send {
    /// Blocking send. Runs on the caller's thread.
    fn send_sync(&mut self, request: &WireRequest) -> Result<RawReply, TransportError>;

    /// Non-blocking submission. The outcome is reported through `completion`
    /// from whatever thread the transport likes.
    fn send_async(&mut self, request: WireRequest, completion: Completion);

    /// Release the underlying connection.
    fn close(&mut self);
}

type Outcome = Result<RawReply, TransportError>;

/// Single-shot completion callback handed to [`Call::send_async`].
///
/// Cloneable so a transport can hold it from several callbacks; only the first
/// `complete`/`fail` is delivered, later calls return `false` and do nothing.
#[derive(Clone)]
pub struct Completion {
    inner: Arc<CompletionInner>,
}

struct CompletionInner {
    fired: AtomicBool,
    tx: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl Completion {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self {
            inner: Arc::new(CompletionInner {
                fired: AtomicBool::new(false),
                tx: Mutex::new(Some(tx)),
            }),
        };
        (completion, rx)
    }

    pub fn complete(&self, reply: RawReply) -> bool {
        self.deliver(Ok(reply))
    }

    pub fn fail(&self, error: TransportError) -> bool {
        self.deliver(Err(error))
    }

    pub fn is_done(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    fn deliver(&self, outcome: Outcome) -> bool {
        if self.inner.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        let tx = self
            .inner
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match tx {
            // the receiver may be gone if the engine task was dropped
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn completion_delivers_only_the_first_outcome() {
        let (completion, rx) = Completion::channel();
        let other = completion.clone();

        assert!(completion.complete(RawReply::new(StatusCode::OK, Bytes::from_static(b"ok"))));
        assert!(!other.fail(TransportError::reset("late")));
        assert!(other.is_done());

        let outcome = rx.await.unwrap();
        assert_eq!(outcome.unwrap().status, StatusCode::OK);
    }

    #[tokio::test]
    async fn dropped_completion_closes_the_channel() {
        let (completion, rx) = Completion::channel();
        drop(completion);
        assert!(rx.await.is_err());
    }
}
