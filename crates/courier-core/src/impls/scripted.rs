//! ScriptedTransport - 開発・テスト用の Transport
//!
//! 事前に決めた Step を attempt ごとに 1 つずつ再生します。
//! acquire / send / body read / close の回数を数えるので、
//! retry 回数やリソース解放をテストで検証できます。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::domain::{BodySource, RequestDescriptor, TransportError};
use crate::ports::{Call, Completion, RawReply, Transport, WireRequest};

/// What one attempt does.
#[derive(Debug, Clone)]
pub enum Step {
    Reply {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    Fail(TransportError),
    /// `acquire` itself fails.
    AcquireFail(TransportError),
    /// Misbehaving transport: reports a reply and then a failure for the same
    /// call (async only; sync sends just return the reply).
    ReplyThenFail {
        status: StatusCode,
        body: Bytes,
        error: TransportError,
    },
    /// Drops the completion without reporting anything (async only; sync sends
    /// report a closed call).
    Abandon,
}

impl Step {
    pub fn reply(status: u16, body: &'static str) -> Self {
        Step::Reply {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    pub fn fail(error: TransportError) -> Self {
        Step::Fail(error)
    }
}

/// Counters shared by the transport and every call it hands out.
#[derive(Debug, Default)]
pub struct TransportStats {
    acquires: AtomicUsize,
    sends: AtomicUsize,
    body_reads: AtomicUsize,
    closes: AtomicUsize,
}

impl TransportStats {
    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn body_reads(&self) -> usize {
        self.body_reads.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// How async sends report their outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionThread {
    /// Inside `send_async`, on the submitting thread.
    #[default]
    Inline,
    /// From a freshly spawned OS thread.
    Spawned,
}

pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<Step>,
    completion_thread: CompletionThread,
    stats: Arc<TransportStats>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback: None,
            completion_thread: CompletionThread::Inline,
            stats: Arc::new(TransportStats::default()),
        }
    }

    /// Every attempt does `step`.
    pub fn always(step: Step) -> Self {
        Self::new(Vec::new()).then_always(step)
    }

    /// Step used once the script is exhausted.
    pub fn then_always(mut self, step: Step) -> Self {
        self.fallback = Some(step);
        self
    }

    pub fn completing_on(mut self, thread: CompletionThread) -> Self {
        self.completion_thread = thread;
        self
    }

    pub fn stats(&self) -> Arc<TransportStats> {
        self.stats.clone()
    }

    fn next_step(&self) -> Step {
        let next = self
            .steps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        next.or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Step::Fail(TransportError::closed("script exhausted")))
    }
}

impl Transport for ScriptedTransport {
    fn acquire(&self, _descriptor: &RequestDescriptor) -> Result<Box<dyn Call>, TransportError> {
        self.stats.acquires.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Step::AcquireFail(e) => Err(e),
            step => Ok(Box::new(ScriptedCall {
                step: Some(step),
                completion_thread: self.completion_thread,
                stats: self.stats.clone(),
            })),
        }
    }
}

struct ScriptedCall {
    step: Option<Step>,
    completion_thread: CompletionThread,
    stats: Arc<TransportStats>,
}

impl ScriptedCall {
    fn raw(&self, status: StatusCode, headers: HeaderMap, body: Bytes) -> RawReply {
        RawReply::new(
            status,
            CountingBody {
                length: body.len() as u64,
                data: body,
                counted: false,
                stats: self.stats.clone(),
            },
        )
        .with_headers(headers)
    }

    fn take_step(&mut self) -> Step {
        self.stats.sends.fetch_add(1, Ordering::SeqCst);
        self.step
            .take()
            .unwrap_or_else(|| Step::Fail(TransportError::closed("call already used")))
    }
}

impl Call for ScriptedCall {
    fn send_sync(&mut self, _request: &WireRequest) -> Result<RawReply, TransportError> {
        match self.take_step() {
            Step::Reply {
                status,
                headers,
                body,
            } => Ok(self.raw(status, headers, body)),
            Step::ReplyThenFail { status, body, .. } => Ok(self.raw(status, HeaderMap::new(), body)),
            Step::Fail(e) | Step::AcquireFail(e) => Err(e),
            Step::Abandon => Err(TransportError::closed("call abandoned")),
        }
    }

    fn send_async(&mut self, _request: WireRequest, completion: Completion) {
        let step = self.take_step();
        let reply = match &step {
            Step::Reply {
                status,
                headers,
                body,
            } => Some(self.raw(*status, headers.clone(), body.clone())),
            Step::ReplyThenFail { status, body, .. } => {
                Some(self.raw(*status, HeaderMap::new(), body.clone()))
            }
            _ => None,
        };
        let report = move || match step {
            Step::Reply { .. } => {
                if let Some(reply) = reply {
                    completion.complete(reply);
                }
            }
            Step::ReplyThenFail { error, .. } => {
                if let Some(reply) = reply {
                    completion.complete(reply);
                }
                completion.fail(error);
            }
            Step::Fail(e) | Step::AcquireFail(e) => {
                completion.fail(e);
            }
            Step::Abandon => drop(completion),
        };
        match self.completion_thread {
            CompletionThread::Inline => report(),
            CompletionThread::Spawned => {
                std::thread::spawn(report);
            }
        }
    }

    fn close(&mut self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Counts one body read per reply, however many chunks it is read in.
struct CountingBody {
    data: Bytes,
    length: u64,
    counted: bool,
    stats: Arc<TransportStats>,
}

impl CountingBody {
    fn count(&mut self) {
        if !self.counted {
            self.counted = true;
            self.stats.body_reads.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl BodySource for CountingBody {
    fn read_all(&mut self) -> Result<Bytes, TransportError> {
        self.count();
        Ok(std::mem::take(&mut self.data))
    }

    fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>, TransportError> {
        self.count();
        self.data.read_chunk(max)
    }

    fn content_length(&self) -> Option<u64> {
        Some(self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::DefaultWireRequestBuilder;
    use crate::ports::WireRequestBuilder;
    use http::Method;

    fn wire() -> (RequestDescriptor, WireRequest) {
        let d = RequestDescriptor::builder(Method::GET, "http://h/").build().unwrap();
        let w = DefaultWireRequestBuilder.build(&d).unwrap();
        (d, w)
    }

    #[test]
    fn steps_play_in_order_then_fallback() {
        let (d, w) = wire();
        let t = ScriptedTransport::new([Step::fail(TransportError::connect("refused"))])
            .then_always(Step::reply(200, "ok"));

        let mut c1 = t.acquire(&d).unwrap();
        assert!(c1.send_sync(&w).is_err());
        let mut c2 = t.acquire(&d).unwrap();
        assert_eq!(c2.send_sync(&w).unwrap().status, StatusCode::OK);
        let mut c3 = t.acquire(&d).unwrap();
        assert_eq!(c3.send_sync(&w).unwrap().status, StatusCode::OK);

        let stats = t.stats();
        assert_eq!(stats.acquires(), 3);
        assert_eq!(stats.sends(), 3);
        assert_eq!(stats.closes(), 0);
    }

    #[test]
    fn acquire_failure_is_reported() {
        let (d, _) = wire();
        let t = ScriptedTransport::new([Step::AcquireFail(TransportError::connect("pool exhausted"))]);
        assert!(t.acquire(&d).is_err());
        assert_eq!(t.stats().acquires(), 1);
    }

    #[test]
    fn exhausted_script_without_fallback_fails_closed() {
        let (d, w) = wire();
        let t = ScriptedTransport::new(Vec::new());
        let err = t.acquire(&d).unwrap().send_sync(&w).unwrap_err();
        assert_eq!(err.kind(), crate::domain::TransportErrorKind::Closed);
    }
}
