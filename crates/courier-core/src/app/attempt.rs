//! AttemptLoop - one logical request's attempt state machine.
//!
//! The loop owns the descriptor and the attempt counter. Drivers (blocking or
//! async, see `engine`) feed it each attempt's outcome and act on the returned
//! [`Next`]: sleep and go again, or stop with the delivered result. Retries
//! are iterations of the driver's loop, never nested calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::{
    EngineError, FailureCause, Progress, ProgressReporter, RequestDescriptor, Response,
    RetryContext, RetryDecision, TransportError,
};
use crate::ports::{
    Call, LifecycleHandler, LogSink, RawReply, ResponseFactory, RetryPolicy, Transport,
    WireRequest, WireRequestBuilder,
};

/// The collaborators one engine wires together.
pub(crate) struct EngineParts {
    pub transport: Arc<dyn Transport>,
    pub retry_policy: Arc<dyn RetryPolicy>,
    pub response_factory: Arc<dyn ResponseFactory>,
    pub wire_builder: Arc<dyn WireRequestBuilder>,
    pub log_sink: Arc<dyn LogSink>,
}

/// What the driver does after an attempt.
pub(crate) enum Next<T> {
    Retry { delay: Duration },
    Done(Result<T, EngineError>),
}

/// Closes the call exactly once: explicitly via [`close`](Self::close), or on
/// drop if a driver exits early.
pub(crate) struct CallGuard {
    call: Option<Box<dyn Call>>,
}

impl CallGuard {
    fn new(call: Box<dyn Call>) -> Self {
        Self { call: Some(call) }
    }

    pub fn send_sync(&mut self, request: &WireRequest) -> Result<RawReply, TransportError> {
        match self.call.as_mut() {
            Some(call) => call.send_sync(request),
            None => Err(TransportError::closed("call already closed")),
        }
    }

    pub fn send_async(&mut self, request: WireRequest, completion: crate::ports::Completion) {
        match self.call.as_mut() {
            Some(call) => call.send_async(request, completion),
            None => {
                completion.fail(TransportError::closed("call already closed"));
            }
        }
    }

    pub fn close(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        if let Some(mut call) = self.call.take() {
            call.close();
        }
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.close_inner();
    }
}

/// An attempt in flight.
pub(crate) struct Started {
    pub call: CallGuard,
    pub started_at: Instant,
}

pub(crate) struct AttemptLoop<H: LifecycleHandler> {
    descriptor: RequestDescriptor,
    handler: Arc<H>,
    parts: Arc<EngineParts>,
    attempt: u32,
}

impl<H: LifecycleHandler> AttemptLoop<H> {
    pub fn new(descriptor: RequestDescriptor, handler: Arc<H>, parts: Arc<EngineParts>) -> Self {
        Self {
            descriptor,
            handler,
            parts,
            attempt: 0,
        }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Build the wire request once for the whole loop.
    ///
    /// A descriptor the builder rejects is terminal without any attempt.
    pub fn wire_request(&self) -> Result<WireRequest, EngineError> {
        self.parts.wire_builder.build(&self.descriptor).inspect_err(|e| {
            tracing::warn!(url = %self.descriptor.url(), error = %e, "request rejected before sending");
            self.fail_without_attempt(e);
        })
    }

    /// Report a request that never reached its first attempt.
    pub fn fail_without_attempt(&self, cause: &EngineError) {
        let response = Response::sentinel(self.attempt, Instant::now()).with_cause(cause.clone());
        self.handler.handle_error(&self.descriptor, &response, cause);
    }

    /// Log the attempt and acquire its call object.
    pub fn start(&self, wire: &WireRequest) -> Result<Started, (TransportError, Instant)> {
        let started_at = Instant::now();
        tracing::debug!(
            attempt = self.attempt,
            method = %wire.method,
            url = %wire.url,
            "sending attempt"
        );
        if self.descriptor.is_log_enabled() {
            self.parts
                .log_sink
                .log(&request_log(&self.descriptor, wire, self.attempt));
        }
        match self.parts.transport.acquire(&self.descriptor) {
            Ok(call) => Ok(Started {
                call: CallGuard::new(call),
                started_at,
            }),
            Err(e) => Err((e, started_at)),
        }
    }

    /// No reply was obtained for the current attempt.
    pub fn on_transport_failure(&mut self, error: TransportError, started_at: Instant) -> Next<H::Output> {
        let context = RetryContext::new(
            &self.descriptor,
            self.attempt,
            FailureCause::Transport(error.clone()),
        );
        if let Some(delay) = self.retry(&context) {
            return Next::Retry { delay };
        }

        let cause = self.terminal(EngineError::Transport(error));
        let response = self
            .parts
            .response_factory
            .create_response(&self.descriptor, None, self.attempt, started_at, None)
            .with_cause(cause.clone());
        self.log_response(&response);
        tracing::warn!(attempt = self.attempt, error = %cause, "request failed");
        self.handler.handle_error(&self.descriptor, &response, &cause);
        Next::Done(Err(cause))
    }

    /// A reply was obtained for the current attempt.
    pub fn on_reply(&mut self, reply: RawReply, started_at: Instant) -> Next<H::Output> {
        let mut response = self.parts.response_factory.create_response(
            &self.descriptor,
            Some(reply),
            self.attempt,
            started_at,
            Some(self.progress_reporter()),
        );
        self.log_response(&response);

        if response.is_success() {
            tracing::debug!(attempt = self.attempt, status = response.status_code(), "request succeeded");
            return self.deliver(response);
        }

        let status = match response.status() {
            Some(status) => status,
            None => return self.deliver_sync(response),
        };
        let context = RetryContext::new(&self.descriptor, self.attempt, FailureCause::Application { status });
        if let Some(delay) = self.retry(&context) {
            return Next::Retry { delay };
        }

        // Exhausted HTTP-level failures are data: they go down the success path.
        tracing::info!(
            attempt = self.attempt,
            status = response.status_code(),
            "retries exhausted on error status, delivering response"
        );
        response.set_cause(self.terminal(EngineError::application(status)));
        self.deliver_sync(response)
    }

    /// Forwards body read progress to the handler, from whichever thread reads
    /// the body.
    fn progress_reporter(&self) -> ProgressReporter {
        let handler = self.handler.clone();
        let descriptor = self.descriptor.clone();
        Arc::new(move |progress: &Progress| handler.handle_progress(&descriptor, progress))
    }

    fn retry(&mut self, context: &RetryContext) -> Option<Duration> {
        match self.parts.retry_policy.decide(context) {
            RetryDecision::Retry { delay, reason } => {
                tracing::warn!(
                    attempt = context.attempt,
                    remaining = context.remaining(),
                    cause = ?context.cause,
                    delay_ms = delay.as_millis() as u64,
                    "{reason}"
                );
                self.attempt += 1;
                Some(delay)
            }
            RetryDecision::GiveUp { reason } => {
                tracing::debug!(attempt = context.attempt, "{reason}");
                None
            }
        }
    }

    /// Delivery of a response that passed the success predicate.
    fn deliver(&self, response: Response) -> Next<H::Output> {
        if self.descriptor.on_success().is_some() {
            let delivered = self.handler.handle_success(&self.descriptor, response.clone());
            self.delivered(delivered, response)
        } else {
            self.deliver_sync(response)
        }
    }

    /// Delivery through `handle_sync`. Error-status responses always take this
    /// path, so the user's success callback never sees them.
    fn deliver_sync(&self, response: Response) -> Next<H::Output> {
        let delivered = self.handler.handle_sync(&self.descriptor, response.clone());
        self.delivered(delivered, response)
    }

    fn delivered(&self, delivered: Result<H::Output, EngineError>, response: Response) -> Next<H::Output> {
        match delivered {
            Ok(value) => Next::Done(Ok(value)),
            Err(e) => {
                tracing::warn!(attempt = self.attempt, error = %e, "delivering response failed");
                let response = response.with_cause(e.clone());
                self.handler.handle_error(&self.descriptor, &response, &e);
                Next::Done(Err(e))
            }
        }
    }

    fn terminal(&self, cause: EngineError) -> EngineError {
        if self.attempt == 0 {
            cause
        } else {
            EngineError::RetryExhausted {
                attempts: self.attempt + 1,
                cause: Box::new(cause),
            }
        }
    }

    fn log_response(&self, response: &Response) {
        if self.descriptor.is_log_enabled() {
            self.parts.log_sink.log(&response_log(response));
        }
    }
}

pub(crate) fn request_log(descriptor: &RequestDescriptor, wire: &WireRequest, attempt: u32) -> String {
    let line = format!("{} {} {}", wire.method, wire.url, descriptor.scheme());
    let line = if attempt == 0 {
        line
    } else {
        format!("[Retry: {attempt}] {line}")
    };
    let mut content = format!("Request: \n\t{line}");
    if !wire.headers.is_empty() {
        let headers: Vec<String> = wire
            .headers
            .iter()
            .map(|(name, value)| format!("\t\t{name}: {value}"))
            .collect();
        content.push_str("\n\tHeaders: \n");
        content.push_str(&headers.join("\n"));
    }
    if let Some(body) = body_summary(descriptor, wire) {
        content.push_str("\n\tBody: ");
        content.push_str(&body);
    }
    content
}

fn body_summary(descriptor: &RequestDescriptor, wire: &WireRequest) -> Option<String> {
    let parts: Vec<&str> = descriptor.multiparts().map(|p| p.name.as_str()).collect();
    if !parts.is_empty() {
        return Some(format!("[parts: {}] {}", parts.len(), parts.join(", ")));
    }
    let body = wire.body.as_ref().filter(|b| !b.is_empty())?;
    let text = String::from_utf8_lossy(body);
    Some(text.lines().collect::<Vec<_>>().join("\\n"))
}

pub(crate) fn response_log(response: &Response) -> String {
    format!(
        "Response: Status = {}, Time = {}ms",
        response.status_code(),
        response.elapsed().as_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::DefaultWireRequestBuilder;
    use bytes::Bytes;
    use http::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn wire(d: &RequestDescriptor) -> WireRequest {
        DefaultWireRequestBuilder.build(d).unwrap()
    }

    #[test]
    fn first_attempt_request_line_has_no_retry_prefix() {
        let d = RequestDescriptor::builder(Method::GET, "https://h/a").build().unwrap();
        let log = request_log(&d, &wire(&d), 0);
        assert_eq!(log, "Request: \n\tGET https://h/a HTTPS");
    }

    #[test]
    fn retries_are_prefixed_and_headers_and_body_listed() {
        let d = RequestDescriptor::builder(Method::POST, "http://h/a")
            .header("Accept", "text/plain")
            .text("line1\nline2")
            .build()
            .unwrap();
        let log = request_log(&d, &wire(&d), 2);
        assert_eq!(
            log,
            "Request: \n\t[Retry: 2] POST http://h/a HTTP\n\tHeaders: \n\t\tAccept: text/plain\n\tBody: line1\\nline2"
        );
    }

    #[test]
    fn sentinel_response_log_prints_minus_one() {
        let r = Response::sentinel(0, Instant::now());
        assert!(response_log(&r).starts_with("Response: Status = -1, Time = "));
    }

    struct CountingCall {
        closes: Arc<AtomicUsize>,
    }

    impl Call for CountingCall {
        fn send_sync(&mut self, _request: &WireRequest) -> Result<RawReply, TransportError> {
            Ok(RawReply::new(http::StatusCode::OK, Bytes::new()))
        }

        fn send_async(&mut self, _request: WireRequest, completion: crate::ports::Completion) {
            completion.fail(TransportError::closed("unused"));
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn call_guard_closes_once_whether_closed_or_dropped() {
        let closes = Arc::new(AtomicUsize::new(0));

        let guard = CallGuard::new(Box::new(CountingCall { closes: closes.clone() }));
        guard.close();
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let guard = CallGuard::new(Box::new(CountingCall { closes: closes.clone() }));
        drop(guard);
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }
}
