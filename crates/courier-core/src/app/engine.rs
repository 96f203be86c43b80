//! ExecutionEngine - turns a descriptor into attempts and one delivered outcome.
//!
//! # フロー
//! 1. WireRequestBuilder で送信用 request を組み立てる（1 回だけ）
//! 2. attempt ごとに Transport から Call を取得して送信
//! 3. 失敗したら RetryPolicy に判断を仰ぐ（delay は engine が待つ）
//! 4. ResponseFactory で Response を作り、LifecycleHandler / ResultFuture に 1 回だけ渡す
//!
//! Sync descriptors block the caller until the outcome is known. Async
//! descriptors return a [`ResultFuture`] immediately; the attempt loop runs as
//! a tokio task and re-submits on retry instead of recursing from completion
//! callbacks.

use std::sync::Arc;

use http::Method;
use tokio::runtime::Handle;

use super::attempt::{AttemptLoop, EngineParts, Next};
use super::future::ResultFuture;
use crate::domain::{
    EngineConfig, EngineError, RequestDescriptor, RequestDescriptorBuilder, Response,
    TransportError,
};
use crate::impls::{
    DefaultResponseFactory, DefaultRetryPolicy, DefaultWireRequestBuilder, ResponseHandler,
    TracingLogSink,
};
use crate::ports::{
    Completion, LifecycleHandler, LogSink, ResponseFactory, RetryPolicy, Transport,
    WireRequestBuilder,
};

/// What `execute` hands back: the finished result in sync mode, a pending
/// handle in async mode.
#[derive(Debug)]
pub enum Execution<T> {
    Sync(Result<T, EngineError>),
    Async(ResultFuture<T>),
}

impl<T> Execution<T> {
    pub fn is_async(&self) -> bool {
        matches!(self, Execution::Async(_))
    }

    pub fn future(&self) -> Option<&ResultFuture<T>> {
        match self {
            Execution::Async(future) => Some(future),
            Execution::Sync(_) => None,
        }
    }

    /// Block until the outcome is known.
    pub fn wait(self) -> Result<T, EngineError> {
        match self {
            Execution::Sync(result) => result,
            Execution::Async(future) => future.wait(),
        }
    }

    pub async fn join(self) -> Result<T, EngineError> {
        match self {
            Execution::Sync(result) => result,
            Execution::Async(future) => future.join().await,
        }
    }
}

pub struct ExecutionEngine {
    parts: Arc<EngineParts>,
    config: EngineConfig,
    runtime: Option<Handle>,
}

impl ExecutionEngine {
    pub fn builder<T: Transport + 'static>(transport: T) -> EngineBuilder {
        EngineBuilder::new(Arc::new(transport))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a descriptor seeded with this engine's defaults.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestDescriptorBuilder {
        self.config.descriptor(method, url)
    }

    /// Run a request and hand back the raw [`Response`].
    pub fn send(&self, descriptor: RequestDescriptor) -> Execution<Response> {
        self.execute(descriptor, Arc::new(ResponseHandler))
    }

    pub fn execute<H: LifecycleHandler>(
        &self,
        descriptor: RequestDescriptor,
        handler: Arc<H>,
    ) -> Execution<H::Output> {
        let is_async = descriptor.is_async();
        let attempts = AttemptLoop::new(descriptor, handler, self.parts.clone());
        if !is_async {
            return Execution::Sync(run_sync(attempts));
        }

        let future = ResultFuture::new();
        let runtime = self.runtime.clone().or_else(|| Handle::try_current().ok());
        match runtime {
            Some(runtime) => {
                let handler = attempts.handler().clone();
                runtime.spawn(run_async(attempts, future.clone()));
                handler.handle_future(&future);
            }
            None => {
                tracing::warn!("async request submitted without a tokio runtime");
                attempts.handler().handle_future(&future);
                attempts.fail_without_attempt(&EngineError::NoRuntime);
                future.failed(EngineError::NoRuntime);
            }
        }
        Execution::Async(future)
    }
}

fn run_sync<H: LifecycleHandler>(mut attempts: AttemptLoop<H>) -> Result<H::Output, EngineError> {
    let wire = attempts.wire_request()?;
    loop {
        let next = match attempts.start(&wire) {
            Ok(mut started) => {
                let outcome = started.call.send_sync(&wire);
                started.call.close();
                match outcome {
                    Ok(reply) => attempts.on_reply(reply, started.started_at),
                    Err(e) => attempts.on_transport_failure(e, started.started_at),
                }
            }
            Err((e, started_at)) => attempts.on_transport_failure(e, started_at),
        };
        match next {
            Next::Retry { delay } => {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
            Next::Done(result) => return result,
        }
    }
}

async fn run_async<H: LifecycleHandler>(mut attempts: AttemptLoop<H>, future: ResultFuture<H::Output>) {
    let wire = match attempts.wire_request() {
        Ok(wire) => wire,
        Err(e) => {
            future.failed(e);
            return;
        }
    };
    loop {
        let next = match attempts.start(&wire) {
            Ok(mut started) => {
                let (completion, outcome) = Completion::channel();
                started.call.send_async(wire.clone(), completion);
                let outcome = outcome.await.unwrap_or_else(|_| {
                    Err(TransportError::closed("call dropped its completion without an outcome"))
                });
                started.call.close();
                match outcome {
                    Ok(reply) => attempts.on_reply(reply, started.started_at),
                    Err(e) => attempts.on_transport_failure(e, started.started_at),
                }
            }
            Err((e, started_at)) => attempts.on_transport_failure(e, started_at),
        };
        match next {
            Next::Retry { delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Next::Done(Ok(value)) => {
                future.completed(value);
                return;
            }
            Next::Done(Err(e)) => {
                future.failed(e);
                return;
            }
        }
    }
}

/// EngineBuilder はエンジンを組み立てる
///
/// Every collaborator except the transport has a default:
/// `DefaultRetryPolicy` (backoff base from the config), `DefaultResponseFactory`,
/// `DefaultWireRequestBuilder`, `TracingLogSink`.
pub struct EngineBuilder {
    transport: Arc<dyn Transport>,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    response_factory: Arc<dyn ResponseFactory>,
    wire_builder: Arc<dyn WireRequestBuilder>,
    log_sink: Arc<dyn LogSink>,
    config: EngineConfig,
    runtime: Option<Handle>,
}

impl EngineBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry_policy: None,
            response_factory: Arc::new(DefaultResponseFactory),
            wire_builder: Arc::new(DefaultWireRequestBuilder),
            log_sink: Arc::new(TracingLogSink),
            config: EngineConfig::default(),
            runtime: None,
        }
    }

    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Some(Arc::new(policy));
        self
    }

    pub fn response_factory(mut self, factory: impl ResponseFactory + 'static) -> Self {
        self.response_factory = Arc::new(factory);
        self
    }

    pub fn wire_builder(mut self, builder: impl WireRequestBuilder + 'static) -> Self {
        self.wire_builder = Arc::new(builder);
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Runtime async requests are spawned on. Defaults to the runtime current
    /// at `execute` time.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> ExecutionEngine {
        let retry_policy = self
            .retry_policy
            .unwrap_or_else(|| Arc::new(DefaultRetryPolicy::new(self.config.backoff_base())));
        ExecutionEngine {
            parts: Arc::new(EngineParts {
                transport: self.transport,
                retry_policy,
                response_factory: self.response_factory,
                wire_builder: self.wire_builder,
                log_sink: self.log_sink,
            }),
            config: self.config,
            runtime: self.runtime,
        }
    }
}
