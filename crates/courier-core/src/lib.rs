//! courier-core
//!
//! Request execution engine: turns a request descriptor into one or more
//! transport attempts and delivers exactly one outcome.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（descriptor, response, retry context, errors, config）
//! - **ports**: 抽象化レイヤー（Transport, RetryPolicy, ResponseFactory, LifecycleHandler, など）
//! - **app**: 実行ロジック（ExecutionEngine, attempt loop, ResultFuture）
//! - **impls**: 実装（DefaultRetryPolicy, ScriptedTransport, ReqwestTransport など）

pub mod domain;
pub mod ports;
pub mod app;
pub mod impls;

pub use app::{EngineBuilder, Execution, ExecutionEngine, FutureState, ResultFuture};
pub use domain::{EngineConfig, EngineError, RequestDescriptor, Response, TransportError};

pub use http;
