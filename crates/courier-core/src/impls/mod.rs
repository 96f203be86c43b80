//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **DefaultRetryPolicy / ExponentialBackoff / NeverRetry**: retry 判断
//! - **DefaultResponseFactory**: RawReply → Response
//! - **DefaultWireRequestBuilder**: descriptor → WireRequest
//! - **ResponseHandler / DecodingHandler**: LifecycleHandler
//! - **TracingLogSink / MemoryLogSink**: request / response ログの出力先
//! - **ScriptedTransport**: 開発・テスト用の Transport
//! - **ReqwestTransport**: reqwest による Transport（`reqwest` feature）

pub mod handlers;
pub mod log_sink;
pub mod response_factory;
pub mod retry;
pub mod scripted;
pub mod wire;

#[cfg(feature = "reqwest")]
pub mod reqwest_transport;

// 主要な型を再エクスポート
pub use self::handlers::{DecodingHandler, ResponseHandler};
pub use self::log_sink::{MemoryLogSink, TracingLogSink};
pub use self::response_factory::DefaultResponseFactory;
pub use self::retry::{DefaultRetryPolicy, ExponentialBackoff, NeverRetry};
pub use self::scripted::{CompletionThread, ScriptedTransport, Step, TransportStats};
pub use self::wire::DefaultWireRequestBuilder;

#[cfg(feature = "reqwest")]
pub use self::reqwest_transport::ReqwestTransport;
