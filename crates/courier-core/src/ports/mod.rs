//! Ports - 抽象化レイヤー
//!
//! engine が外部に依存する箇所はすべてここの trait を経由します。
//! 実装は `impls` にあり、差し替えても engine は変わりません。

pub mod lifecycle;
pub mod log_sink;
pub mod response_factory;
pub mod retry_policy;
pub mod transport;
pub mod wire;

pub use self::lifecycle::LifecycleHandler;
pub use self::log_sink::LogSink;
pub use self::response_factory::ResponseFactory;
pub use self::retry_policy::RetryPolicy;
pub use self::transport::{Call, Completion, RawReply, Transport};
pub use self::wire::{WireRequest, WireRequestBuilder};
