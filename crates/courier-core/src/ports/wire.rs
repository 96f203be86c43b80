//! WireRequestBuilder port - descriptor から送信可能な request を組み立てる
//!
//! URL templating や content-type 別の body encoding はこの port の外側の責務。
//! engine は build() を呼ぶだけです。

use std::time::Duration;

use bytes::Bytes;
use http::Method;
use url::Url;

use crate::domain::{EngineError, HeaderList, RequestDescriptor};

/// Method, URL, headers and body ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderList,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

pub trait WireRequestBuilder: Send + Sync {
    fn build(&self, descriptor: &RequestDescriptor) -> Result<WireRequest, EngineError>;
}
