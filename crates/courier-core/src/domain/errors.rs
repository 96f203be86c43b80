//! Errors - エラー型と分類
//!
//! - `TransportError`: reply が得られなかった（connect / timeout / reset）
//! - `EngineError`: engine が caller / handler に渡す終端エラー

use std::fmt;

use http::StatusCode;

/// TransportError の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    Connect,
    Timeout,
    Reset,
    /// The call object was closed or dropped before it produced an outcome.
    Closed,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Reset => "reset",
            TransportErrorKind::Closed => "closed",
            TransportErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// No reply was obtained for an attempt.
///
/// `Clone` so the same cause can be handed to the lifecycle handler and to the
/// result future.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport error ({kind}): {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn reset(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Reset, message)
    }

    pub fn closed(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Closed, message)
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// EngineError は engine の終端エラー
///
/// # 分類
/// - Transport: reply なし（retry 対象）
/// - Application: reply あり、success predicate で失敗判定（retry 対象）
/// - RetryExhausted: RetryPolicy が次の attempt を拒否した
/// - Decode: response body を結果型に変換できなかった
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("application error: status={status} {reason}")]
    Application { status: StatusCode, reason: String },

    #[error("retry exhausted after {attempts} attempts: {cause}")]
    RetryExhausted {
        attempts: u32,
        cause: Box<EngineError>,
    },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("async execution requires a tokio runtime")]
    NoRuntime,

    /// The value of a [`ResultFuture`](crate::app::ResultFuture) was already
    /// taken by another clone.
    #[error("result already taken")]
    ResultTaken,
}

impl EngineError {
    pub fn application(status: StatusCode) -> Self {
        Self::Application {
            status,
            reason: status.canonical_reason().unwrap_or("").to_string(),
        }
    }

    /// The failure that ended the request, with `RetryExhausted` unwrapped.
    pub fn root_cause(&self) -> &EngineError {
        match self {
            EngineError::RetryExhausted { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        match self.root_cause() {
            EngineError::Transport(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.transport_error().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_unwraps_nested_retry_exhausted() {
        let cause = TransportError::reset("peer reset");
        let err = EngineError::RetryExhausted {
            attempts: 3,
            cause: Box::new(EngineError::Transport(cause.clone())),
        };

        assert_eq!(err.root_cause(), &EngineError::Transport(cause.clone()));
        assert_eq!(err.transport_error(), Some(&cause));
        assert!(err.is_transport());
    }

    #[test]
    fn display_includes_kind_and_attempts() {
        let err = EngineError::RetryExhausted {
            attempts: 2,
            cause: Box::new(TransportError::timeout("read timed out").into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("2 attempts"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn application_error_is_not_transport() {
        let err = EngineError::application(StatusCode::BAD_GATEWAY);
        assert!(!err.is_transport());
        assert!(err.to_string().contains("502"));
    }
}
