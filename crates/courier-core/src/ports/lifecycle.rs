//! LifecycleHandler port - 結果の受け取り手
//!
//! engine は終端結果をここに 1 回だけ渡します。

use crate::app::future::ResultFuture;
use crate::domain::{EngineError, Progress, RequestDescriptor, Response};

/// Capability set receiving a request's outcomes.
///
/// `Output` is what the caller ultimately gets: the response itself, a decoded
/// value, anything the handler derives from the response.
pub trait LifecycleHandler: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Delivery when the descriptor carries a user success callback.
    fn handle_success(
        &self,
        descriptor: &RequestDescriptor,
        response: Response,
    ) -> Result<Self::Output, EngineError>;

    /// Delivery without a user success callback. Also receives responses whose
    /// status failed the success predicate once retries are exhausted.
    fn handle_sync(
        &self,
        descriptor: &RequestDescriptor,
        response: Response,
    ) -> Result<Self::Output, EngineError>;

    /// Terminal failure. Called at most once per logical request.
    fn handle_error(&self, descriptor: &RequestDescriptor, response: &Response, cause: &EngineError);

    /// Body read progress of a delivered response. Runs on whichever thread
    /// reads the body.
    fn handle_progress(&self, _descriptor: &RequestDescriptor, _progress: &Progress) {}

    /// Called once, right after an async request was submitted.
    fn handle_future(&self, _future: &ResultFuture<Self::Output>) {}
}
