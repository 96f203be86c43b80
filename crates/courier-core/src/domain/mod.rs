//! Domain model (descriptor, response, progress, retry context, errors, config).

pub mod attachments;
pub mod config;
pub mod descriptor;
pub mod errors;
pub mod progress;
pub mod response;
pub mod retry;

pub use attachments::{AttachmentKey, Attachments};
pub use config::EngineConfig;
pub use descriptor::{
    BodyPart, HeaderList, Multipart, OnError, OnProgress, OnSuccess, RequestDescriptor,
    RequestDescriptorBuilder, SuccessPredicate, default_success_predicate,
};
pub use errors::{EngineError, TransportError, TransportErrorKind};
pub use progress::{DEFAULT_PROGRESS_STEP, Progress, ProgressBody, ProgressReporter};
pub use response::{Body, BodySource, Response, ResponseParts};
pub use retry::{FailureCause, RetryContext, RetryDecision};
