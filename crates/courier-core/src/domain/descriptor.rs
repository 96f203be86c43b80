//! RequestDescriptor: a fully resolved request, ready for transport.
//!
//! Built once by upstream collaborators (templating, body encoding) and handed
//! to the engine by value. The engine only reads it while an attempt is built;
//! nothing mutates it mid-attempt.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode};

use super::attachments::Attachments;
use super::errors::EngineError;
use super::progress::{DEFAULT_PROGRESS_STEP, Progress};
use super::response::Response;

/// Decides whether a status code counts as success.
pub type SuccessPredicate = Arc<dyn Fn(StatusCode) -> bool + Send + Sync>;

/// User callback run when a request succeeds.
pub type OnSuccess = Arc<dyn Fn(&Response) + Send + Sync>;

/// User callback run when a request ends in error.
pub type OnError = Arc<dyn Fn(&EngineError, &Response) + Send + Sync>;

/// User callback run while a response body is being read.
pub type OnProgress = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Conventional OK range: 2xx.
pub fn default_success_predicate() -> SuccessPredicate {
    Arc::new(|status: StatusCode| status.is_success())
}

/// Ordered header multimap.
///
/// Insertion order is preserved and duplicate names are allowed. Lookups are
/// case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, String)>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One multipart part. Encoding multipart bodies is left to the transport side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// One fragment of the request body, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyPart {
    Text(String),
    Bytes(Bytes),
    /// Form field (`name=value`).
    Field { name: String, value: String },
    Part(Multipart),
}

#[derive(Clone)]
pub struct RequestDescriptor {
    url: String,
    method: Method,
    headers: HeaderList,
    query: Vec<(String, String)>,
    body: Vec<BodyPart>,
    content_type: Option<String>,
    content_encoding: Option<String>,
    user_agent: Option<String>,
    charset: Option<String>,
    timeout: Duration,
    retry_count: u32,
    max_retry_interval: Duration,
    async_mode: bool,
    log_enabled: bool,
    success_predicate: SuccessPredicate,
    on_success: Option<OnSuccess>,
    on_error: Option<OnError>,
    on_progress: Option<OnProgress>,
    progress_step: u64,
    attachments: Attachments,
}

impl RequestDescriptor {
    pub fn builder(method: Method, url: impl Into<String>) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder::new(method, url)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Upper-cased scheme of the URL, `HTTP` when none is given.
    pub fn scheme(&self) -> String {
        match self.url.split_once("://") {
            Some((scheme, _)) if !scheme.is_empty() => scheme.to_ascii_uppercase(),
            _ => "HTTP".to_string(),
        }
    }

    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> &[BodyPart] {
        &self.body
    }

    pub fn multiparts(&self) -> impl Iterator<Item = &Multipart> {
        self.body.iter().filter_map(|p| match p {
            BodyPart::Part(m) => Some(m),
            _ => None,
        })
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.content_encoding.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of retries allowed after the first attempt.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retry_interval(&self) -> Duration {
        self.max_retry_interval
    }

    pub fn is_async(&self) -> bool {
        self.async_mode
    }

    pub fn is_log_enabled(&self) -> bool {
        self.log_enabled
    }

    pub fn is_success_status(&self, status: StatusCode) -> bool {
        (self.success_predicate)(status)
    }

    pub fn on_success(&self) -> Option<&OnSuccess> {
        self.on_success.as_ref()
    }

    pub fn on_error(&self) -> Option<&OnError> {
        self.on_error.as_ref()
    }

    pub fn on_progress(&self) -> Option<&OnProgress> {
        self.on_progress.as_ref()
    }

    /// Bytes between two progress reports.
    pub fn progress_step(&self) -> u64 {
        self.progress_step
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub fn attachments_mut(&mut self) -> &mut Attachments {
        &mut self.attachments
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("body_parts", &self.body.len())
            .field("timeout", &self.timeout)
            .field("retry_count", &self.retry_count)
            .field("max_retry_interval", &self.max_retry_interval)
            .field("async_mode", &self.async_mode)
            .field("log_enabled", &self.log_enabled)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("progress_step", &self.progress_step)
            .field("attachments", &self.attachments)
            .finish()
    }
}

/// Builder for [`RequestDescriptor`].
///
/// Defaults match [`crate::domain::EngineConfig::default`]: 3s timeout, no
/// retries, logging on, 2xx is success.
pub struct RequestDescriptorBuilder {
    inner: RequestDescriptor,
}

impl RequestDescriptorBuilder {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            inner: RequestDescriptor {
                url: url.into(),
                method,
                headers: HeaderList::new(),
                query: Vec::new(),
                body: Vec::new(),
                content_type: None,
                content_encoding: None,
                user_agent: None,
                charset: None,
                timeout: Duration::from_millis(3000),
                retry_count: 0,
                max_retry_interval: Duration::ZERO,
                async_mode: false,
                log_enabled: true,
                success_predicate: default_success_predicate(),
                on_success: None,
                on_error: None,
                on_progress: None,
                progress_step: DEFAULT_PROGRESS_STEP,
                attachments: Attachments::new(),
            },
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.headers.add(name, value);
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.query.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, part: BodyPart) -> Self {
        self.inner.body.push(part);
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.body(BodyPart::Text(text.into()))
    }

    pub fn field(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.body(BodyPart::Field {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.inner.content_type = Some(content_type.into());
        self
    }

    pub fn content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.inner.content_encoding = Some(encoding.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.inner.user_agent = Some(user_agent.into());
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.inner.charset = Some(charset.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner.timeout = timeout;
        self
    }

    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.inner.retry_count = retry_count;
        self
    }

    pub fn max_retry_interval(mut self, interval: Duration) -> Self {
        self.inner.max_retry_interval = interval;
        self
    }

    pub fn async_mode(mut self, async_mode: bool) -> Self {
        self.inner.async_mode = async_mode;
        self
    }

    pub fn log_enabled(mut self, enabled: bool) -> Self {
        self.inner.log_enabled = enabled;
        self
    }

    pub fn success_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.inner.success_predicate = Arc::new(predicate);
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        self.inner.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&EngineError, &Response) + Send + Sync + 'static,
    {
        self.inner.on_error = Some(Arc::new(callback));
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.inner.on_progress = Some(Arc::new(callback));
        self
    }

    /// Report progress every `step` bytes. Zero reports after every chunk.
    pub fn progress_step(mut self, step: u64) -> Self {
        self.inner.progress_step = step;
        self
    }

    pub fn attachments(mut self, attachments: Attachments) -> Self {
        self.inner.attachments = attachments;
        self
    }

    /// Finish the descriptor. Only an empty URL is rejected here; full URL
    /// validation happens when the wire request is built.
    pub fn build(self) -> Result<RequestDescriptor, EngineError> {
        if self.inner.url.trim().is_empty() {
            return Err(EngineError::InvalidRequest("url must not be empty".to_string()));
        }
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn builder_defaults_match_original_request_model() {
        let d = RequestDescriptor::builder(Method::GET, "http://localhost/a")
            .build()
            .unwrap();
        assert_eq!(d.timeout(), Duration::from_millis(3000));
        assert_eq!(d.retry_count(), 0);
        assert_eq!(d.max_retry_interval(), Duration::ZERO);
        assert!(!d.is_async());
        assert!(d.is_log_enabled());
        assert_eq!(d.progress_step(), 10 * 1024);
        assert!(d.on_progress().is_none());
        assert!(d.on_success().is_none());
    }

    #[test]
    fn empty_url_is_rejected() {
        let err = RequestDescriptor::builder(Method::GET, "  ").build().unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
    }

    #[test]
    fn header_list_keeps_order_and_duplicates() {
        let d = RequestDescriptor::builder(Method::GET, "http://localhost")
            .header("Accept", "text/plain")
            .header("X-Tag", "a")
            .header("x-tag", "b")
            .build()
            .unwrap();

        let names: Vec<_> = d.headers().iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Accept", "X-Tag", "x-tag"]);
        assert_eq!(d.headers().get("X-TAG"), Some("a"));
        assert_eq!(d.headers().get_all("x-tag").collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[rstest]
    #[case::https("https://example.com/x", "HTTPS")]
    #[case::http("http://example.com", "HTTP")]
    #[case::missing("example.com/x", "HTTP")]
    fn scheme_is_upper_cased(#[case] url: &str, #[case] expected: &str) {
        let d = RequestDescriptor::builder(Method::GET, url).build().unwrap();
        assert_eq!(d.scheme(), expected);
    }

    #[rstest]
    #[case(StatusCode::OK, true)]
    #[case(StatusCode::NO_CONTENT, true)]
    #[case(StatusCode::MOVED_PERMANENTLY, false)]
    #[case(StatusCode::NOT_FOUND, false)]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, false)]
    fn default_predicate_accepts_2xx_only(#[case] status: StatusCode, #[case] ok: bool) {
        let d = RequestDescriptor::builder(Method::GET, "http://h").build().unwrap();
        assert_eq!(d.is_success_status(status), ok);
    }

    #[test]
    fn custom_predicate_replaces_default() {
        let d = RequestDescriptor::builder(Method::GET, "http://h")
            .success_when(|s| s == StatusCode::NOT_FOUND)
            .build()
            .unwrap();
        assert!(d.is_success_status(StatusCode::NOT_FOUND));
        assert!(!d.is_success_status(StatusCode::OK));
    }

    #[test]
    fn multiparts_are_filtered_from_body() {
        let d = RequestDescriptor::builder(Method::POST, "http://h")
            .text("a")
            .body(BodyPart::Part(Multipart {
                name: "file".to_string(),
                filename: Some("a.txt".to_string()),
                content_type: None,
                data: Bytes::from_static(b"hi"),
            }))
            .build()
            .unwrap();
        assert_eq!(d.body().len(), 2);
        assert_eq!(d.multiparts().count(), 1);
    }
}
