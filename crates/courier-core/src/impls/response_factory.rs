//! DefaultResponseFactory - RawReply を Response に写す

use std::time::Instant;

use crate::domain::{Body, ProgressBody, ProgressReporter, RequestDescriptor, Response, ResponseParts};
use crate::ports::{RawReply, ResponseFactory};

/// Maps status and headers verbatim and wraps the body source for lazy reads,
/// reporting progress every `progress_step` bytes when a reporter is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResponseFactory;

impl ResponseFactory for DefaultResponseFactory {
    fn create_response(
        &self,
        descriptor: &RequestDescriptor,
        reply: Option<RawReply>,
        attempt: u32,
        started_at: Instant,
        progress: Option<ProgressReporter>,
    ) -> Response {
        let Some(reply) = reply else {
            return Response::sentinel(attempt, started_at);
        };
        let success = descriptor.is_success_status(reply.status);
        let body = match progress {
            Some(reporter) => Body::new(Box::new(ProgressBody::new(
                reply.body,
                descriptor.progress_step(),
                reporter,
            ))),
            None => Body::new(reply.body),
        };
        Response::from_parts(ResponseParts {
            status: reply.status,
            reason: reply.reason,
            headers: reply.headers,
            body,
            success,
            attempt,
            started_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::header::CONTENT_TYPE;
    use http::{HeaderMap, HeaderValue, Method, StatusCode};

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor::builder(Method::GET, "http://h/x").build().unwrap()
    }

    #[test]
    fn absent_reply_becomes_sentinel() {
        let r = DefaultResponseFactory.create_response(&descriptor(), None, 1, Instant::now(), None);
        assert!(r.is_sentinel());
        assert!(!r.is_success());
        assert_eq!(r.attempt(), 1);
    }

    #[test]
    fn status_and_headers_are_copied_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let reply = RawReply::new(StatusCode::CREATED, Bytes::from_static(b"{}")).with_headers(headers);

        let r = DefaultResponseFactory.create_response(&descriptor(), Some(reply), 0, Instant::now(), None);

        assert_eq!(r.status(), Some(StatusCode::CREATED));
        assert_eq!(r.reason(), Some("Created"));
        assert_eq!(r.header("content-type"), Some("application/json"));
        assert!(r.is_success());
        assert!(!r.is_body_materialized());
    }

    #[test]
    fn classification_uses_descriptor_predicate() {
        let d = RequestDescriptor::builder(Method::GET, "http://h")
            .success_when(|s| s.is_success() || s == StatusCode::NOT_MODIFIED)
            .build()
            .unwrap();
        let reply = RawReply::new(StatusCode::NOT_MODIFIED, Bytes::new());
        let r = DefaultResponseFactory.create_response(&d, Some(reply), 0, Instant::now(), None);
        assert!(r.is_success());

        let reply = RawReply::new(StatusCode::INTERNAL_SERVER_ERROR, Bytes::new());
        let r = DefaultResponseFactory.create_response(&d, Some(reply), 0, Instant::now(), None);
        assert!(r.is_error());
    }

    #[test]
    fn progress_is_reported_only_when_the_body_is_read() {
        use crate::domain::Progress;
        use std::sync::{Arc, Mutex};

        let seen = Arc::new(Mutex::new(Vec::<Progress>::new()));
        let sink = seen.clone();
        let d = RequestDescriptor::builder(Method::GET, "http://h")
            .progress_step(4)
            .build()
            .unwrap();
        let reply = RawReply::new(StatusCode::OK, Bytes::from_static(b"0123456789"));
        let r = DefaultResponseFactory.create_response(
            &d,
            Some(reply),
            0,
            Instant::now(),
            Some(Arc::new(move |p: &Progress| sink.lock().unwrap().push(*p))),
        );
        assert!(seen.lock().unwrap().is_empty());

        assert_eq!(r.text().unwrap(), "0123456789");
        r.body().unwrap();

        let points: Vec<_> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|p| (p.current_bytes, p.done))
            .collect();
        assert_eq!(points, vec![(4, false), (8, false), (10, true)]);
    }
}
