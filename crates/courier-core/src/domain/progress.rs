//! Download progress of a response body.
//!
//! The body is read in chunks; a report goes out every `step` bytes and once
//! more, with `done` set, when the body is drained.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use super::errors::TransportError;
use super::response::BodySource;

/// 10 KiB, like the original request model.
pub const DEFAULT_PROGRESS_STEP: u64 = 10 * 1024;

/// Largest chunk pulled from a body source in one read.
const MAX_CHUNK: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub current_bytes: u64,
    /// From the transport, when it knows the length up front.
    pub total_bytes: Option<u64>,
    pub done: bool,
}

impl Progress {
    /// Fraction read so far, in `0.0..=1.0`.
    pub fn rate(&self) -> Option<f64> {
        if self.done {
            return Some(1.0);
        }
        match self.total_bytes {
            Some(0) | None => None,
            Some(total) => Some((self.current_bytes as f64 / total as f64).min(1.0)),
        }
    }
}

/// Receives every progress report of one response.
pub type ProgressReporter = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Wraps a body source and reports progress while it is drained.
pub struct ProgressBody {
    inner: Box<dyn BodySource>,
    step: u64,
    reporter: ProgressReporter,
}

impl ProgressBody {
    pub fn new(inner: Box<dyn BodySource>, step: u64, reporter: ProgressReporter) -> Self {
        Self {
            inner,
            step,
            reporter,
        }
    }
}

impl BodySource for ProgressBody {
    fn read_all(&mut self) -> Result<Bytes, TransportError> {
        let total_bytes = self.inner.content_length();
        let chunk = self.step.clamp(1, MAX_CHUNK) as usize;
        let mut buf = BytesMut::new();
        let mut reported = 0u64;
        while let Some(bytes) = self.inner.read_chunk(chunk)? {
            buf.extend_from_slice(&bytes);
            let current_bytes = buf.len() as u64;
            if current_bytes - reported >= self.step {
                reported = current_bytes;
                (self.reporter)(&Progress {
                    current_bytes,
                    total_bytes,
                    done: false,
                });
            }
        }
        (self.reporter)(&Progress {
            current_bytes: buf.len() as u64,
            total_bytes,
            done: true,
        });
        Ok(buf.freeze())
    }

    fn content_length(&self) -> Option<u64> {
        self.inner.content_length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (ProgressReporter, Arc<Mutex<Vec<Progress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter: ProgressReporter = Arc::new(move |p: &Progress| sink.lock().unwrap().push(*p));
        (reporter, seen)
    }

    #[test]
    fn reports_every_step_then_done() {
        let (reporter, seen) = recording();
        let mut body = ProgressBody::new(Box::new(Bytes::from_static(&[7u8; 25])), 10, reporter);

        assert_eq!(body.read_all().unwrap().len(), 25);

        let seen = seen.lock().unwrap();
        let points: Vec<_> = seen.iter().map(|p| (p.current_bytes, p.done)).collect();
        assert_eq!(points, vec![(10, false), (20, false), (25, true)]);
        assert!(seen.iter().all(|p| p.total_bytes == Some(25)));
        assert_eq!(seen[0].rate(), Some(0.4));
    }

    #[test]
    fn empty_body_reports_done_once() {
        let (reporter, seen) = recording();
        let mut body = ProgressBody::new(Box::new(Bytes::new()), 10, reporter);

        assert!(body.read_all().unwrap().is_empty());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].done);
        assert_eq!(seen[0].rate(), Some(1.0));
    }

    struct UnsizedSource(Option<Bytes>);

    impl BodySource for UnsizedSource {
        fn read_all(&mut self) -> Result<Bytes, TransportError> {
            Ok(self.0.take().unwrap_or_default())
        }
    }

    #[test]
    fn single_chunk_sources_still_finish() {
        let (reporter, seen) = recording();
        let source = UnsizedSource(Some(Bytes::from_static(b"hello")));
        let mut body = ProgressBody::new(Box::new(source), 2, reporter);

        assert_eq!(body.read_all().unwrap(), Bytes::from_static(b"hello"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].current_bytes, 5);
        assert_eq!(seen[1].total_bytes, None);
        assert_eq!(seen[0].rate(), None);
    }
}
