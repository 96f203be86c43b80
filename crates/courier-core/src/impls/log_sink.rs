//! LogSink implementations.

use std::sync::Mutex;

use crate::ports::LogSink;

/// Default sink: one `tracing` info event per log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, content: &str) {
        tracing::info!(target: "courier", "[Courier] {content}");
    }
}

/// Keeps every line in memory. Useful in tests and for debugging a single run.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|l| l.starts_with(prefix))
            .count()
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, content: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(content.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemoryLogSink::new();
        sink.log("Request: a");
        sink.log("Response: b");
        sink.log("Request: c");

        assert_eq!(sink.lines(), vec!["Request: a", "Response: b", "Request: c"]);
        assert_eq!(sink.count_starting_with("Request:"), 2);
    }
}
