use std::sync::Mutex;
use tracing::debug;

/// Sink for the engine's per-rule and terminal-outcome log lines. Anything
/// that can append one textual record satisfies the contract; logging never
/// affects control flow.
pub trait RewriteLogger: Send + Sync {
    fn log(&self, message: &str);
}

/// Default logger: forwards every line to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RewriteLogger for TracingLogger {
    fn log(&self, message: &str) {
        debug!(target: "urlrewrite", "{}", message);
    }
}

/// Collects log lines in memory, for golden-output comparison in tests and
/// for the CLI.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    messages: Mutex<Vec<String>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Remove and return all collected lines.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    /// All collected lines joined with newlines.
    pub fn to_text(&self) -> String {
        self.messages().join("\n")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        // A poisoned log buffer is still a usable log buffer.
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RewriteLogger for MemoryLogger {
    fn log(&self, message: &str) {
        self.lock().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_logger_collects_in_order() {
        let logger = MemoryLogger::new();
        logger.log("first");
        logger.log("second");
        assert_eq!(logger.messages(), vec!["first", "second"]);
        assert_eq!(logger.to_text(), "first\nsecond");

        assert_eq!(logger.drain().len(), 2);
        assert!(logger.messages().is_empty());
    }
}
