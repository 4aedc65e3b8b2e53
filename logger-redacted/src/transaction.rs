use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::redact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub depth: usize,
    pub level: LogLevel,
    pub message: String,
}

/// Log trace of a single mail transaction.
///
/// Lines are indented by the nesting depth of the stage that wrote them and
/// are mirrored to `tracing` with the transaction id attached.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionLog {
    id: String,
    depth: usize,
    lines: Vec<LogLine>,
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            depth: 0,
            lines: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Opens a nested stage.
    pub fn enter(&mut self, stage: &str) {
        self.info(&format!("{stage} - start"));
        self.depth += 1;
    }

    /// Closes the innermost stage.
    pub fn leave(&mut self, stage: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.info(&format!("{stage} - finished"));
    }

    pub fn info(&mut self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: &str) {
        self.push(LogLevel::Warn, message);
    }

    pub fn error(&mut self, message: &str) {
        self.push(LogLevel::Error, message);
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.message.contains(needle))
    }

    /// Renders the trace with two spaces of indentation per depth level.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string());
            out.push(' ');
            out.push_str(&"  ".repeat(line.depth));
            out.push_str(&line.message);
            out.push('\n');
        }
        out
    }

    fn push(&mut self, level: LogLevel, message: &str) {
        let shown = redact(message);
        match level {
            LogLevel::Info => tracing::info!(transaction_id = %self.id, depth = self.depth, "{}", shown),
            LogLevel::Warn => tracing::warn!(transaction_id = %self.id, depth = self.depth, "{}", shown),
            LogLevel::Error => tracing::error!(transaction_id = %self.id, depth = self.depth, "{}", shown),
        }
        self.lines.push(LogLine {
            timestamp: Utc::now(),
            depth: self.depth,
            level,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_depth() {
        let mut log = TransactionLog::with_id("tx-1");
        log.enter("sign");
        log.info("card selected");
        log.leave("sign");
        log.leave("unbalanced");

        let depths: Vec<_> = log.lines().iter().map(|l| l.depth).collect();
        assert_eq!(depths, vec![0, 1, 0, 0]);
        assert_eq!(log.depth(), 0);
        assert!(log.render().contains("  card selected"));
    }

    #[test]
    fn test_lines_keep_levels() {
        let mut log = TransactionLog::new();
        log.warn("no certificate");
        log.error("X009 - signing failed");
        assert_eq!(log.lines()[0].level, LogLevel::Warn);
        assert!(log.contains("X009"));
        assert_eq!(log.id().len(), 36);
    }
}
