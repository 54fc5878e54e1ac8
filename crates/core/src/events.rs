use crate::types::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An entry in an execution's log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Truncated rendering of the node result, present on success entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            node_id: None,
            result: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn with_node(mut self, node_id: &NodeId) -> Self {
        self.node_id = Some(node_id.clone());
        self
    }

    pub fn with_result(mut self, preview: String) -> Self {
        self.result = Some(preview);
        self
    }
}

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Render a value for a log preview, keeping at most `max_chars` characters.
pub fn preview(value: &serde_json::Value, max_chars: usize) -> String {
    let rendered = match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    match rendered.char_indices().nth(max_chars) {
        Some((cut, _)) => rendered[..cut].to_string(),
        None => rendered,
    }
}
