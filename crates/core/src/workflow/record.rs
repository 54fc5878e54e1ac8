use crate::events::LogEntry;
use crate::types::{ExecutionId, ExecutionStatus, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Mutable state and log of one workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub status: ExecutionStatus,
    pub current_node: Option<NodeId>,
    pub variables: Map<String, Value>,
    pub log: Vec<LogEntry>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    pub fn new(id: ExecutionId, input: Option<Value>) -> Self {
        let mut variables = Map::new();
        variables.insert("input".to_string(), input.unwrap_or(Value::Null));

        Self {
            id,
            status: ExecutionStatus::Running,
            current_node: None,
            variables,
            log: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// Move into a terminal status. Only the first transition out of
    /// `running` takes effect; later calls return false.
    pub fn finish(&mut self, status: ExecutionStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.end_time = Some(Utc::now());
        true
    }

    /// Seconds from start to end, or to now while still running
    pub fn duration_secs(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            id: self.id,
            status: self.status,
            current_node: self.current_node.clone(),
            progress: self.log.len(),
            start_time: self.start_time,
            end_time: self.end_time,
            duration: self.duration_secs(),
        }
    }
}

/// Point-in-time view of an execution for status polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub id: ExecutionId,
    pub status: ExecutionStatus,
    pub current_node: Option<NodeId>,
    /// Number of log entries written so far
    pub progress: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: f64,
}

/// Shared handle to an execution record.
///
/// The run that created the record is its only writer of log and
/// variables; other holders only read or flip the status through `stop`.
#[derive(Clone)]
pub struct RecordHandle {
    id: ExecutionId,
    inner: Arc<RwLock<ExecutionRecord>>,
}

impl RecordHandle {
    pub fn new(record: ExecutionRecord) -> Self {
        Self {
            id: record.id,
            inner: Arc::new(RwLock::new(record)),
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub async fn append(&self, entry: LogEntry) {
        self.inner.write().await.log.push(entry);
    }

    pub async fn set_current_node(&self, node_id: &NodeId) {
        self.inner.write().await.current_node = Some(node_id.clone());
    }

    pub async fn variables(&self) -> Map<String, Value> {
        self.inner.read().await.variables.clone()
    }

    pub async fn variable(&self, key: &str) -> Option<Value> {
        self.inner.read().await.variables.get(key).cloned()
    }

    pub async fn set_variable(&self, key: impl Into<String>, value: Value) {
        self.inner.write().await.variables.insert(key.into(), value);
    }

    pub async fn status(&self) -> ExecutionStatus {
        self.inner.read().await.status
    }

    pub async fn finish(&self, status: ExecutionStatus) -> bool {
        self.inner.write().await.finish(status)
    }

    /// Transition `running -> stopped`; false if the record was not running
    pub async fn stop(&self) -> bool {
        self.finish(ExecutionStatus::Stopped).await
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().await.snapshot()
    }

    pub async fn record(&self) -> ExecutionRecord {
        self.inner.read().await.clone()
    }
}

/// In-memory map of every execution started by an executor
#[derive(Clone, Default)]
pub struct ExecutionRegistry {
    records: Arc<RwLock<HashMap<ExecutionId, RecordHandle>>>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and retain a fresh running record
    pub async fn open(&self, input: Option<Value>) -> RecordHandle {
        let handle = RecordHandle::new(ExecutionRecord::new(ExecutionId::new(), input));
        self.records
            .write()
            .await
            .insert(handle.id(), handle.clone());
        handle
    }

    pub async fn get(&self, id: ExecutionId) -> Option<RecordHandle> {
        self.records.read().await.get(&id).cloned()
    }

    pub async fn snapshots(&self) -> Vec<StatusSnapshot> {
        let handles: Vec<RecordHandle> = self.records.read().await.values().cloned().collect();
        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            snapshots.push(handle.snapshot().await);
        }
        snapshots.sort_by_key(|s| s.start_time);
        snapshots
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_status_is_set_once() {
        let mut record = ExecutionRecord::new(ExecutionId::new(), None);
        assert!(record.finish(ExecutionStatus::Failed));
        let end = record.end_time;
        assert!(end.is_some());

        assert!(!record.finish(ExecutionStatus::Completed));
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.end_time, end);
    }

    #[test]
    fn test_cannot_finish_into_running() {
        let mut record = ExecutionRecord::new(ExecutionId::new(), None);
        assert!(!record.finish(ExecutionStatus::Running));
        assert!(record.end_time.is_none());
    }

    #[test]
    fn test_variables_seeded_with_input() {
        let record = ExecutionRecord::new(ExecutionId::new(), Some(json!({"q": 1})));
        assert_eq!(record.variables["input"], json!({"q": 1}));
    }

    #[tokio::test]
    async fn test_registry_retains_records() {
        let registry = ExecutionRegistry::new();
        let handle = registry.open(None).await;
        handle.append(LogEntry::info("hello")).await;

        let found = registry.get(handle.id()).await.unwrap();
        let snapshot = found.snapshot().await;
        assert_eq!(snapshot.progress, 1);
        assert_eq!(snapshot.status, ExecutionStatus::Running);
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(ExecutionId::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_stop_only_applies_while_running() {
        let registry = ExecutionRegistry::new();
        let handle = registry.open(None).await;

        assert!(handle.stop().await);
        assert_eq!(handle.status().await, ExecutionStatus::Stopped);
        assert!(!handle.stop().await);
        assert!(!handle.finish(ExecutionStatus::Completed).await);
        assert_eq!(handle.status().await, ExecutionStatus::Stopped);
    }
}
