use crate::errors::{AgentError, Result};
use crate::types::{Action, ExecutionResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Completed,
    Failed,
}

/// Latest known state of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub request_id: String,
    pub command: String,
    pub status: ExecutionStatus,
    pub result: Option<ExecutionResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One finished execution, kept for the history listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub request_id: String,
    pub command: String,
    pub context: Option<String>,
    pub actions: Vec<Action>,
    pub result: ExecutionResult,
    pub recorded_at: DateTime<Utc>,
}

/// Where request status and history live. Last write wins.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create(&self, request_id: &str, command: &str) -> Result<()>;

    async fn update(&self, request_id: &str, result: &ExecutionResult) -> Result<()>;

    async fn get(&self, request_id: &str) -> Result<Option<ExecutionRecord>>;

    async fn append_history(&self, record: HistoryRecord) -> Result<()>;

    /// Newest first.
    async fn history(&self, skip: usize, limit: usize) -> Result<Vec<HistoryRecord>>;
}

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, ExecutionRecord>>,
    history: RwLock<Vec<HistoryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create(&self, request_id: &str, command: &str) -> Result<()> {
        let now = Utc::now();
        self.records.write().await.insert(
            request_id.to_string(),
            ExecutionRecord {
                request_id: request_id.to_string(),
                command: command.to_string(),
                status: ExecutionStatus::Pending,
                result: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn update(&self, request_id: &str, result: &ExecutionResult) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(request_id)
            .ok_or_else(|| AgentError::UnknownRequest(request_id.to_string()))?;
        record.status = if result.success {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        record.result = Some(result.clone());
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, request_id: &str) -> Result<Option<ExecutionRecord>> {
        Ok(self.records.read().await.get(request_id).cloned())
    }

    async fn append_history(&self, record: HistoryRecord) -> Result<()> {
        self.history.write().await.push(record);
        Ok(())
    }

    async fn history(&self, skip: usize, limit: usize) -> Result<Vec<HistoryRecord>> {
        Ok(self
            .history
            .read()
            .await
            .iter()
            .rev()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }
}
