//! Execution store
//!
//! Holds the active-execution table and the append-only history list.
//! Currently in-memory only; executions are never persisted.

use crate::models::WorkflowExecution;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Trait for execution bookkeeping
#[async_trait::async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Record an execution that has started running.
    async fn begin(&self, execution: &WorkflowExecution) -> Result<()>;
    /// Move a terminal execution from the active table to history. Archiving
    /// the same execution twice keeps the first record.
    async fn complete(&self, execution: &WorkflowExecution) -> Result<()>;
    async fn get(&self, execution_id: Uuid) -> Result<Option<WorkflowExecution>>;
    async fn active(&self) -> Result<Vec<WorkflowExecution>>;
    /// The `limit` most recent terminal executions, oldest first.
    async fn history(&self, limit: usize) -> Result<Vec<WorkflowExecution>>;
}

/// In-memory execution store
pub struct InMemoryExecutionStore {
    active: Arc<RwLock<HashMap<Uuid, WorkflowExecution>>>,
    history: Arc<RwLock<Vec<WorkflowExecution>>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self {
            active: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryExecutionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn begin(&self, execution: &WorkflowExecution) -> Result<()> {
        let mut active = self.active.write().await;
        active.insert(execution.execution_id, execution.clone());
        Ok(())
    }

    async fn complete(&self, execution: &WorkflowExecution) -> Result<()> {
        let was_active = {
            let mut active = self.active.write().await;
            active.remove(&execution.execution_id).is_some()
        };

        // single writer at a time; concurrent completions append in lock order
        let mut history = self.history.write().await;
        if !was_active && history.iter().any(|e| e.execution_id == execution.execution_id) {
            return Ok(());
        }
        history.push(execution.clone());
        Ok(())
    }

    async fn get(&self, execution_id: Uuid) -> Result<Option<WorkflowExecution>> {
        {
            let active = self.active.read().await;
            if let Some(execution) = active.get(&execution_id) {
                return Ok(Some(execution.clone()));
            }
        }

        let history = self.history.read().await;
        Ok(history
            .iter()
            .rev()
            .find(|e| e.execution_id == execution_id)
            .cloned())
    }

    async fn active(&self) -> Result<Vec<WorkflowExecution>> {
        let active = self.active.read().await;
        let mut executions: Vec<WorkflowExecution> = active.values().cloned().collect();
        executions.sort_by_key(|e| e.created_at);
        Ok(executions)
    }

    async fn history(&self, limit: usize) -> Result<Vec<WorkflowExecution>> {
        let history = self.history.read().await;
        let start = history.len().saturating_sub(limit);
        Ok(history[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ComplexityTier, ExecutionContext, ExecutionPattern, ExecutionStatus, WorkflowCategory,
        WorkflowDefinition,
    };
    use tokio_test::assert_ok;

    fn execution() -> WorkflowExecution {
        let definition = Arc::new(WorkflowDefinition::new(
            "TST001",
            "Store test",
            WorkflowCategory::Operations,
            ExecutionPattern::Sequential,
            ComplexityTier::Simple,
            &["Process account updates"],
        ));
        let mut execution = WorkflowExecution::new(definition, ExecutionContext::new());
        execution.transition(ExecutionStatus::InProgress).unwrap();
        execution
    }

    #[tokio::test]
    async fn test_active_then_history() {
        let store = InMemoryExecutionStore::new();
        let mut exec = execution();

        assert_ok!(store.begin(&exec).await);
        assert_eq!(assert_ok!(store.active().await).len(), 1);
        assert_eq!(
            store.get(exec.execution_id).await.unwrap().unwrap().status,
            ExecutionStatus::InProgress
        );

        exec.complete(serde_json::Value::Null).unwrap();
        store.complete(&exec).await.unwrap();

        assert!(store.active().await.unwrap().is_empty());
        let stored = store.get(exec.execution_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_limit_keeps_most_recent() {
        let store = InMemoryExecutionStore::new();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let mut exec = execution();
            exec.complete(serde_json::Value::Null).unwrap();
            ids.push(exec.execution_id);
            store.complete(&exec).await.unwrap();
        }

        let recent: Vec<Uuid> = store
            .history(2)
            .await
            .unwrap()
            .iter()
            .map(|e| e.execution_id)
            .collect();
        assert_eq!(recent, ids[3..].to_vec());
        assert_eq!(store.history(50).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_completions_are_all_recorded() {
        let store = Arc::new(InMemoryExecutionStore::new());

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut exec = execution();
                    store.begin(&exec).await.unwrap();
                    exec.complete(serde_json::Value::Null).unwrap();
                    store.complete(&exec).await.unwrap();
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.history(usize::MAX).await.unwrap().len(), 32);
        assert!(store.active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_archive_keeps_first_record() {
        let store = InMemoryExecutionStore::new();
        let mut exec = execution();
        assert_ok!(store.begin(&exec).await);

        let mut abandoned = exec.clone();
        exec.complete(serde_json::Value::Null).unwrap();
        assert_ok!(store.complete(&exec).await);

        abandoned.cancel("dropped").unwrap();
        assert_ok!(store.complete(&abandoned).await);

        let history = assert_ok!(store.history(usize::MAX).await);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ExecutionStatus::Completed);
    }
}
