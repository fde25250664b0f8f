//! Long-running task records and the `tasks/*` state machine.
//!
//! Every accepted tool call gets a task record. Records live for the
//! process lifetime and are listed by `tasks/list`; state changes emit a
//! `notifications/tasks/status` notification through whatever
//! server→client path is attached to the current request.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use tessera_mcp_protocol::methods;
use tessera_mcp_protocol::{McpError, McpResult};

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Working,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Working)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Working => "working",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// One task record, serialized verbatim on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub status: TaskStatus,
    #[serde(rename = "requestId")]
    pub request_id: Value,
    #[serde(rename = "toolName")]
    pub tool_name: String,
    #[serde(rename = "createdAt")]
    pub created_at: f64,
    #[serde(rename = "updatedAt")]
    pub updated_at: f64,
    pub result: Option<Value>,
    pub error: Option<Value>,
    pub message: Option<String>,
}

impl TaskRecord {
    pub fn to_value(&self) -> Value {
        // Infallible for this shape.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// The in-process task store.
pub struct TaskManager {
    store: Mutex<TaskStore>,
}

#[derive(Default)]
struct TaskStore {
    records: HashMap<String, TaskRecord>,
    /// Creation order, for stable `tasks/list` pages.
    order: Vec<String>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(TaskStore::default()),
        }
    }

    /// Create a task for an accepted tool call; initial status `working`.
    pub fn create(&self, request_id: Value, tool_name: &str) -> String {
        let task_id: String = Uuid::new_v4().simple().to_string()[..16].to_string();
        let now = now_epoch();
        let record = TaskRecord {
            id: task_id.clone(),
            status: TaskStatus::Working,
            request_id,
            tool_name: tool_name.to_string(),
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
            message: None,
        };
        let mut store = self.store.lock();
        store.order.push(task_id.clone());
        store.records.insert(task_id.clone(), record);
        task_id
    }

    /// Update a task's status; unknown ids are ignored.
    pub fn update(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<Value>,
        error: Option<Value>,
        message: Option<String>,
    ) {
        let mut store = self.store.lock();
        if let Some(record) = store.records.get_mut(task_id) {
            record.status = status;
            record.updated_at = now_epoch();
            if result.is_some() {
                record.result = result;
            }
            if error.is_some() {
                record.error = error;
            }
            if message.is_some() {
                record.message = message;
            }
        }
    }

    pub fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.store.lock().records.get(task_id).cloned()
    }

    /// All records in creation order, as wire values.
    pub fn list(&self) -> Vec<Value> {
        let store = self.store.lock();
        store
            .order
            .iter()
            .filter_map(|id| store.records.get(id))
            .map(TaskRecord::to_value)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.store.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().records.is_empty()
    }

    /// `tasks/get`: the record verbatim.
    pub fn handle_get(&self, task_id: &str) -> McpResult<Value> {
        self.get(task_id)
            .map(|r| r.to_value())
            .ok_or_else(|| McpError::UnknownTask(task_id.to_string()))
    }

    /// `tasks/result`: the record, only once it has completed or failed.
    pub fn handle_result(&self, task_id: &str) -> McpResult<Value> {
        let record = self
            .get(task_id)
            .ok_or_else(|| McpError::UnknownTask(task_id.to_string()))?;
        match record.status {
            TaskStatus::Completed | TaskStatus::Failed => Ok(record.to_value()),
            status => Err(McpError::InvalidParams(format!(
                "Task {} is not yet complete (status: {})",
                task_id,
                status.as_str()
            ))),
        }
    }

    /// `tasks/cancel`: transition to cancelled and hand back the record
    /// plus the originating request id so the caller can fire its
    /// cancellation handle. Fails on unknown or already-terminal tasks.
    pub fn handle_cancel(&self, task_id: &str) -> McpResult<(Value, Value)> {
        let record = self
            .get(task_id)
            .ok_or_else(|| McpError::UnknownTask(task_id.to_string()))?;
        if record.status.is_terminal() {
            return Err(McpError::InvalidParams(format!(
                "Task {} is already in terminal state: {}",
                task_id,
                record.status.as_str()
            )));
        }
        self.update(task_id, TaskStatus::Cancelled, None, None, None);
        let updated = self
            .get(task_id)
            .map(|r| r.to_value())
            .unwrap_or(Value::Null);
        Ok((updated, record.request_id))
    }

    /// Build the `notifications/tasks/status` payload for a task.
    pub fn status_notification(&self, task_id: &str) -> Option<Value> {
        let record = self.get(task_id)?;
        let mut notification = Map::new();
        notification.insert("jsonrpc".to_string(), Value::String("2.0".into()));
        notification.insert(
            "method".to_string(),
            Value::String(methods::NOTIFICATION_TASKS_STATUS.into()),
        );
        notification.insert("params".to_string(), record.to_value());
        Some(Value::Object(notification))
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
