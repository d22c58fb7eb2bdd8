use crate::error::NetworkError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of task change carried by an event.
///
/// The wire representation is the plain string (`"task_create"` etc.);
/// unknown strings survive as [`EventKind::Other`] so the relay forwards
/// kinds it has never heard of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    TaskCreate,
    TaskUpdate,
    TaskDelete,
    Other(String),
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "task_create" => EventKind::TaskCreate,
            "task_update" => EventKind::TaskUpdate,
            "task_delete" => EventKind::TaskDelete,
            _ => EventKind::Other(value),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::TaskCreate => "task_create".to_string(),
            EventKind::TaskUpdate => "task_update".to_string(),
            EventKind::TaskDelete => "task_delete".to_string(),
            EventKind::Other(value) => value,
        }
    }
}

/// A single task change notification.
///
/// `payload` is opaque domain data; the relay never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: Value,
}

impl TaskEvent {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    pub fn decode(text: &str) -> Result<Self, NetworkError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, NetworkError> {
        Ok(serde_json::to_string(self)?)
    }
}
