use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ClientError, TaskId, View};

/// A task as stored by the remote store.
///
/// Wire format uses camelCase keys (`createdAt`, `updatedAt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// The view this task currently belongs to.
    pub fn view(&self) -> View {
        View::from_completed(self.completed)
    }
}

/// Body of `POST /tasks`.
///
/// Deserializing goes through `new`, so blank text is rejected there too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CreateTaskBody")]
pub struct CreateTaskInput {
    text: String,
}

#[derive(Deserialize)]
struct CreateTaskBody {
    text: String,
}

impl TryFrom<CreateTaskBody> for CreateTaskInput {
    type Error = ClientError;

    fn try_from(body: CreateTaskBody) -> Result<Self, Self::Error> {
        Self::new(&body.text)
    }
}

impl CreateTaskInput {
    /// Trims `text` and rejects it when nothing is left.
    pub fn new(text: &str) -> Result<Self, ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyText);
        }
        Ok(Self {
            text: text.to_string(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Body of `PATCH /tasks/{id}`. Unset fields are left out of the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTaskInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl UpdateTaskInput {
    pub fn completed(completed: bool) -> Self {
        Self {
            text: None,
            completed: Some(completed),
        }
    }
}
