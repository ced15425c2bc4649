//! Session-scoped task plan the model maintains through the `todo_write`
//! and `todo_read` tools. Lives only as long as the process.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TodoItem {
    pub id: u64,
    pub text: String,
    pub status: TodoStatus,
}

#[derive(Default)]
pub struct TodoList {
    items: Vec<TodoItem>,
    next_id: u64,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, text: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(TodoItem {
            id,
            text: text.into(),
            status: TodoStatus::Pending,
        });
        id
    }

    pub fn update_status(&mut self, id: u64, status: TodoStatus) -> bool {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.status = status;
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> &[TodoItem] {
        &self.items
    }
}
