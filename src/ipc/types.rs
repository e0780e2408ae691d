use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::curriculum::HierarchyIndex;
use crate::selection::SelectionState;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// One content-assignment workflow at a time: the session owns a
/// curriculum snapshot taken when it opened and the live selection
/// state. Dropped on submit success or cancel.
pub struct AssignmentSession {
    pub course_id: String,
    pub index: HierarchyIndex,
    pub selection: SelectionState,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub assignment: Option<AssignmentSession>,
}
