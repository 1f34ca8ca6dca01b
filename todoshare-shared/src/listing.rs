/// Read-side queries for the home and detail views
///
/// Every listing goes through the access resolver first; nothing here
/// returns a row the caller could not open individually.

use serde::Serialize;
use sqlx::PgPool;

use crate::auth::authorization::resolve_access;
use crate::error::TodoResult;
use crate::models::shared_with::AccessLevel;
use crate::models::task::Task;
use crate::models::todo::ToDo;

/// A ToDo as seen by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessibleToDo {
    /// The ToDo row
    pub todo: ToDo,

    /// The viewer's level on it
    pub access_level: AccessLevel,

    /// Whether the viewer owns it
    pub owned: bool,
}

/// A ToDo with its Tasks, as seen by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToDoDetail {
    /// The ToDo row
    pub todo: ToDo,

    /// The viewer's level on it
    pub access_level: AccessLevel,

    /// Tasks ordered by position
    pub tasks: Vec<Task>,
}

/// Lists every ToDo a user can open
///
/// Owned ToDos come first (always `Write`), then ToDos shared with the user
/// at their granted level. Each group is ordered by position.
pub async fn list_accessible_todos(pool: &PgPool, user_id: i64) -> TodoResult<Vec<AccessibleToDo>> {
    let owned = ToDo::list_by_owner(pool, user_id).await?;
    let shared = ToDo::list_shared_with(pool, user_id).await?;

    let mut todos = Vec::with_capacity(owned.len() + shared.len());

    todos.extend(owned.into_iter().map(|todo| AccessibleToDo {
        todo,
        access_level: AccessLevel::Write,
        owned: true,
    }));

    todos.extend(shared.into_iter().map(|(todo, access_level)| AccessibleToDo {
        todo,
        access_level,
        owned: false,
    }));

    Ok(todos)
}

/// Loads a ToDo and its Tasks for a user with at least read access
pub async fn list_tasks(pool: &PgPool, user_id: i64, todo_id: i64) -> TodoResult<ToDoDetail> {
    let (todo, access_level) = resolve_access(pool, user_id, todo_id).await?;
    let tasks = Task::list_by_todo(pool, todo.id).await?;

    Ok(ToDoDetail {
        todo,
        access_level,
        tasks,
    })
}
