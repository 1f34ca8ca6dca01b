/// Mutation coordinator for ToDos and Tasks
///
/// Every create, update, toggle and delete runs as one explicit transaction
/// that also maintains the parent ToDo's aggregates:
///
/// - `task_count` equals the number of Tasks under the ToDo
/// - `last_modified_at` never decreases and moves on every change to the
///   ToDo or any of its Tasks
///
/// Operations on an existing ToDo first lock its row (`SELECT ... FOR
/// UPDATE`) and re-check the caller's write access under that lock, so
/// concurrent writers on one ToDo serialize and a grant revoked in between
/// is honoured. Counter changes are computed in SQL against the locked row.
///
/// # Example
///
/// ```no_run
/// use todoshare_shared::auth::authorization::require_write_access;
/// use todoshare_shared::mutation::{create_todo, create_task, NewTask, NewToDo};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, owner_id: i64) -> Result<(), Box<dyn std::error::Error>> {
/// let todo = create_todo(&pool, owner_id, NewToDo {
///     title: "Groceries".to_string(),
///     description: "buy milk".to_string(),
/// }).await?;
///
/// let (_, access) = require_write_access(&pool, owner_id, todo.id).await?;
/// let task = create_task(&pool, &access, NewTask { title: "milk".to_string() }).await?;
/// assert!(!task.done);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::auth::authorization::{level_for, require_level, WriteAccess};
use crate::error::{is_unique_violation, TodoError, TodoResult};
use crate::models::shared_with::{AccessLevel, SharedWith};
use crate::models::task::{Task, TASK_UNIQUE_CONSTRAINT};
use crate::models::todo::{ToDo, TODO_UNIQUE_CONSTRAINT};

/// Advisory lock class for per-owner ToDo creation
///
/// Used as the first key of the two-key `pg_advisory_xact_lock`, so these
/// locks never collide with single-key advisory locks on the same number.
pub const TODO_CREATE_LOCK_CLASS: i32 = 0x7444_6f43;

/// Input for creating a ToDo
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewToDo {
    /// ToDo title
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    /// ToDo description
    #[validate(length(min = 1, max = 2550, message = "Description must be 1-2550 characters"))]
    pub description: String,
}

/// Input for editing a ToDo
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateToDo {
    /// New title
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    /// New description
    #[validate(length(min = 1, max = 2550, message = "Description must be 1-2550 characters"))]
    pub description: String,
}

/// Input for creating a Task
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewTask {
    /// Task title
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
}

/// Input for renaming a Task
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateTask {
    /// New task title
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
}

/// Summary of a ToDo deletion cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeletedToDo {
    /// Deleted ToDo
    pub todo_id: i64,

    /// Tasks removed with it
    pub tasks_removed: u64,

    /// Grants removed with it
    pub grants_removed: u64,
}

/// Maps a unique violation on `constraint` to `Duplicate`
fn duplicate_on(constraint: &'static str) -> impl Fn(sqlx::Error) -> TodoError {
    move |err| {
        if is_unique_violation(&err, constraint) {
            TodoError::Duplicate
        } else {
            TodoError::Database(err)
        }
    }
}

/// Locks the ToDo row and re-checks write access under the lock
async fn lock_for_write(conn: &mut PgConnection, access: &WriteAccess) -> TodoResult<ToDo> {
    let todo = ToDo::find_by_id_for_update(&mut *conn, access.todo_id())
        .await?
        .ok_or(TodoError::NotFound)?;

    let level = level_for(&mut *conn, &todo, access.user_id()).await?;
    require_level(level, AccessLevel::Write)?;

    Ok(todo)
}

/// Creates a ToDo for `owner_user_id`, appended after their existing ToDos
///
/// # Errors
///
/// - `TodoError::Validation` for out-of-range fields
/// - `TodoError::Duplicate` if the owner already has a ToDo with the same
///   title and description (other owners may reuse them)
pub async fn create_todo(pool: &PgPool, owner_user_id: i64, input: NewToDo) -> TodoResult<ToDo> {
    input.validate()?;

    let mut tx = pool.begin().await?;

    // Serializes creates per owner so position and the duplicate check agree
    sqlx::query("SELECT pg_advisory_xact_lock($1, ($2 % 2147483648)::INTEGER)")
        .bind(TODO_CREATE_LOCK_CLASS)
        .bind(owner_user_id)
        .execute(&mut *tx)
        .await?;

    if ToDo::exists_for_owner(&mut *tx, owner_user_id, &input.title, &input.description, None)
        .await?
    {
        return Err(TodoError::Duplicate);
    }

    let position = ToDo::count_by_owner(&mut *tx, owner_user_id).await?;
    let position = i32::try_from(position).unwrap_or(i32::MAX);

    let todo = ToDo::create(
        &mut *tx,
        owner_user_id,
        &input.title,
        &input.description,
        position,
    )
    .await
    .map_err(duplicate_on(TODO_UNIQUE_CONSTRAINT))?;

    tx.commit().await?;

    tracing::debug!(todo_id = todo.id, owner_user_id, position, "ToDo created");
    Ok(todo)
}

/// Edits a ToDo's title and description
///
/// # Errors
///
/// - `TodoError::Validation` for out-of-range fields
/// - `TodoError::NotFound` if the ToDo was deleted meanwhile
/// - `TodoError::InsufficientAccess` / `Forbidden` if access was revoked
/// - `TodoError::Duplicate` if the owner has another identical ToDo
pub async fn update_todo(
    pool: &PgPool,
    access: &WriteAccess,
    input: UpdateToDo,
) -> TodoResult<ToDo> {
    input.validate()?;

    let mut tx = pool.begin().await?;
    let todo = lock_for_write(&mut *tx, access).await?;

    if ToDo::exists_for_owner(
        &mut *tx,
        todo.owner_user_id,
        &input.title,
        &input.description,
        Some(todo.id),
    )
    .await?
    {
        return Err(TodoError::Duplicate);
    }

    let todo = ToDo::update_details(&mut *tx, todo.id, &input.title, &input.description)
        .await
        .map_err(duplicate_on(TODO_UNIQUE_CONSTRAINT))?
        .ok_or(TodoError::NotFound)?;

    tx.commit().await?;

    tracing::debug!(todo_id = todo.id, user_id = access.user_id(), "ToDo updated");
    Ok(todo)
}

/// Deletes a ToDo together with all its Tasks and grants
///
/// The cascade is one transaction: either everything goes or nothing does.
pub async fn delete_todo(pool: &PgPool, access: &WriteAccess) -> TodoResult<DeletedToDo> {
    let mut tx = pool.begin().await?;
    let todo = lock_for_write(&mut *tx, access).await?;

    let tasks_removed = Task::delete_by_todo(&mut *tx, todo.id).await?;
    let grants_removed = SharedWith::delete_by_todo(&mut *tx, todo.id).await?;

    if !ToDo::delete(&mut *tx, todo.id).await? {
        return Err(TodoError::NotFound);
    }

    tx.commit().await?;

    tracing::debug!(
        todo_id = todo.id,
        user_id = access.user_id(),
        tasks_removed,
        grants_removed,
        "ToDo deleted"
    );

    Ok(DeletedToDo {
        todo_id: todo.id,
        tasks_removed,
        grants_removed,
    })
}

/// Adds a Task at the end of the ToDo
///
/// Increments the parent's `task_count` and bumps its `last_modified_at` in
/// the same transaction as the insert.
///
/// # Errors
///
/// - `TodoError::Validation` for an out-of-range title
/// - `TodoError::Duplicate` if the ToDo already has a Task with this title
pub async fn create_task(pool: &PgPool, access: &WriteAccess, input: NewTask) -> TodoResult<Task> {
    input.validate()?;

    let mut tx = pool.begin().await?;
    let todo = lock_for_write(&mut *tx, access).await?;

    if Task::exists_in_todo(&mut *tx, todo.id, &input.title, None).await? {
        return Err(TodoError::Duplicate);
    }

    let position = Task::count_by_todo(&mut *tx, todo.id).await?;
    let position = i32::try_from(position).unwrap_or(i32::MAX);

    let task = Task::create(&mut *tx, todo.id, &input.title, access.user_id(), position)
        .await
        .map_err(duplicate_on(TASK_UNIQUE_CONSTRAINT))?;

    ToDo::apply_task_delta(&mut *tx, todo.id, 1)
        .await?
        .ok_or(TodoError::NotFound)?;

    tx.commit().await?;

    tracing::debug!(
        todo_id = todo.id,
        task_id = task.id,
        user_id = access.user_id(),
        "Task created"
    );
    Ok(task)
}

/// Flips a Task's `done` flag
///
/// Bumps the task and parent timestamps; `task_count` is unchanged.
pub async fn toggle_task_done(
    pool: &PgPool,
    access: &WriteAccess,
    task_id: i64,
) -> TodoResult<Task> {
    let mut tx = pool.begin().await?;
    let todo = lock_for_write(&mut *tx, access).await?;

    let task = Task::toggle_done(&mut *tx, task_id, todo.id)
        .await?
        .ok_or(TodoError::NotFound)?;

    ToDo::apply_task_delta(&mut *tx, todo.id, 0)
        .await?
        .ok_or(TodoError::NotFound)?;

    tx.commit().await?;

    tracing::debug!(todo_id = todo.id, task_id, done = task.done, "Task toggled");
    Ok(task)
}

/// Renames a Task
///
/// # Errors
///
/// - `TodoError::NotFound` if the task is not under the covered ToDo
/// - `TodoError::Duplicate` if another Task in the ToDo has this title
pub async fn update_task_title(
    pool: &PgPool,
    access: &WriteAccess,
    task_id: i64,
    input: UpdateTask,
) -> TodoResult<Task> {
    input.validate()?;

    let mut tx = pool.begin().await?;
    let todo = lock_for_write(&mut *tx, access).await?;

    if Task::exists_in_todo(&mut *tx, todo.id, &input.title, Some(task_id)).await? {
        return Err(TodoError::Duplicate);
    }

    let task = Task::update_title(&mut *tx, task_id, todo.id, &input.title)
        .await
        .map_err(duplicate_on(TASK_UNIQUE_CONSTRAINT))?
        .ok_or(TodoError::NotFound)?;

    ToDo::apply_task_delta(&mut *tx, todo.id, 0)
        .await?
        .ok_or(TodoError::NotFound)?;

    tx.commit().await?;

    tracing::debug!(todo_id = todo.id, task_id, "Task renamed");
    Ok(task)
}

/// Removes a Task and decrements the parent's `task_count`
///
/// The count is floored at zero. Returns the updated parent.
pub async fn delete_task(pool: &PgPool, access: &WriteAccess, task_id: i64) -> TodoResult<ToDo> {
    let mut tx = pool.begin().await?;
    let todo = lock_for_write(&mut *tx, access).await?;

    if !Task::delete(&mut *tx, task_id, todo.id).await? {
        return Err(TodoError::NotFound);
    }

    let todo = ToDo::apply_task_delta(&mut *tx, todo.id, -1)
        .await?
        .ok_or(TodoError::NotFound)?;

    tx.commit().await?;

    tracing::debug!(
        todo_id = todo.id,
        task_id,
        task_count = todo.task_count,
        "Task deleted"
    );
    Ok(todo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_todo_validation() {
        let ok = NewToDo {
            title: "Groceries".to_string(),
            description: "buy milk".to_string(),
        };
        assert!(ok.validate().is_ok());

        let empty_title = NewToDo {
            title: String::new(),
            description: "buy milk".to_string(),
        };
        assert!(empty_title.validate().is_err());

        let long_description = NewToDo {
            title: "Groceries".to_string(),
            description: "x".repeat(2551),
        };
        assert!(long_description.validate().is_err());

        let max_description = NewToDo {
            title: "t".repeat(255),
            description: "x".repeat(2550),
        };
        assert!(max_description.validate().is_ok());
    }

    #[test]
    fn test_task_title_validation() {
        assert!(NewTask { title: "milk".to_string() }.validate().is_ok());
        assert!(NewTask { title: String::new() }.validate().is_err());
        assert!(UpdateTask { title: "t".repeat(256) }.validate().is_err());
    }

    #[test]
    fn test_validation_maps_to_todo_error() {
        let input = UpdateToDo {
            title: String::new(),
            description: String::new(),
        };
        let err: TodoError = input.validate().unwrap_err().into();

        match err {
            TodoError::Validation(details) => {
                let fields: Vec<_> = details.iter().map(|d| d.field.as_str()).collect();
                assert_eq!(fields, vec!["description", "title"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_mapping_passes_other_errors_through() {
        let map = duplicate_on(TASK_UNIQUE_CONSTRAINT);
        assert!(matches!(map(sqlx::Error::RowNotFound), TodoError::Database(_)));
    }
}
