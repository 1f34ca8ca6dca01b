/// Access resolution for ToDos and Tasks
///
/// Given a caller and a ToDo or Task id, this module decides whether the
/// resource exists and which [`AccessLevel`] the caller holds on it.
///
/// # Permission Model
///
/// 1. **Owner**: the ToDo owner always holds `Write`. A stray grant naming
///    the owner never downgrades them.
/// 2. **Grantee**: any other user holds exactly the level of their
///    `shared_with` row.
/// 3. **Everyone else**: `Forbidden`.
/// 4. **Tasks**: a Task has no permission state. Its level is the level of
///    its parent ToDo, resolved through the same path.
///
/// Sharing is owner-only ([`require_owner`]); write grantees may edit content
/// but may not manage grants.
///
/// Mutating operations take a [`WriteAccess`] capability, which only
/// [`require_write_access`] and [`require_task_write_access`] can produce.
///
/// # Example
///
/// ```no_run
/// use todoshare_shared::auth::authorization::{require_write_access, resolve_access};
/// use todoshare_shared::mutation::{create_task, NewTask};
/// use sqlx::PgPool;
///
/// async fn add_item(pool: &PgPool, user_id: i64, todo_id: i64) -> Result<(), Box<dyn std::error::Error>> {
///     // Viewing needs any level
///     let (todo, level) = resolve_access(pool, user_id, todo_id).await?;
///     println!("{} [{}]", todo.title, level);
///
///     // Mutating needs the capability
///     let (_, access) = require_write_access(pool, user_id, todo_id).await?;
///     create_task(pool, &access, NewTask { title: "milk".to_string() }).await?;
///     Ok(())
/// }
/// ```

use sqlx::{PgExecutor, PgPool};

use crate::error::{TodoError, TodoResult};
use crate::models::shared_with::{AccessLevel, SharedWith};
use crate::models::task::Task;
use crate::models::todo::ToDo;

/// Proof that a user held write access to a ToDo when it was resolved
///
/// Cannot be constructed outside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAccess {
    user_id: i64,
    todo_id: i64,
}

impl WriteAccess {
    pub(crate) fn new(user_id: i64, todo_id: i64) -> Self {
        Self { user_id, todo_id }
    }

    /// User the capability was issued to
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// ToDo the capability covers
    pub fn todo_id(&self) -> i64 {
        self.todo_id
    }
}

/// The access decision rule
///
/// Owners get `Write` regardless of `grant`; everyone else gets their grant.
pub fn effective_access(
    owner_user_id: i64,
    user_id: i64,
    grant: Option<AccessLevel>,
) -> Option<AccessLevel> {
    if user_id == owner_user_id {
        return Some(AccessLevel::Write);
    }

    grant
}

/// Checks a resolved level against the level an operation needs
///
/// # Errors
///
/// Returns `TodoError::InsufficientAccess` if `actual` is below `required`
pub fn require_level(actual: AccessLevel, required: AccessLevel) -> TodoResult<()> {
    if actual < required {
        return Err(TodoError::InsufficientAccess);
    }

    Ok(())
}

/// Computes a user's level on an already loaded ToDo
///
/// Only hits the database for non-owners.
pub(crate) async fn level_for<'e>(
    executor: impl PgExecutor<'e>,
    todo: &ToDo,
    user_id: i64,
) -> TodoResult<AccessLevel> {
    let grant = if todo.is_owned_by(user_id) {
        None
    } else {
        SharedWith::get_level(executor, user_id, todo.id).await?
    };

    effective_access(todo.owner_user_id, user_id, grant).ok_or(TodoError::Forbidden)
}

/// Resolves a user's access to a ToDo
///
/// # Errors
///
/// - `TodoError::NotFound` if the ToDo does not exist
/// - `TodoError::Forbidden` if the user is neither owner nor grantee
/// - `TodoError::Database` on storage failure
pub async fn resolve_access(
    pool: &PgPool,
    user_id: i64,
    todo_id: i64,
) -> TodoResult<(ToDo, AccessLevel)> {
    let todo = ToDo::find_by_id(pool, todo_id)
        .await?
        .ok_or(TodoError::NotFound)?;

    let level = level_for(pool, &todo, user_id).await?;

    Ok((todo, level))
}

/// Resolves a user's access to a Task through its parent ToDo
///
/// # Errors
///
/// Same as [`resolve_access`]; a missing Task is `TodoError::NotFound`.
pub async fn resolve_task_access(
    pool: &PgPool,
    user_id: i64,
    task_id: i64,
) -> TodoResult<(Task, AccessLevel)> {
    let task = Task::find_by_id(pool, task_id)
        .await?
        .ok_or(TodoError::NotFound)?;

    let (_, level) = resolve_access(pool, user_id, task.belongs_to_todo_id).await?;

    Ok((task, level))
}

/// Resolves access and requires `Write`
///
/// # Errors
///
/// As [`resolve_access`], plus `TodoError::InsufficientAccess` for read-only
/// grantees.
pub async fn require_write_access(
    pool: &PgPool,
    user_id: i64,
    todo_id: i64,
) -> TodoResult<(ToDo, WriteAccess)> {
    let (todo, level) = resolve_access(pool, user_id, todo_id).await?;
    require_level(level, AccessLevel::Write)?;

    let access = WriteAccess::new(user_id, todo.id);
    Ok((todo, access))
}

/// Resolves task access and requires `Write` on the parent ToDo
pub async fn require_task_write_access(
    pool: &PgPool,
    user_id: i64,
    task_id: i64,
) -> TodoResult<(Task, WriteAccess)> {
    let (task, level) = resolve_task_access(pool, user_id, task_id).await?;
    require_level(level, AccessLevel::Write)?;

    let access = WriteAccess::new(user_id, task.belongs_to_todo_id);
    Ok((task, access))
}

/// Requires that the user owns the ToDo
///
/// # Errors
///
/// As [`resolve_access`], plus `TodoError::InsufficientAccess` for any
/// grantee, including write grantees.
pub async fn require_owner(pool: &PgPool, user_id: i64, todo_id: i64) -> TodoResult<ToDo> {
    let (todo, _) = resolve_access(pool, user_id, todo_id).await?;

    if !todo.is_owned_by(user_id) {
        return Err(TodoError::InsufficientAccess);
    }

    Ok(todo)
}
