/// Task model and database operations
///
/// A Task is a single item under a ToDo. Tasks carry no permission state of
/// their own: access is always resolved through the parent ToDo.
///
/// # Lifecycle
///
/// ```text
/// created → (toggle done)* → deleted
/// ```
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id BIGSERIAL PRIMARY KEY,
///     title VARCHAR(255) NOT NULL,
///     belongs_to_todo_id BIGINT NOT NULL REFERENCES todos(id) ON DELETE CASCADE,
///     created_by_user_id BIGINT REFERENCES users(id) ON DELETE SET NULL,
///     done BOOLEAN NOT NULL DEFAULT FALSE,
///     position INTEGER NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_modified_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT tasks_todo_title_key UNIQUE (belongs_to_todo_id, title)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

/// Unique constraint backing per-ToDo task title uniqueness
pub const TASK_UNIQUE_CONSTRAINT: &str = "tasks_todo_title_key";

/// Task row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Task id
    pub id: i64,

    /// Title (1-255 characters, unique within the parent)
    pub title: String,

    /// Parent ToDo
    pub belongs_to_todo_id: i64,

    /// User who added the task (None if that user was removed)
    pub created_by_user_id: Option<i64>,

    /// Completion flag
    pub done: bool,

    /// Ordering rank within the parent
    pub position: i32,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// Last change to the task
    pub last_modified_at: DateTime<Utc>,
}

impl Task {
    /// Inserts a task, not done
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        todo_id: i64,
        title: &str,
        created_by_user_id: i64,
        position: i32,
    ) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (title, belongs_to_todo_id, created_by_user_id, done, position)
            VALUES ($1, $2, $3, FALSE, $4)
            RETURNING id, title, belongs_to_todo_id, created_by_user_id, done, position,
                      created_at, last_modified_at
            "#,
        )
        .bind(title)
        .bind(todo_id)
        .bind(created_by_user_id)
        .bind(position)
        .fetch_one(executor)
        .await?;

        Ok(task)
    }

    /// Finds a task by id
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, title, belongs_to_todo_id, created_by_user_id, done, position,
                   created_at, last_modified_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(task)
    }

    /// Checks whether a task with this title already exists under the ToDo
    ///
    /// `exclude_id` skips the task being renamed.
    pub async fn exists_in_todo<'e>(
        executor: impl PgExecutor<'e>,
        todo_id: i64,
        title: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM tasks
                WHERE belongs_to_todo_id = $1 AND title = $2
                  AND ($3::BIGINT IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(todo_id)
        .bind(title)
        .bind(exclude_id)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

    /// Counts the tasks under a ToDo
    pub async fn count_by_todo<'e>(
        executor: impl PgExecutor<'e>,
        todo_id: i64,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE belongs_to_todo_id = $1")
                .bind(todo_id)
                .fetch_one(executor)
                .await?;

        Ok(count)
    }

    /// Lists the tasks under a ToDo by position
    pub async fn list_by_todo<'e>(
        executor: impl PgExecutor<'e>,
        todo_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, title, belongs_to_todo_id, created_by_user_id, done, position,
                   created_at, last_modified_at
            FROM tasks
            WHERE belongs_to_todo_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(todo_id)
        .fetch_all(executor)
        .await?;

        Ok(tasks)
    }

    /// Flips `done` on a task of the given ToDo
    pub async fn toggle_done<'e>(
        executor: impl PgExecutor<'e>,
        id: i64,
        todo_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET done = NOT done,
                last_modified_at = GREATEST(last_modified_at, NOW())
            WHERE id = $1 AND belongs_to_todo_id = $2
            RETURNING id, title, belongs_to_todo_id, created_by_user_id, done, position,
                      created_at, last_modified_at
            "#,
        )
        .bind(id)
        .bind(todo_id)
        .fetch_optional(executor)
        .await?;

        Ok(task)
    }

    /// Renames a task of the given ToDo
    pub async fn update_title<'e>(
        executor: impl PgExecutor<'e>,
        id: i64,
        todo_id: i64,
        title: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET title = $3,
                last_modified_at = GREATEST(last_modified_at, NOW())
            WHERE id = $1 AND belongs_to_todo_id = $2
            RETURNING id, title, belongs_to_todo_id, created_by_user_id, done, position,
                      created_at, last_modified_at
            "#,
        )
        .bind(id)
        .bind(todo_id)
        .bind(title)
        .fetch_optional(executor)
        .await?;

        Ok(task)
    }

    /// Deletes a task of the given ToDo
    ///
    /// Returns true if a row was removed.
    pub async fn delete<'e>(
        executor: impl PgExecutor<'e>,
        id: i64,
        todo_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND belongs_to_todo_id = $2")
            .bind(id)
            .bind(todo_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every task under a ToDo, returning how many were removed
    pub async fn delete_by_todo<'e>(
        executor: impl PgExecutor<'e>,
        todo_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE belongs_to_todo_id = $1")
            .bind(todo_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
