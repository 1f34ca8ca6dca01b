/// ToDo model and database operations
///
/// A ToDo is a user-owned, ordered list of Tasks. `task_count` and
/// `last_modified_at` are aggregates kept current by the mutation
/// coordinator; the row functions here are the primitive reads and writes it
/// composes inside a transaction.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE todos (
///     id BIGSERIAL PRIMARY KEY,
///     title VARCHAR(255) NOT NULL,
///     description VARCHAR(2550) NOT NULL,
///     owner_user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     position INTEGER NOT NULL DEFAULT 0,
///     task_count INTEGER NOT NULL DEFAULT 0 CHECK (task_count >= 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_modified_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE UNIQUE INDEX todos_owner_title_description_key
///     ON todos (owner_user_id, md5(title), md5(description));
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use super::shared_with::AccessLevel;

/// Unique index backing per-owner (title, description) uniqueness
///
/// Indexes digests of the text so maximum-length fields fit a btree row.
pub const TODO_UNIQUE_CONSTRAINT: &str = "todos_owner_title_description_key";

/// ToDo list row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ToDo {
    /// ToDo id
    pub id: i64,

    /// Title (1-255 characters)
    pub title: String,

    /// Description (1-2550 characters)
    pub description: String,

    /// Owning user; owners always hold write access
    pub owner_user_id: i64,

    /// Manual ordering rank among the owner's ToDos
    pub position: i32,

    /// Number of live Tasks under this ToDo
    pub task_count: i32,

    /// When the ToDo was created
    pub created_at: DateTime<Utc>,

    /// Last change to the ToDo or any of its Tasks
    pub last_modified_at: DateTime<Utc>,
}

/// A ToDo paired with the level a grant gives the reader
#[derive(Debug, Clone, sqlx::FromRow)]
struct GrantedToDoRow {
    #[sqlx(flatten)]
    todo: ToDo,
    access_level: AccessLevel,
}

impl ToDo {
    /// Whether `user_id` owns this ToDo
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.owner_user_id == user_id
    }

    /// Inserts a ToDo with zero tasks
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        owner_user_id: i64,
        title: &str,
        description: &str,
        position: i32,
    ) -> Result<Self, sqlx::Error> {
        let todo = sqlx::query_as::<_, ToDo>(
            r#"
            INSERT INTO todos (title, description, owner_user_id, position, task_count)
            VALUES ($1, $2, $3, $4, 0)
            RETURNING id, title, description, owner_user_id, position, task_count,
                      created_at, last_modified_at
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(owner_user_id)
        .bind(position)
        .fetch_one(executor)
        .await?;

        Ok(todo)
    }

    /// Finds a ToDo by id
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        let todo = sqlx::query_as::<_, ToDo>(
            r#"
            SELECT id, title, description, owner_user_id, position, task_count,
                   created_at, last_modified_at
            FROM todos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(todo)
    }

    /// Finds a ToDo by id and locks the row until the transaction ends
    ///
    /// Must be called on a transaction. Every write that touches the
    /// aggregates goes through this lock first, so concurrent writers on the
    /// same ToDo serialize here.
    pub async fn find_by_id_for_update<'e>(
        executor: impl PgExecutor<'e>,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        let todo = sqlx::query_as::<_, ToDo>(
            r#"
            SELECT id, title, description, owner_user_id, position, task_count,
                   created_at, last_modified_at
            FROM todos
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(todo)
    }

    /// Checks whether the owner already has a ToDo with this title and description
    ///
    /// `exclude_id` skips the ToDo being edited.
    pub async fn exists_for_owner<'e>(
        executor: impl PgExecutor<'e>,
        owner_user_id: i64,
        title: &str,
        description: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM todos
                WHERE owner_user_id = $1 AND title = $2 AND description = $3
                  AND ($4::BIGINT IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(owner_user_id)
        .bind(title)
        .bind(description)
        .bind(exclude_id)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

    /// Counts the ToDos owned by a user
    pub async fn count_by_owner<'e>(
        executor: impl PgExecutor<'e>,
        owner_user_id: i64,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM todos WHERE owner_user_id = $1")
            .bind(owner_user_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }

    /// Lists a user's own ToDos by position
    pub async fn list_by_owner<'e>(
        executor: impl PgExecutor<'e>,
        owner_user_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let todos = sqlx::query_as::<_, ToDo>(
            r#"
            SELECT id, title, description, owner_user_id, position, task_count,
                   created_at, last_modified_at
            FROM todos
            WHERE owner_user_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(owner_user_id)
        .fetch_all(executor)
        .await?;

        Ok(todos)
    }

    /// Lists ToDos shared with a user, together with the granted level
    pub async fn list_shared_with<'e>(
        executor: impl PgExecutor<'e>,
        user_id: i64,
    ) -> Result<Vec<(Self, AccessLevel)>, sqlx::Error> {
        let rows = sqlx::query_as::<_, GrantedToDoRow>(
            r#"
            SELECT t.id, t.title, t.description, t.owner_user_id, t.position, t.task_count,
                   t.created_at, t.last_modified_at, s.access_level
            FROM todos t
            JOIN shared_with s ON s.todo_id = t.id
            WHERE s.user_id = $1 AND t.owner_user_id <> $1
            ORDER BY t.position ASC, t.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.todo, row.access_level))
            .collect())
    }

    /// Updates title and description, bumping `last_modified_at`
    pub async fn update_details<'e>(
        executor: impl PgExecutor<'e>,
        id: i64,
        title: &str,
        description: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let todo = sqlx::query_as::<_, ToDo>(
            r#"
            UPDATE todos
            SET title = $2,
                description = $3,
                last_modified_at = GREATEST(last_modified_at, NOW())
            WHERE id = $1
            RETURNING id, title, description, owner_user_id, position, task_count,
                      created_at, last_modified_at
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(description)
        .fetch_optional(executor)
        .await?;

        Ok(todo)
    }

    /// Adjusts `task_count` by `delta` (floored at zero) and bumps `last_modified_at`
    ///
    /// A `delta` of zero only touches the timestamp.
    pub async fn apply_task_delta<'e>(
        executor: impl PgExecutor<'e>,
        id: i64,
        delta: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        let todo = sqlx::query_as::<_, ToDo>(
            r#"
            UPDATE todos
            SET task_count = GREATEST(task_count + $2, 0),
                last_modified_at = GREATEST(last_modified_at, NOW())
            WHERE id = $1
            RETURNING id, title, description, owner_user_id, position, task_count,
                      created_at, last_modified_at
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(executor)
        .await?;

        Ok(todo)
    }

    /// Deletes the ToDo row
    ///
    /// Returns true if a row was removed.
    pub async fn delete<'e>(executor: impl PgExecutor<'e>, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
