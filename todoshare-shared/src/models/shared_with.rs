/// SharedWith model: access grants from a ToDo owner to another user
///
/// A grant delegates exactly one [`AccessLevel`] on one ToDo to one non-owner
/// user. Owner access is implicit and never stored as a grant.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE access_level AS ENUM ('read', 'write');
///
/// CREATE TABLE shared_with (
///     id BIGSERIAL PRIMARY KEY,
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     todo_id BIGINT NOT NULL REFERENCES todos(id) ON DELETE CASCADE,
///     access_level access_level NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT shared_with_user_todo_key UNIQUE (user_id, todo_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use std::fmt;
use std::str::FromStr;

/// Unique constraint backing "one grant per (user, ToDo)"
pub const SHARED_WITH_UNIQUE_CONSTRAINT: &str = "shared_with_user_todo_key";

/// Access level on a ToDo and, through it, on its Tasks
///
/// Ordered `Read < Write`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "access_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// View only
    Read,

    /// Create, edit, toggle and delete content
    Write,
}

impl AccessLevel {
    /// Converts level to its database/string form
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing an access level
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid access level: {0} (expected \"read\" or \"write\")")]
pub struct ParseAccessLevelError(pub String);

impl FromStr for AccessLevel {
    type Err = ParseAccessLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(AccessLevel::Read),
            "write" => Ok(AccessLevel::Write),
            _ => Err(ParseAccessLevelError(s.to_string())),
        }
    }
}

/// A single grant row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SharedWith {
    /// Grant id
    pub id: i64,

    /// Grantee
    pub user_id: i64,

    /// Shared ToDo
    pub todo_id: i64,

    /// Level granted to the grantee
    pub access_level: AccessLevel,

    /// When the grant was created
    pub created_at: DateTime<Utc>,
}

impl SharedWith {
    /// Inserts a grant
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on [`SHARED_WITH_UNIQUE_CONSTRAINT`] if a
    /// grant already exists for the pair.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        user_id: i64,
        todo_id: i64,
        access_level: AccessLevel,
    ) -> Result<Self, sqlx::Error> {
        let grant = sqlx::query_as::<_, SharedWith>(
            r#"
            INSERT INTO shared_with (user_id, todo_id, access_level)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, todo_id, access_level, created_at
            "#,
        )
        .bind(user_id)
        .bind(todo_id)
        .bind(access_level)
        .fetch_one(executor)
        .await?;

        Ok(grant)
    }

    /// Finds the grant for a (user, ToDo) pair
    pub async fn find<'e>(
        executor: impl PgExecutor<'e>,
        user_id: i64,
        todo_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        let grant = sqlx::query_as::<_, SharedWith>(
            r#"
            SELECT id, user_id, todo_id, access_level, created_at
            FROM shared_with
            WHERE user_id = $1 AND todo_id = $2
            "#,
        )
        .bind(user_id)
        .bind(todo_id)
        .fetch_optional(executor)
        .await?;

        Ok(grant)
    }

    /// Gets the level granted to a user on a ToDo, if any
    pub async fn get_level<'e>(
        executor: impl PgExecutor<'e>,
        user_id: i64,
        todo_id: i64,
    ) -> Result<Option<AccessLevel>, sqlx::Error> {
        let level: Option<AccessLevel> = sqlx::query_scalar(
            "SELECT access_level FROM shared_with WHERE user_id = $1 AND todo_id = $2",
        )
        .bind(user_id)
        .bind(todo_id)
        .fetch_optional(executor)
        .await?;

        Ok(level)
    }

    /// Lists every grant on a ToDo, oldest first
    pub async fn list_by_todo<'e>(
        executor: impl PgExecutor<'e>,
        todo_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let grants = sqlx::query_as::<_, SharedWith>(
            r#"
            SELECT id, user_id, todo_id, access_level, created_at
            FROM shared_with
            WHERE todo_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(todo_id)
        .fetch_all(executor)
        .await?;

        Ok(grants)
    }

    /// Deletes the grant for a (user, ToDo) pair
    ///
    /// Returns true if a grant was removed.
    pub async fn delete<'e>(
        executor: impl PgExecutor<'e>,
        user_id: i64,
        todo_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM shared_with WHERE user_id = $1 AND todo_id = $2")
            .bind(user_id)
            .bind(todo_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every grant on a ToDo, returning how many were removed
    pub async fn delete_by_todo<'e>(
        executor: impl PgExecutor<'e>,
        todo_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM shared_with WHERE todo_id = $1")
            .bind(todo_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level_as_str() {
        assert_eq!(AccessLevel::Read.as_str(), "read");
        assert_eq!(AccessLevel::Write.as_str(), "write");
        assert_eq!(AccessLevel::Write.to_string(), "write");
    }

    #[test]
    fn test_access_level_ordering() {
        assert!(AccessLevel::Read < AccessLevel::Write);
        assert_eq!(AccessLevel::Read.max(AccessLevel::Write), AccessLevel::Write);
    }

    #[test]
    fn test_access_level_from_str() {
        assert_eq!("read".parse::<AccessLevel>(), Ok(AccessLevel::Read));
        assert_eq!(" Write ".parse::<AccessLevel>(), Ok(AccessLevel::Write));
        assert!("admin".parse::<AccessLevel>().is_err());
    }

    #[test]
    fn test_access_level_serde() {
        assert_eq!(serde_json::to_string(&AccessLevel::Read).unwrap(), "\"read\"");
        let level: AccessLevel = serde_json::from_str("\"write\"").unwrap();
        assert_eq!(level, AccessLevel::Write);
    }
}
