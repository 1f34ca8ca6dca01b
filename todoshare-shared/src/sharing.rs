/// Sharing manager: granting and revoking access to a ToDo
///
/// Only the owner may share or unshare. Write grantees can edit content but
/// cannot manage grants.
///
/// Grants obey two rules:
///
/// - at most one grant per (user, ToDo); re-sharing is an error, not an upsert
/// - the owner is never a grantee; owner access is implicit
///
/// Unsharing a user who holds no grant is reported as `NotShared` rather
/// than silently succeeding.
///
/// # Example
///
/// ```no_run
/// use todoshare_shared::models::shared_with::AccessLevel;
/// use todoshare_shared::sharing::{share_todo, unshare_todo};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, owner_id: i64, todo_id: i64) -> Result<(), Box<dyn std::error::Error>> {
/// let grant = share_todo(&pool, owner_id, todo_id, "bob", AccessLevel::Read).await?;
///
/// // Changing the level means revoking first
/// unshare_todo(&pool, owner_id, todo_id, grant.user_id).await?;
/// share_todo(&pool, owner_id, todo_id, "bob", AccessLevel::Write).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;

use crate::auth::authorization::{require_owner, resolve_access};
use crate::error::{is_unique_violation, TodoError, TodoResult};
use crate::models::shared_with::{AccessLevel, SharedWith, SHARED_WITH_UNIQUE_CONSTRAINT};
use crate::models::todo::ToDo;
use crate::models::user::User;

/// Grants `access_level` on a ToDo to the user named `target_username`
///
/// # Errors
///
/// Checked in this order:
///
/// - `TodoError::NotFound` / `Forbidden` if the caller cannot see the ToDo
/// - `TodoError::InsufficientAccess` if the caller is a grantee, not the owner
/// - `TodoError::UnknownUser` if no user has that username
/// - `TodoError::SelfShare` if the target is the owner
/// - `TodoError::AlreadyShared` if the target already holds a grant
///
/// The grant is inserted under the ToDo's row lock, so a concurrent
/// `delete_todo` either runs first (`NotFound`) or removes the new grant.
pub async fn share_todo(
    pool: &PgPool,
    owner_user_id: i64,
    todo_id: i64,
    target_username: &str,
    access_level: AccessLevel,
) -> TodoResult<SharedWith> {
    let todo = require_owner(pool, owner_user_id, todo_id).await?;

    let target = User::find_by_username(pool, target_username)
        .await?
        .ok_or_else(|| TodoError::UnknownUser(target_username.to_string()))?;

    if todo.is_owned_by(target.id) {
        return Err(TodoError::SelfShare);
    }

    let mut tx = pool.begin().await?;

    // Serializes with delete_todo; a ToDo deleted meanwhile is NotFound
    let todo = ToDo::find_by_id_for_update(&mut *tx, todo.id)
        .await?
        .ok_or(TodoError::NotFound)?;

    if SharedWith::find(&mut *tx, target.id, todo.id).await?.is_some() {
        return Err(TodoError::AlreadyShared);
    }

    let grant = SharedWith::create(&mut *tx, target.id, todo.id, access_level)
        .await
        .map_err(|err| {
            if is_unique_violation(&err, SHARED_WITH_UNIQUE_CONSTRAINT) {
                TodoError::AlreadyShared
            } else {
                TodoError::Database(err)
            }
        })?;

    tx.commit().await?;

    tracing::debug!(
        todo_id = todo.id,
        grantee_user_id = target.id,
        access_level = access_level.as_str(),
        "ToDo shared"
    );
    Ok(grant)
}

/// Revokes the grant `target_user_id` holds on a ToDo
///
/// # Errors
///
/// - `TodoError::NotFound` / `Forbidden` / `InsufficientAccess` as for
///   [`share_todo`]
/// - `TodoError::NotShared` if the target holds no grant
pub async fn unshare_todo(
    pool: &PgPool,
    owner_user_id: i64,
    todo_id: i64,
    target_user_id: i64,
) -> TodoResult<()> {
    let todo = require_owner(pool, owner_user_id, todo_id).await?;

    let mut tx = pool.begin().await?;

    let todo = ToDo::find_by_id_for_update(&mut *tx, todo.id)
        .await?
        .ok_or(TodoError::NotFound)?;

    if !SharedWith::delete(&mut *tx, target_user_id, todo.id).await? {
        return Err(TodoError::NotShared);
    }

    tx.commit().await?;

    tracing::debug!(todo_id = todo.id, grantee_user_id = target_user_id, "ToDo unshared");
    Ok(())
}

/// Lists the grants on a ToDo
///
/// Computed on demand, so it always reflects the current rows. Anyone with
/// access to the ToDo may read it.
pub async fn list_grants_for(
    pool: &PgPool,
    user_id: i64,
    todo_id: i64,
) -> TodoResult<Vec<SharedWith>> {
    let (todo, _) = resolve_access(pool, user_id, todo_id).await?;
    let grants = SharedWith::list_by_todo(pool, todo.id).await?;

    Ok(grants)
}
