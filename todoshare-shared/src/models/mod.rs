/// Database models for the ToDo store
///
/// One module per table. Row functions accept any `sqlx::PgExecutor`, so the
/// same query runs against the pool or inside a transaction.
///
/// # Models
///
/// - `user`: identities mirrored from the identity provider
/// - `todo`: user-owned lists with derived task count and timestamp
/// - `task`: items under a ToDo
/// - `shared_with`: access grants and the `AccessLevel` enum
///
/// # Example
///
/// ```no_run
/// use todoshare_shared::models::todo::ToDo;
/// use todoshare_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// for todo in ToDo::list_by_owner(&pool, 1).await? {
///     println!("{} ({} tasks)", todo.title, todo.task_count);
/// }
/// # Ok(())
/// # }
/// ```

pub mod shared_with;
pub mod task;
pub mod todo;
pub mod user;
