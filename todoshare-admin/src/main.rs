//! # ToDo Share Admin
//!
//! Operator tool for the ToDo store: applies migrations, reports schema and
//! pool health, and registers users.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/todoshare cargo run -p todoshare-admin -- migrate
//! cargo run -p todoshare-admin -- create-user alice
//! ```

use clap::{Parser, Subcommand};
use sqlx::PgPool;
use todoshare_shared::config::Config;
use todoshare_shared::db::migrations::{ensure_database_exists, get_migration_status, run_migrations};
use todoshare_shared::db::pool::{close_pool, create_pool, get_pool_stats, health_check};
use todoshare_shared::models::user::User;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "todoshare-admin", version, about = "Administer the ToDo share database")]
struct Args {
    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations
    Migrate {
        /// Create the database first if it does not exist
        #[arg(long)]
        create_database: bool,
    },

    /// Show applied and known migrations
    Status,

    /// Check connectivity and print pool usage
    Health,

    /// Register a user
    CreateUser {
        /// Unique username
        username: String,
    },
}

fn init_tracing(filter: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| todoshare_shared::config::DEFAULT_LOG_FILTER.into());

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;

    init_tracing(&config.log_filter, args.log_json);

    tracing::info!("ToDo Share admin v{}", env!("CARGO_PKG_VERSION"));

    if let Command::Migrate { create_database: true } = args.command {
        ensure_database_exists(&config.database.url).await?;
    }

    let pool = create_pool(config.pool_config()).await?;
    let result = execute(&pool, args.command).await;
    close_pool(pool).await;

    result
}

async fn execute(pool: &PgPool, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Migrate { .. } => {
            run_migrations(pool).await?;
            let status = get_migration_status(pool).await?;
            println!("applied {} of {} migrations", status.applied_migrations, status.known_migrations);
        }
        Command::Status => {
            let status = get_migration_status(pool).await?;
            println!("applied:    {}", status.applied_migrations);
            println!("known:      {}", status.known_migrations);
            match status.latest_version {
                Some(version) => println!("latest:     {}", version),
                None => println!("latest:     none"),
            }
            println!("up to date: {}", status.is_up_to_date);

            if !status.is_up_to_date {
                anyhow::bail!("schema has pending migrations; run `todoshare-admin migrate`");
            }
        }
        Command::Health => {
            health_check(pool).await?;
            let stats = get_pool_stats(pool);
            println!(
                "ok (connections: {} total, {} active, {} idle)",
                stats.total_connections, stats.active_connections, stats.idle_connections
            );
        }
        Command::CreateUser { username } => {
            let username = username.trim();
            if username.is_empty() {
                anyhow::bail!("username must not be empty");
            }
            if User::find_by_username(pool, username).await?.is_some() {
                anyhow::bail!("user {:?} already exists", username);
            }

            let user = User::create(pool, username).await?;
            tracing::info!(user_id = user.id, username = %user.username, "User created");
            println!("{}\t{}", user.id, user.username);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_create_user() {
        let args = Args::try_parse_from(["todoshare-admin", "create-user", "alice"]).unwrap();
        match args.command {
            Command::CreateUser { username } => assert_eq!(username, "alice"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_migrate_flag() {
        let args = Args::try_parse_from(["todoshare-admin", "migrate", "--create-database"]).unwrap();
        assert!(matches!(args.command, Command::Migrate { create_database: true }));

        let args = Args::try_parse_from(["todoshare-admin", "migrate"]).unwrap();
        assert!(matches!(args.command, Command::Migrate { create_database: false }));
    }

    #[test]
    fn test_create_user_requires_username() {
        assert!(Args::try_parse_from(["todoshare-admin", "create-user"]).is_err());
    }
}
