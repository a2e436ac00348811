use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{ApiError, Result};
use crate::models::{encode_json, UserRole, UserRolesObject};
use crate::users;

/// Username of the built-in server account (always id 1). Admin rights are
/// only ever restored to id 1 while it still carries this name.
pub const RESERVED_ADMIN_NAME: &str = "ServerAdmin";

const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL DEFAULT '',
        github_id TEXT UNIQUE,
        discord_id TEXT UNIQUE,
        sponsor_url TEXT,
        display_name TEXT NOT NULL DEFAULT '',
        bio TEXT NOT NULL DEFAULT '',
        roles TEXT NOT NULL DEFAULT '{"sitewide":[],"perGame":{}}',
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS game_versions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        game_name TEXT NOT NULL,
        version TEXT NOT NULL,
        default_version INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        UNIQUE (game_name, version)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS mods (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        game_name TEXT NOT NULL,
        category TEXT NOT NULL DEFAULT 'other',
        author_ids TEXT NOT NULL DEFAULT '[]',
        icon_file_name TEXT NOT NULL DEFAULT '',
        git_url TEXT NOT NULL DEFAULT '',
        visibility TEXT NOT NULL DEFAULT 'private',
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS mod_versions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        mod_id INTEGER NOT NULL,
        author_id INTEGER NOT NULL,
        mod_version TEXT NOT NULL,
        supported_game_version_ids TEXT NOT NULL DEFAULT '[]',
        visibility TEXT NOT NULL DEFAULT 'private',
        platform TEXT NOT NULL DEFAULT 'steampc',
        zip_hash TEXT NOT NULL DEFAULT '',
        content_hashes TEXT NOT NULL DEFAULT '[]',
        dependencies TEXT NOT NULL DEFAULT '[]',
        download_count INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    )"#,
    // Store-level backstop for the verified band of the version slot
    // invariant; the unverified band is guarded by the pre-checks only, since
    // a full-band index would reject permitted non-verified soft conflicts.
    r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_mod_versions_verified_slot
        ON mod_versions (mod_id, mod_version, platform)
        WHERE visibility = 'verified'"#,
    r#"CREATE TABLE IF NOT EXISTS edit_approval_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        submitter_id INTEGER NOT NULL,
        obj_id INTEGER NOT NULL,
        obj_table_name TEXT NOT NULL,
        obj TEXT NOT NULL DEFAULT '{}',
        approver_id INTEGER,
        approved INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS motds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        game_name TEXT NOT NULL,
        game_version_ids TEXT,
        platforms TEXT,
        message TEXT NOT NULL,
        post_type TEXT NOT NULL DEFAULT 'community',
        author_id INTEGER NOT NULL,
        start_time TIMESTAMP NOT NULL,
        end_time TIMESTAMP NOT NULL,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    )"#,
];

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // Single pooled connection: sqlite serializes writers anyway, and it
        // keeps `sqlite::memory:` stores coherent across the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        for stmt in MIGRATIONS {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        info!("database loaded");
        Ok(())
    }

    /// Ensure the built-in server account exists and still holds admin.
    ///
    /// A missing account is created. An account that lost admin is healed
    /// only while its username matches [`RESERVED_ADMIN_NAME`]; a renamed
    /// account with stripped admin is treated as tampering and left alone.
    pub async fn bootstrap(&self) -> Result<()> {
        match users::find_by_id(self, 1).await? {
            None => {
                let now = Utc::now().naive_utc();
                let roles = UserRolesObject {
                    sitewide: vec![UserRole::Admin],
                    ..Default::default()
                };
                sqlx::query(
                    "INSERT INTO users (id, username, discord_id, roles, created_at, updated_at)
                     VALUES (1, ?, '1', ?, ?, ?)",
                )
                .bind(RESERVED_ADMIN_NAME)
                .bind(encode_json(&roles)?)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await?;
                info!("created built in server account");
            }
            Some(mut user) => {
                if !user.roles.sitewide.contains(&UserRole::Admin) {
                    if user.username != RESERVED_ADMIN_NAME {
                        warn!("server account has been tampered with!");
                    } else {
                        user.roles.sitewide.push(UserRole::Admin);
                        users::update_roles(self, user.id, &user.roles).await?;
                        info!("added admin role to server account");
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn integrity_check(&self) -> Result<()> {
        let verdict: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&self.pool)
            .await?;
        if verdict == "ok" {
            Ok(())
        } else {
            Err(ApiError::Integrity(verdict))
        }
    }

    /// Periodic health check. Failures are logged, never acted on. The
    /// startup check belongs to the caller; the first periodic one waits a
    /// full interval.
    pub fn spawn_integrity_task(&self, every: Duration) -> JoinHandle<()> {
        let db = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                match db.integrity_check().await {
                    Ok(()) => info!("database health check: ok"),
                    Err(e) => error!("database health check: {e}"),
                }
            }
        })
    }
}

/// True when the underlying store rejected a write for a uniqueness
/// constraint (e.g. the verified version slot index).
pub fn is_unique_violation(err: &ApiError) -> bool {
    match err {
        ApiError::Db(sqlx::Error::Database(db)) => {
            db.kind() == sqlx::error::ErrorKind::UniqueViolation
        }
        _ => false,
    }
}
