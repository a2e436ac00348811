use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::DbCache;
use crate::error::{ApiError, Result};
use crate::models::{self, SupportedGames};
use crate::store::Database;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GameVersion {
    pub id: i64,
    pub game_name: SupportedGames,
    pub version: String,
    pub default_version: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameVersion {
    pub fn from_db_game_version(v: models::dGameVersion) -> Result<Self> {
        Ok(GameVersion {
            id: v.id,
            game_name: SupportedGames::parse(&v.game_name)?,
            version: v.version,
            default_version: v.default_version,
            created_at: v.created_at.and_utc(),
            updated_at: v.updated_at.and_utc(),
        })
    }
}

pub async fn find_by_id(db: &Database, id: i64) -> Result<Option<GameVersion>> {
    let row = sqlx::query_as::<_, models::dGameVersion>("SELECT * FROM game_versions WHERE id = ?")
        .bind(id)
        .fetch_optional(db.pool())
        .await?;
    row.map(GameVersion::from_db_game_version).transpose()
}

pub async fn all(db: &Database) -> Result<Vec<GameVersion>> {
    let rows = sqlx::query_as::<_, models::dGameVersion>("SELECT * FROM game_versions")
        .fetch_all(db.pool())
        .await?;
    rows.into_iter()
        .map(GameVersion::from_db_game_version)
        .collect()
}

pub async fn for_game(db: &Database, game: SupportedGames) -> Result<Vec<GameVersion>> {
    let rows =
        sqlx::query_as::<_, models::dGameVersion>("SELECT * FROM game_versions WHERE game_name = ?")
            .bind(game.as_str())
            .fetch_all(db.pool())
            .await?;
    rows.into_iter()
        .map(GameVersion::from_db_game_version)
        .collect()
}

/// The first version recorded for a game becomes its default, so endpoints
/// always have one to fall back on.
pub async fn create(db: &Database, game: SupportedGames, version: &str) -> Result<GameVersion> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM game_versions WHERE game_name = ? AND version = ?")
            .bind(game.as_str())
            .bind(version)
            .fetch_optional(db.pool())
            .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("version already exists".to_string()));
    }

    let any_for_game: Option<i64> =
        sqlx::query_scalar("SELECT id FROM game_versions WHERE game_name = ? LIMIT 1")
            .bind(game.as_str())
            .fetch_optional(db.pool())
            .await?;
    let default_version = any_for_game.is_none();

    let now = Utc::now().naive_utc();
    let result = sqlx::query(
        "INSERT INTO game_versions (game_name, version, default_version, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(game.as_str())
    .bind(version)
    .bind(default_version)
    .bind(now)
    .bind(now)
    .execute(db.pool())
    .await?;

    find_by_id(db, result.last_insert_rowid())
        .await?
        .ok_or(ApiError::NotFound("game version"))
}

/// Current default for a game. Reads the cache snapshot first; the store is
/// the source of truth when the snapshot has nothing.
pub async fn default_for_game(
    db: &Database,
    cache: &DbCache,
    game: SupportedGames,
) -> Result<Option<GameVersion>> {
    if let Some(v) = cache
        .game_versions()
        .await
        .into_iter()
        .find(|v| v.game_name == game && v.default_version)
    {
        return Ok(Some(v));
    }
    let row = sqlx::query_as::<_, models::dGameVersion>(
        "SELECT * FROM game_versions WHERE game_name = ? AND default_version = 1",
    )
    .bind(game.as_str())
    .fetch_optional(db.pool())
    .await?;
    row.map(GameVersion::from_db_game_version).transpose()
}

/// Switch the default version for the target's game. The old default is
/// cleared and the new one set in one transaction, then the game-version
/// snapshot is refreshed eagerly since the cache timer will not see the flip
/// for up to a minute.
pub async fn set_default(
    db: &Database,
    cache: &DbCache,
    id: i64,
) -> Result<(GameVersion, Option<GameVersion>)> {
    let target = find_by_id(db, id)
        .await?
        .ok_or(ApiError::NotFound("game version"))?;
    let previous = sqlx::query_as::<_, models::dGameVersion>(
        "SELECT * FROM game_versions WHERE game_name = ? AND default_version = 1 AND id != ?",
    )
    .bind(target.game_name.as_str())
    .bind(id)
    .fetch_optional(db.pool())
    .await?
    .map(GameVersion::from_db_game_version)
    .transpose()?;

    let now = Utc::now().naive_utc();
    let mut tx = db.pool().begin().await?;
    sqlx::query(
        "UPDATE game_versions SET default_version = 0, updated_at = ? WHERE game_name = ? AND default_version = 1",
    )
    .bind(now)
    .bind(target.game_name.as_str())
    .execute(&mut *tx)
    .await?;
    sqlx::query("UPDATE game_versions SET default_version = 1, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    cache.refresh_game_versions(db).await?;
    info!("default version for {} set to {}", target.game_name.as_str(), target.version);

    let updated = find_by_id(db, id)
        .await?
        .ok_or(ApiError::NotFound("game version"))?;
    Ok((updated, previous))
}
