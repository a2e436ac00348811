use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::DbCache;
use crate::error::{ApiError, Result};
use crate::models::{self, decode_json, encode_json, Category, SupportedGames, Visibility};
use crate::store::Database;
use crate::users::User;
use crate::versions::{self, ModVersion};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Mod {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub game_name: SupportedGames,
    pub category: Category,
    pub author_ids: Vec<i64>,
    pub icon_file_name: String,
    pub git_url: String,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mod {
    pub fn from_db_mod(m: models::dMod) -> Result<Self> {
        Ok(Mod {
            id: m.id,
            name: m.name,
            description: m.description,
            game_name: SupportedGames::parse(&m.game_name)?,
            category: Category::parse(&m.category)?,
            author_ids: decode_json(&m.author_ids)?,
            icon_file_name: m.icon_file_name,
            git_url: m.git_url,
            visibility: Visibility::parse(&m.visibility)?,
            created_at: m.created_at.and_utc(),
            updated_at: m.updated_at.and_utc(),
        })
    }

    /// Newest version of this mod that supports the given game version.
    /// Reads the cached snapshot first and falls back to the store when the
    /// snapshot has nothing for this mod.
    pub async fn latest_version(
        &self,
        db: &Database,
        cache: &DbCache,
        game_version_id: i64,
    ) -> Result<Option<ModVersion>> {
        let mut candidates: Vec<ModVersion> = cache
            .mod_versions()
            .await
            .into_iter()
            .filter(|v| v.mod_id == self.id)
            .collect();
        if candidates.is_empty() {
            candidates = versions::find_by_mod_id(db, self.id).await?;
        }
        Ok(candidates
            .into_iter()
            .filter(|v| v.supported_game_version_ids.contains(&game_version_id))
            .max_by(|a, b| a.mod_version.cmp(&b.mod_version)))
    }

    pub async fn set_visibility(
        &mut self,
        db: &Database,
        visibility: Visibility,
        user: &User,
    ) -> Result<()> {
        self.visibility = visibility;
        update(db, self).await?;
        info!(
            "mod {} set to {} by {}",
            self.id,
            visibility.as_str(),
            user.username
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NewMod {
    pub name: String,
    pub description: String,
    pub game_name: SupportedGames,
    pub category: Category,
    pub author_ids: Vec<i64>,
    pub icon_file_name: String,
    pub git_url: String,
    pub visibility: Visibility,
}

/// Name collision check. Removed mods release their name.
pub async fn check_for_existing_mod(db: &Database, name: &str) -> Result<Option<Mod>> {
    let row = sqlx::query_as::<_, models::dMod>(
        "SELECT * FROM mods WHERE name = ? AND visibility != 'removed'",
    )
    .bind(name)
    .fetch_optional(db.pool())
    .await?;
    row.map(Mod::from_db_mod).transpose()
}

pub async fn find_by_id(db: &Database, id: i64) -> Result<Option<Mod>> {
    let row = sqlx::query_as::<_, models::dMod>("SELECT * FROM mods WHERE id = ?")
        .bind(id)
        .fetch_optional(db.pool())
        .await?;
    row.map(Mod::from_db_mod).transpose()
}

pub async fn all(db: &Database) -> Result<Vec<Mod>> {
    let rows = sqlx::query_as::<_, models::dMod>("SELECT * FROM mods")
        .fetch_all(db.pool())
        .await?;
    rows.into_iter().map(Mod::from_db_mod).collect()
}

pub async fn create(db: &Database, new: NewMod) -> Result<Mod> {
    if new.author_ids.is_empty() {
        return Err(ApiError::Validation(
            "a mod needs at least one author".to_string(),
        ));
    }
    if check_for_existing_mod(db, &new.name).await?.is_some() {
        return Err(ApiError::Conflict("mod already exists".to_string()));
    }

    let now = Utc::now().naive_utc();
    let result = sqlx::query(
        "INSERT INTO mods
         (name, description, game_name, category, author_ids, icon_file_name, git_url, visibility,
          created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&new.name)
    .bind(&new.description)
    .bind(new.game_name.as_str())
    .bind(new.category.as_str())
    .bind(encode_json(&new.author_ids)?)
    .bind(&new.icon_file_name)
    .bind(&new.git_url)
    .bind(new.visibility.as_str())
    .bind(now)
    .bind(now)
    .execute(db.pool())
    .await?;

    find_by_id(db, result.last_insert_rowid())
        .await?
        .ok_or(ApiError::NotFound("mod"))
}

pub async fn update(db: &Database, m: &Mod) -> Result<()> {
    if let Some(existing) = check_for_existing_mod(db, &m.name).await? {
        if existing.id != m.id {
            return Err(ApiError::Conflict("mod already exists".to_string()));
        }
    }

    sqlx::query(
        "UPDATE mods
         SET name = ?, description = ?, game_name = ?, category = ?, author_ids = ?,
             icon_file_name = ?, git_url = ?, visibility = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&m.name)
    .bind(&m.description)
    .bind(m.game_name.as_str())
    .bind(m.category.as_str())
    .bind(encode_json(&m.author_ids)?)
    .bind(&m.icon_file_name)
    .bind(&m.git_url)
    .bind(m.visibility.as_str())
    .bind(Utc::now().naive_utc())
    .bind(m.id)
    .execute(db.pool())
    .await?;
    Ok(())
}
