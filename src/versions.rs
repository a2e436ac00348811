use chrono::{DateTime, Utc};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::DbCache;
use crate::error::{ApiError, Result};
use crate::game_versions::{self, GameVersion};
use crate::models::{self, decode_json, encode_json, ContentHash, Platform, Visibility};
use crate::store::Database;
use crate::users::User;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ModVersion {
    pub id: i64,
    pub mod_id: i64,
    pub author_id: i64,
    pub mod_version: Version,
    pub supported_game_version_ids: Vec<i64>,
    pub visibility: Visibility,
    pub platform: Platform,
    pub zip_hash: String,
    pub content_hashes: Vec<ContentHash>,
    /// Ids of other mod versions this release depends on.
    pub dependencies: Vec<i64>,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModVersion {
    pub fn from_db_version(v: models::dModVersion) -> Result<Self> {
        Ok(ModVersion {
            id: v.id,
            mod_id: v.mod_id,
            author_id: v.author_id,
            mod_version: Version::parse(&v.mod_version)
                .map_err(|e| ApiError::Validation(format!("stored version is not semver: {e}")))?,
            supported_game_version_ids: decode_json(&v.supported_game_version_ids)?,
            visibility: Visibility::parse(&v.visibility)?,
            platform: Platform::parse(&v.platform)?,
            zip_hash: v.zip_hash,
            content_hashes: decode_json(&v.content_hashes)?,
            dependencies: decode_json(&v.dependencies)?,
            download_count: v.download_count,
            created_at: v.created_at.and_utc(),
            updated_at: v.updated_at.and_utc(),
        })
    }

    /// Resolve the supported game version ids, cache first.
    pub async fn supported_game_versions(
        &self,
        db: &Database,
        cache: &DbCache,
    ) -> Result<Vec<GameVersion>> {
        let snapshot = cache.game_versions().await;
        let mut out = Vec::new();
        for id in &self.supported_game_version_ids {
            let found = match snapshot.iter().find(|v| v.id == *id) {
                Some(v) => Some(v.clone()),
                None => game_versions::find_by_id(db, *id).await?,
            };
            if let Some(v) = found {
                out.push(v);
            }
        }
        Ok(out)
    }

    /// Resolve dependency ids into mod versions, cache first. Missing ids are
    /// skipped.
    pub async fn resolved_dependencies(
        &self,
        db: &Database,
        cache: &DbCache,
    ) -> Result<Vec<ModVersion>> {
        let snapshot = cache.mod_versions().await;
        let mut out = Vec::new();
        for id in &self.dependencies {
            let found = match snapshot.iter().find(|v| v.id == *id) {
                Some(v) => Some(v.clone()),
                None => find_by_id(db, *id).await?,
            };
            if let Some(v) = found {
                out.push(v);
            }
        }
        Ok(out)
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
            "mod version {} set to {} by {}",
            self.id,
            visibility.as_str(),
            user.username
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NewModVersion {
    pub mod_id: i64,
    pub author_id: i64,
    pub mod_version: Version,
    pub supported_game_version_ids: Vec<i64>,
    pub platform: Platform,
    pub dependencies: Vec<i64>,
    pub zip_hash: String,
    pub content_hashes: Vec<ContentHash>,
    pub visibility: Visibility,
}

pub async fn find_by_id(db: &Database, id: i64) -> Result<Option<ModVersion>> {
    let row = sqlx::query_as::<_, models::dModVersion>("SELECT * FROM mod_versions WHERE id = ?")
        .bind(id)
        .fetch_optional(db.pool())
        .await?;
    row.map(ModVersion::from_db_version).transpose()
}

pub async fn find_by_mod_id(db: &Database, mod_id: i64) -> Result<Vec<ModVersion>> {
    let rows =
        sqlx::query_as::<_, models::dModVersion>("SELECT * FROM mod_versions WHERE mod_id = ?")
            .bind(mod_id)
            .fetch_all(db.pool())
            .await?;
    rows.into_iter().map(ModVersion::from_db_version).collect()
}

pub async fn all(db: &Database) -> Result<Vec<ModVersion>> {
    let rows = sqlx::query_as::<_, models::dModVersion>("SELECT * FROM mod_versions")
        .fetch_all(db.pool())
        .await?;
    rows.into_iter().map(ModVersion::from_db_version).collect()
}

/// Any version already occupying the (mod, version, platform) slot, where
/// occupying means unverified or verified. Private and removed versions do
/// not block reuse of a version string.
pub async fn check_for_existing_version(
    db: &Database,
    mod_id: i64,
    version: &Version,
    platform: Platform,
) -> Result<Option<ModVersion>> {
    let row = sqlx::query_as::<_, models::dModVersion>(
        "SELECT * FROM mod_versions
         WHERE mod_id = ? AND mod_version = ? AND platform = ?
           AND visibility IN ('unverified', 'verified')",
    )
    .bind(mod_id)
    .bind(version.to_string())
    .bind(platform.as_str())
    .fetch_optional(db.pool())
    .await?;
    row.map(ModVersion::from_db_version).transpose()
}

pub async fn count_existing_versions(
    db: &Database,
    mod_id: i64,
    version: &Version,
    platform: Platform,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM mod_versions
         WHERE mod_id = ? AND mod_version = ? AND platform = ?
           AND visibility IN ('unverified', 'verified')",
    )
    .bind(mod_id)
    .bind(version.to_string())
    .bind(platform.as_str())
    .fetch_one(db.pool())
    .await?;
    Ok(count)
}

pub async fn create(db: &Database, new: NewModVersion) -> Result<ModVersion> {
    let mod_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM mods WHERE id = ?")
        .bind(new.mod_id)
        .fetch_optional(db.pool())
        .await?;
    if mod_exists.is_none() {
        return Err(ApiError::NotFound("mod"));
    }
    for id in &new.supported_game_version_ids {
        if game_versions::find_by_id(db, *id).await?.is_none() {
            return Err(ApiError::NotFound("game version"));
        }
    }
    for id in &new.dependencies {
        if find_by_id(db, *id).await?.is_none() {
            return Err(ApiError::NotFound("dependency"));
        }
    }

    if check_for_existing_version(db, new.mod_id, &new.mod_version, new.platform)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("version already exists".to_string()));
    }

    let now = Utc::now().naive_utc();
    let result = sqlx::query(
        "INSERT INTO mod_versions
         (mod_id, author_id, mod_version, supported_game_version_ids, visibility, platform,
          zip_hash, content_hashes, dependencies, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(new.mod_id)
    .bind(new.author_id)
    .bind(new.mod_version.to_string())
    .bind(encode_json(&new.supported_game_version_ids)?)
    .bind(new.visibility.as_str())
    .bind(new.platform.as_str())
    .bind(&new.zip_hash)
    .bind(encode_json(&new.content_hashes)?)
    .bind(encode_json(&new.dependencies)?)
    .bind(now)
    .bind(now)
    .execute(db.pool())
    .await?;

    find_by_id(db, result.last_insert_rowid())
        .await?
        .ok_or(ApiError::NotFound("mod version"))
}

/// Persist an edited version. A duplicate slot held by another record only
/// blocks the edit once it would go out verified; non-verified edits tolerate
/// the soft conflict until promotion.
pub async fn update(db: &Database, mv: &ModVersion) -> Result<()> {
    let holder: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM mod_versions
         WHERE mod_id = ? AND mod_version = ? AND platform = ? AND id != ?
           AND visibility IN ('unverified', 'verified')",
    )
    .bind(mv.mod_id)
    .bind(mv.mod_version.to_string())
    .bind(mv.platform.as_str())
    .bind(mv.id)
    .fetch_optional(db.pool())
    .await?;
    if holder.is_some() && mv.visibility == Visibility::Verified {
        return Err(ApiError::Conflict(
            "edit would cause a duplicate version".to_string(),
        ));
    }

    sqlx::query(
        "UPDATE mod_versions
         SET mod_version = ?, supported_game_version_ids = ?, visibility = ?, platform = ?,
             zip_hash = ?, content_hashes = ?, dependencies = ?, download_count = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(mv.mod_version.to_string())
    .bind(encode_json(&mv.supported_game_version_ids)?)
    .bind(mv.visibility.as_str())
    .bind(mv.platform.as_str())
    .bind(&mv.zip_hash)
    .bind(encode_json(&mv.content_hashes)?)
    .bind(encode_json(&mv.dependencies)?)
    .bind(mv.download_count)
    .bind(Utc::now().naive_utc())
    .bind(mv.id)
    .execute(db.pool())
    .await?;
    Ok(())
}

pub async fn increment_downloads(db: &Database, id: i64) -> Result<()> {
    sqlx::query("UPDATE mod_versions SET download_count = download_count + 1 WHERE id = ?")
        .bind(id)
        .execute(db.pool())
        .await?;
    Ok(())
}

/// Whether `candidate` may stand in for `original` as a dependency when
/// targeting `for_game_version`: the original must not already support that
/// game version, the candidate must, and the candidate has to stay within the
/// original's caret compatibility band.
pub fn is_valid_dependency_successor(
    original: &ModVersion,
    candidate: &ModVersion,
    for_game_version: i64,
) -> bool {
    if original
        .supported_game_version_ids
        .contains(&for_game_version)
    {
        return false;
    }
    if !candidate
        .supported_game_version_ids
        .contains(&for_game_version)
    {
        return false;
    }
    match VersionReq::parse(&format!("^{}", original.mod_version)) {
        Ok(req) => req.matches(&candidate.mod_version),
        Err(_) => false,
    }
}
