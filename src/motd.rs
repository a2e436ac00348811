use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::DbCache;
use crate::error::{ApiError, Result};
use crate::models::{self, decode_json, encode_json, Platform, PostType, SupportedGames};
use crate::store::Database;

/// A timed message-of-the-day banner, scoped to a game and optionally to
/// specific game versions and platforms (None means all).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Motd {
    pub id: i64,
    pub game_name: SupportedGames,
    pub game_version_ids: Option<Vec<i64>>,
    pub platforms: Option<Vec<Platform>>,
    pub message: String,
    pub post_type: PostType,
    pub author_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Motd {
    pub fn from_db_motd(m: models::dMotd) -> Result<Self> {
        Ok(Motd {
            id: m.id,
            game_name: SupportedGames::parse(&m.game_name)?,
            game_version_ids: m.game_version_ids.as_deref().map(decode_json).transpose()?,
            platforms: m.platforms.as_deref().map(decode_json).transpose()?,
            message: m.message,
            post_type: PostType::parse(&m.post_type)?,
            author_id: m.author_id,
            start_time: m.start_time.and_utc(),
            end_time: m.end_time.and_utc(),
            created_at: m.created_at.and_utc(),
            updated_at: m.updated_at.and_utc(),
        })
    }

    fn matches(
        &self,
        game: SupportedGames,
        game_version_ids: &[i64],
        platform: Platform,
        include_expired: bool,
        now: DateTime<Utc>,
    ) -> bool {
        if self.game_name != game || self.start_time > now {
            return false;
        }
        if !include_expired && self.end_time < now {
            return false;
        }
        if let Some(ids) = &self.game_version_ids {
            if !ids.iter().any(|id| game_version_ids.contains(id)) {
                return false;
            }
        }
        if let Some(platforms) = &self.platforms {
            if !platforms.contains(&platform) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct NewMotd {
    pub game_name: SupportedGames,
    pub game_version_ids: Option<Vec<i64>>,
    pub platforms: Option<Vec<Platform>>,
    pub message: String,
    pub post_type: PostType,
    pub author_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

pub async fn find_by_id(db: &Database, id: i64) -> Result<Option<Motd>> {
    let row = sqlx::query_as::<_, models::dMotd>("SELECT * FROM motds WHERE id = ?")
        .bind(id)
        .fetch_optional(db.pool())
        .await?;
    row.map(Motd::from_db_motd).transpose()
}

pub async fn all(db: &Database) -> Result<Vec<Motd>> {
    let rows = sqlx::query_as::<_, models::dMotd>("SELECT * FROM motds")
        .fetch_all(db.pool())
        .await?;
    rows.into_iter().map(Motd::from_db_motd).collect()
}

pub async fn create(db: &Database, new: NewMotd) -> Result<Motd> {
    let now = Utc::now().naive_utc();
    let result = sqlx::query(
        "INSERT INTO motds
         (game_name, game_version_ids, platforms, message, post_type, author_id, start_time,
          end_time, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(new.game_name.as_str())
    .bind(new.game_version_ids.as_ref().map(encode_json).transpose()?)
    .bind(new.platforms.as_ref().map(encode_json).transpose()?)
    .bind(&new.message)
    .bind(new.post_type.as_str())
    .bind(new.author_id)
    .bind(new.start_time.naive_utc())
    .bind(new.end_time.naive_utc())
    .bind(now)
    .bind(now)
    .execute(db.pool())
    .await?;

    find_by_id(db, result.last_insert_rowid())
        .await?
        .ok_or(ApiError::NotFound("motd"))
}

pub async fn delete(db: &Database, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM motds WHERE id = ?")
        .bind(id)
        .execute(db.pool())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("motd"));
    }
    Ok(())
}

/// Banners currently live for the given game / game versions / platform,
/// read from the cache snapshot.
pub async fn active(
    cache: &DbCache,
    game: SupportedGames,
    game_version_ids: &[i64],
    platform: Platform,
    include_expired: bool,
) -> Vec<Motd> {
    let now = Utc::now();
    cache
        .motds()
        .await
        .into_iter()
        .filter(|m| m.matches(game, game_version_ids, platform, include_expired, now))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn motd(start_offset_mins: i64, end_offset_mins: i64) -> Motd {
        let now = Utc::now();
        Motd {
            id: 1,
            game_name: SupportedGames::BeatSaber,
            game_version_ids: None,
            platforms: None,
            message: "maintenance tonight".to_string(),
            post_type: PostType::Community,
            author_id: 1,
            start_time: now + Duration::minutes(start_offset_mins),
            end_time: now + Duration::minutes(end_offset_mins),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn window_filtering() {
        let now = Utc::now();
        let live = motd(-10, 10);
        let expired = motd(-20, -10);
        let upcoming = motd(10, 20);

        assert!(live.matches(SupportedGames::BeatSaber, &[], Platform::SteamPC, false, now));
        assert!(!expired.matches(SupportedGames::BeatSaber, &[], Platform::SteamPC, false, now));
        assert!(expired.matches(SupportedGames::BeatSaber, &[], Platform::SteamPC, true, now));
        // not yet started, even with expired included
        assert!(!upcoming.matches(SupportedGames::BeatSaber, &[], Platform::SteamPC, true, now));
    }

    #[test]
    fn scope_filtering() {
        let now = Utc::now();
        let mut m = motd(-10, 10);
        m.game_version_ids = Some(vec![3, 4]);
        m.platforms = Some(vec![Platform::OculusPC]);

        assert!(m.matches(SupportedGames::BeatSaber, &[4], Platform::OculusPC, false, now));
        assert!(!m.matches(SupportedGames::BeatSaber, &[5], Platform::OculusPC, false, now));
        assert!(!m.matches(SupportedGames::BeatSaber, &[4], Platform::SteamPC, false, now));
    }
}
