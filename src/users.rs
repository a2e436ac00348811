use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{self, decode_json, encode_json, SupportedGames, UserRole, UserRolesObject};
use crate::store::Database;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub github_id: Option<String>,
    pub discord_id: Option<String>,
    pub sponsor_url: Option<String>,
    pub display_name: String,
    pub bio: String,
    pub roles: UserRolesObject,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn from_db_user(u: models::dUser) -> Result<Self> {
        Ok(User {
            id: u.id,
            username: u.username,
            github_id: u.github_id,
            discord_id: u.discord_id,
            sponsor_url: u.sponsor_url,
            display_name: u.display_name,
            bio: u.bio,
            roles: decode_json(&u.roles)?,
            created_at: u.created_at.and_utc(),
            updated_at: u.updated_at.and_utc(),
        })
    }

    pub fn has_sitewide_role(&self, role: UserRole) -> bool {
        self.roles.sitewide.contains(&role)
    }

    /// A sitewide role also counts for every game scope.
    pub fn has_game_role(&self, game: SupportedGames, role: UserRole) -> bool {
        if self.has_sitewide_role(role) {
            return true;
        }
        self.roles
            .per_game
            .get(&game)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub github_id: Option<String>,
    pub discord_id: Option<String>,
    pub sponsor_url: Option<String>,
    pub display_name: String,
    pub bio: String,
    pub roles: UserRolesObject,
}

pub async fn find_by_id(db: &Database, id: i64) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, models::dUser>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db.pool())
        .await?;
    row.map(User::from_db_user).transpose()
}

pub async fn find_by_username(db: &Database, username: &str) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, models::dUser>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(db.pool())
        .await?;
    row.map(User::from_db_user).transpose()
}

pub async fn all(db: &Database) -> Result<Vec<User>> {
    let rows = sqlx::query_as::<_, models::dUser>("SELECT * FROM users")
        .fetch_all(db.pool())
        .await?;
    rows.into_iter().map(User::from_db_user).collect()
}

pub async fn create(db: &Database, new: NewUser) -> Result<User> {
    let now = Utc::now().naive_utc();
    let result = sqlx::query(
        "INSERT INTO users (username, github_id, discord_id, sponsor_url, display_name, bio, roles, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&new.username)
    .bind(&new.github_id)
    .bind(&new.discord_id)
    .bind(&new.sponsor_url)
    .bind(&new.display_name)
    .bind(&new.bio)
    .bind(encode_json(&new.roles)?)
    .bind(now)
    .bind(now)
    .execute(db.pool())
    .await?;

    let user = find_by_id(db, result.last_insert_rowid()).await?;
    user.ok_or(crate::error::ApiError::NotFound("user"))
}

pub async fn update_roles(db: &Database, id: i64, roles: &UserRolesObject) -> Result<()> {
    sqlx::query("UPDATE users SET roles = ?, updated_at = ? WHERE id = ?")
        .bind(encode_json(roles)?)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(db.pool())
        .await?;
    Ok(())
}
