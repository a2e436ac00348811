#![allow(non_camel_case_types)]

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{ApiError, Result};

// Raw table rows. List/set columns are TEXT holding JSON arrays; they are
// decoded into native types at the row->domain boundary, never through hidden
// accessors.

#[derive(Clone, Debug, FromRow)]
pub struct dUser {
    pub id: i64,
    pub username: String,
    pub github_id: Option<String>,
    pub discord_id: Option<String>,
    pub sponsor_url: Option<String>,
    pub display_name: String,
    pub bio: String,
    pub roles: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Debug, FromRow)]
pub struct dGameVersion {
    pub id: i64,
    pub game_name: String,
    pub version: String,
    pub default_version: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Debug, FromRow)]
pub struct dMod {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub game_name: String,
    pub category: String,
    pub author_ids: String,
    pub icon_file_name: String,
    pub git_url: String,
    pub visibility: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Debug, FromRow)]
pub struct dModVersion {
    pub id: i64,
    pub mod_id: i64,
    pub author_id: i64,
    pub mod_version: String,
    pub supported_game_version_ids: String,
    pub visibility: String,
    pub platform: String,
    pub zip_hash: String,
    pub content_hashes: String,
    pub dependencies: String,
    pub download_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Debug, FromRow)]
pub struct dEditApproval {
    pub id: i64,
    pub submitter_id: i64,
    pub obj_id: i64,
    pub obj_table_name: String,
    pub obj: String,
    pub approver_id: Option<i64>,
    pub approved: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Debug, FromRow)]
pub struct dMotd {
    pub id: i64,
    pub game_name: String,
    pub game_version_ids: Option<String>,
    pub platforms: Option<String>,
    pub message: String,
    pub post_type: String,
    pub author_id: i64,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Decode a JSON-encoded TEXT column.
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    Ok(serde_json::from_str(raw)?)
}

/// Encode a list/set field for storage in a TEXT column.
pub fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHash {
    pub path: String,
    pub hash: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SupportedGames {
    BeatSaber,
    // Add games here
}

impl SupportedGames {
    pub fn as_str(self) -> &'static str {
        match self {
            SupportedGames::BeatSaber => "BeatSaber",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "BeatSaber" => Ok(SupportedGames::BeatSaber),
            other => Err(ApiError::Validation(format!("unknown game name: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "steampc")]
    SteamPC,
    #[serde(rename = "oculuspc")]
    OculusPC,
    #[serde(rename = "universalpc")]
    UniversalPC,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::SteamPC => "steampc",
            Platform::OculusPC => "oculuspc",
            Platform::UniversalPC => "universalpc",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "steampc" => Ok(Platform::SteamPC),
            "oculuspc" => Ok(Platform::OculusPC),
            "universalpc" => Ok(Platform::UniversalPC),
            other => Err(ApiError::Validation(format!("unknown platform: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Removed,
    Unverified,
    Verified,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Removed => "removed",
            Visibility::Unverified => "unverified",
            Visibility::Verified => "verified",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "private" => Ok(Visibility::Private),
            "removed" => Ok(Visibility::Removed),
            "unverified" => Ok(Visibility::Unverified),
            "verified" => Ok(Visibility::Verified),
            other => Err(ApiError::Validation(format!("unknown visibility: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Core,
    Essential,
    Library,
    Cosmetic,
    #[serde(rename = "practice")]
    PracticeTraining,
    Gameplay,
    #[serde(rename = "streamtools")]
    StreamTools,
    #[serde(rename = "ui")]
    UIEnhancements,
    Lighting,
    #[serde(rename = "tweaks")]
    TweaksTools,
    Multiplayer,
    #[serde(rename = "text")]
    TextChanges,
    Editor,
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Core => "core",
            Category::Essential => "essential",
            Category::Library => "library",
            Category::Cosmetic => "cosmetic",
            Category::PracticeTraining => "practice",
            Category::Gameplay => "gameplay",
            Category::StreamTools => "streamtools",
            Category::UIEnhancements => "ui",
            Category::Lighting => "lighting",
            Category::TweaksTools => "tweaks",
            Category::Multiplayer => "multiplayer",
            Category::TextChanges => "text",
            Category::Editor => "editor",
            Category::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "core" => Ok(Category::Core),
            "essential" => Ok(Category::Essential),
            "library" => Ok(Category::Library),
            "cosmetic" => Ok(Category::Cosmetic),
            "practice" => Ok(Category::PracticeTraining),
            "gameplay" => Ok(Category::Gameplay),
            "streamtools" => Ok(Category::StreamTools),
            "ui" => Ok(Category::UIEnhancements),
            "lighting" => Ok(Category::Lighting),
            "tweaks" => Ok(Category::TweaksTools),
            "multiplayer" => Ok(Category::Multiplayer),
            "text" => Ok(Category::TextChanges),
            "editor" => Ok(Category::Editor),
            "other" => Ok(Category::Other),
            other => Err(ApiError::Validation(format!("unknown category: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Approver,
    Moderator,
    Poster,
    Banned,
}

/// Sitewide role set plus per-game role sets, stored as one JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRolesObject {
    #[serde(default)]
    pub sitewide: Vec<UserRole>,
    #[serde(default, rename = "perGame")]
    pub per_game: BTreeMap<SupportedGames, Vec<UserRole>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Emergency,
    #[serde(rename = "gameupdates")]
    GameUpdates,
    Community,
}

impl PostType {
    pub fn as_str(self) -> &'static str {
        match self {
            PostType::Emergency => "emergency",
            PostType::GameUpdates => "gameupdates",
            PostType::Community => "community",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "emergency" => Ok(PostType::Emergency),
            "gameupdates" => Ok(PostType::GameUpdates),
            "community" => Ok(PostType::Community),
            other => Err(ApiError::Validation(format!("unknown post type: {other}"))),
        }
    }
}
