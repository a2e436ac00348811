use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, Result};
use crate::models::{self, Category, Platform, SupportedGames, Visibility};
use crate::mods;
use crate::store::Database;
use crate::users::User;
use crate::versions;

pub const MOD_TABLE: &str = "mods";
pub const MOD_VERSION_TABLE: &str = "modVersions";

/// Proposed edit to a mod. Absent fields leave the live record untouched on
/// approval. The wire names match the stored JSON payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModProposal {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub git_url: Option<String>,
    pub author_ids: Option<Vec<i64>>,
    pub game_name: Option<SupportedGames>,
}

/// Proposed edit to a mod version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModVersionProposal {
    pub mod_version: Option<Version>,
    pub platform: Option<Platform>,
    pub supported_game_version_ids: Option<Vec<i64>>,
    pub dependencies: Option<Vec<i64>>,
}

/// The approval payload is a tagged union keyed by the stored table name.
#[derive(Debug, Clone, PartialEq)]
pub enum EditProposal {
    Mod(ModProposal),
    ModVersion(ModVersionProposal),
}

impl EditProposal {
    pub fn table_name(&self) -> &'static str {
        match self {
            EditProposal::Mod(_) => MOD_TABLE,
            EditProposal::ModVersion(_) => MOD_VERSION_TABLE,
        }
    }

    fn payload_json(&self) -> Result<String> {
        match self {
            EditProposal::Mod(p) => models::encode_json(p),
            EditProposal::ModVersion(p) => models::encode_json(p),
        }
    }

    /// Rebuild the union from its stored parts. The table tag and the payload
    /// shape must agree (a mods payload carries a `name` key, a modVersions
    /// payload a `modVersion` key); a record where they disagree is malformed
    /// and is rejected rather than coerced.
    pub fn from_parts(table: &str, raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        match table {
            MOD_TABLE if value.get("name").is_some() => {
                Ok(EditProposal::Mod(serde_json::from_value(value)?))
            }
            MOD_VERSION_TABLE if value.get("modVersion").is_some() => {
                Ok(EditProposal::ModVersion(serde_json::from_value(value)?))
            }
            MOD_TABLE | MOD_VERSION_TABLE => Err(ApiError::Validation(format!(
                "approval payload does not match table {table}"
            ))),
            other => Err(ApiError::Validation(format!(
                "unknown approval table: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditApproval {
    pub id: i64,
    pub submitter_id: i64,
    pub obj_id: i64,
    pub proposal: EditProposal,
    pub approver_id: Option<i64>,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EditApproval {
    pub fn from_db_edit(e: models::dEditApproval) -> Result<Self> {
        Ok(EditApproval {
            id: e.id,
            submitter_id: e.submitter_id,
            obj_id: e.obj_id,
            proposal: EditProposal::from_parts(&e.obj_table_name, &e.obj)?,
            approver_id: e.approver_id,
            approved: e.approved,
            created_at: e.created_at.and_utc(),
            updated_at: e.updated_at.and_utc(),
        })
    }

    pub fn is_mod(&self) -> bool {
        matches!(self.proposal, EditProposal::Mod(_))
    }

    pub fn is_mod_version(&self) -> bool {
        matches!(self.proposal, EditProposal::ModVersion(_))
    }

    /// Merge the proposed fields into the live record, promote it to
    /// verified, and mark this entry approved.
    ///
    /// A missing target aborts with NotFound and leaves the entry pending;
    /// a merge that would duplicate a verified version slot propagates the
    /// conflict from the version update hook.
    pub async fn approve(&mut self, db: &Database, user: &User) -> Result<()> {
        match &self.proposal {
            EditProposal::ModVersion(p) => {
                let mut mv = versions::find_by_id(db, self.obj_id)
                    .await?
                    .ok_or(ApiError::NotFound("mod version"))?;
                if let Some(v) = &p.mod_version {
                    mv.mod_version = v.clone();
                }
                if let Some(platform) = p.platform {
                    mv.platform = platform;
                }
                if let Some(ids) = &p.supported_game_version_ids {
                    mv.supported_game_version_ids = ids.clone();
                }
                if let Some(deps) = &p.dependencies {
                    mv.dependencies = deps.clone();
                }
                mv.visibility = Visibility::Verified;
                versions::update(db, &mv).await?;
            }
            EditProposal::Mod(p) => {
                let mut m = mods::find_by_id(db, self.obj_id)
                    .await?
                    .ok_or(ApiError::NotFound("mod"))?;
                if let Some(name) = &p.name {
                    m.name = name.clone();
                }
                if let Some(description) = &p.description {
                    m.description = description.clone();
                }
                if let Some(category) = p.category {
                    m.category = category;
                }
                if let Some(git_url) = &p.git_url {
                    m.git_url = git_url.clone();
                }
                if let Some(authors) = &p.author_ids {
                    m.author_ids = authors.clone();
                }
                m.visibility = Visibility::Verified;
                mods::update(db, &m).await?;
            }
        }

        self.approved = true;
        self.approver_id = Some(user.id);
        sqlx::query(
            "UPDATE edit_approval_queue SET approved = 1, approver_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(user.id)
        .bind(Utc::now().naive_utc())
        .bind(self.id)
        .execute(db.pool())
        .await?;
        info!("edit {} approved by {}", self.id, user.username);
        Ok(())
    }
}

pub async fn submit(
    db: &Database,
    submitter_id: i64,
    obj_id: i64,
    proposal: EditProposal,
) -> Result<EditApproval> {
    let now = Utc::now().naive_utc();
    let result = sqlx::query(
        "INSERT INTO edit_approval_queue (submitter_id, obj_id, obj_table_name, obj, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(submitter_id)
    .bind(obj_id)
    .bind(proposal.table_name())
    .bind(proposal.payload_json()?)
    .bind(now)
    .bind(now)
    .execute(db.pool())
    .await?;

    find_by_id(db, result.last_insert_rowid())
        .await?
        .ok_or(ApiError::NotFound("edit"))
}

pub async fn find_by_id(db: &Database, id: i64) -> Result<Option<EditApproval>> {
    let row =
        sqlx::query_as::<_, models::dEditApproval>("SELECT * FROM edit_approval_queue WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?;
    row.map(EditApproval::from_db_edit).transpose()
}

pub async fn pending(db: &Database) -> Result<Vec<EditApproval>> {
    let rows = sqlx::query_as::<_, models::dEditApproval>(
        "SELECT * FROM edit_approval_queue WHERE approved = 0",
    )
    .fetch_all(db.pool())
    .await?;
    rows.into_iter().map(EditApproval::from_db_edit).collect()
}

pub async fn all(db: &Database) -> Result<Vec<EditApproval>> {
    let rows = sqlx::query_as::<_, models::dEditApproval>("SELECT * FROM edit_approval_queue")
        .fetch_all(db.pool())
        .await?;
    rows.into_iter().map(EditApproval::from_db_edit).collect()
}
