use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::approvals::{self, EditApproval, EditProposal};
use crate::error::Result;
use crate::game_versions::{self, GameVersion};
use crate::models::SupportedGames;
use crate::mods::{self, Mod};
use crate::motd::{self, Motd};
use crate::store::Database;
use crate::users::{self, User};
use crate::versions::{self, ModVersion};

#[derive(Debug, Default)]
struct CacheSnapshot {
    game_versions: Vec<GameVersion>,
    mods: Vec<Mod>,
    mod_versions: Vec<ModVersion>,
    users: Vec<User>,
    edit_approvals: Vec<EditApproval>,
    motds: Vec<Motd>,
}

/// Wholesale in-memory snapshot of the store, refreshed on a timer and
/// eagerly after out-of-band writes. A best-effort accelerator: readers fall
/// back to the store when the snapshot misses, and tolerate up to one refresh
/// interval of staleness.
#[derive(Debug, Default)]
pub struct DbCache {
    inner: RwLock<CacheSnapshot>,
}

impl DbCache {
    pub fn new() -> Arc<Self> {
        Arc::new(DbCache::default())
    }

    pub async fn refresh_all(&self, db: &Database) -> Result<()> {
        let snapshot = CacheSnapshot {
            game_versions: game_versions::all(db).await?,
            mods: mods::all(db).await?,
            mod_versions: versions::all(db).await?,
            users: users::all(db).await?,
            edit_approvals: approvals::all(db).await?,
            motds: motd::all(db).await?,
        };
        *self.inner.write().await = snapshot;
        Ok(())
    }

    pub async fn refresh_game_versions(&self, db: &Database) -> Result<()> {
        let game_versions = game_versions::all(db).await?;
        self.inner.write().await.game_versions = game_versions;
        Ok(())
    }

    pub async fn game_versions(&self) -> Vec<GameVersion> {
        self.inner.read().await.game_versions.clone()
    }

    pub async fn mods(&self) -> Vec<Mod> {
        self.inner.read().await.mods.clone()
    }

    pub async fn mod_versions(&self) -> Vec<ModVersion> {
        self.inner.read().await.mod_versions.clone()
    }

    pub async fn users(&self) -> Vec<User> {
        self.inner.read().await.users.clone()
    }

    pub async fn edit_approvals(&self) -> Vec<EditApproval> {
        self.inner.read().await.edit_approvals.clone()
    }

    pub async fn motds(&self) -> Vec<Motd> {
        self.inner.read().await.motds.clone()
    }

    pub async fn game_name_from_mod_id(&self, id: i64) -> Option<SupportedGames> {
        let snapshot = self.inner.read().await;
        snapshot.mods.iter().find(|m| m.id == id).map(|m| m.game_name)
    }

    pub async fn game_name_from_mod_version_id(&self, id: i64) -> Option<SupportedGames> {
        let snapshot = self.inner.read().await;
        let mod_version = snapshot.mod_versions.iter().find(|v| v.id == id)?;
        snapshot
            .mods
            .iter()
            .find(|m| m.id == mod_version.mod_id)
            .map(|m| m.game_name)
    }

    pub async fn game_name_from_edit_id(&self, id: i64) -> Option<SupportedGames> {
        let obj_id = {
            let snapshot = self.inner.read().await;
            let edit = snapshot.edit_approvals.iter().find(|e| e.id == id)?;
            match &edit.proposal {
                EditProposal::Mod(p) => return p.game_name,
                EditProposal::ModVersion(_) => edit.obj_id,
            }
        };
        self.game_name_from_mod_version_id(obj_id).await
    }

    /// Reload the snapshot every `every` until aborted. The initial load is
    /// the caller's `refresh_all` at startup.
    pub fn spawn_refresh_task(self: Arc<Self>, db: &Database, every: Duration) -> JoinHandle<()> {
        let cache = self;
        let db = db.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = cache.refresh_all(&db).await {
                    warn!("cache refresh failed: {e}");
                }
            }
        })
    }
}
