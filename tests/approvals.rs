use semver::Version;

use bbm_api::approvals::{self, EditProposal, ModProposal, ModVersionProposal};
use bbm_api::error::ApiError;
use bbm_api::game_versions::{self, GameVersion};
use bbm_api::models::{Category, Platform, SupportedGames, Visibility};
use bbm_api::mods::{self, Mod, NewMod};
use bbm_api::store::Database;
use bbm_api::users::{self, User};
use bbm_api::versions::{self, NewModVersion};

async fn test_db() -> Database {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.migrate().await.unwrap();
    db.bootstrap().await.unwrap();
    db
}

async fn seed(db: &Database) -> (User, GameVersion, Mod) {
    let admin = users::find_by_id(db, 1).await.unwrap().unwrap();
    let gv = game_versions::create(db, SupportedGames::BeatSaber, "1.29.1")
        .await
        .unwrap();
    let m = mods::create(
        db,
        NewMod {
            name: "Camera2".to_string(),
            description: "Camera replacement".to_string(),
            game_name: SupportedGames::BeatSaber,
            category: Category::Essential,
            author_ids: vec![admin.id],
            icon_file_name: String::new(),
            git_url: String::new(),
            visibility: Visibility::Unverified,
        },
    )
    .await
    .unwrap();
    (admin, gv, m)
}

fn new_version(mod_id: i64, ver: &str, game_version_id: i64) -> NewModVersion {
    NewModVersion {
        mod_id,
        author_id: 1,
        mod_version: Version::parse(ver).unwrap(),
        supported_game_version_ids: vec![game_version_id],
        platform: Platform::SteamPC,
        dependencies: vec![],
        zip_hash: String::new(),
        content_hashes: vec![],
        visibility: Visibility::Unverified,
    }
}

#[tokio::test]
async fn approving_a_mod_edit_merges_present_fields_only() {
    let db = test_db().await;
    let (admin, _, m) = seed(&db).await;

    let proposal = EditProposal::Mod(ModProposal {
        name: Some("Camera3".to_string()),
        ..Default::default()
    });
    let mut edit = approvals::submit(&db, admin.id, m.id, proposal).await.unwrap();
    assert!(edit.is_mod());
    assert!(!edit.approved);
    assert_eq!(edit.approver_id, None);

    edit.approve(&db, &admin).await.unwrap();

    let merged = mods::find_by_id(&db, m.id).await.unwrap().unwrap();
    assert_eq!(merged.name, "Camera3");
    // absent fields stay untouched
    assert_eq!(merged.description, "Camera replacement");
    assert_eq!(merged.category, Category::Essential);
    assert_eq!(merged.visibility, Visibility::Verified);

    let stored = approvals::find_by_id(&db, edit.id).await.unwrap().unwrap();
    assert!(stored.approved);
    assert_eq!(stored.approver_id, Some(admin.id));
    assert!(approvals::pending(&db).await.unwrap().is_empty());
}

#[tokio::test]
async fn approving_a_version_edit_merges_and_verifies() {
    let db = test_db().await;
    let (admin, gv, m) = seed(&db).await;
    let v = versions::create(&db, new_version(m.id, "1.0.0", gv.id))
        .await
        .unwrap();
    let newer_game = game_versions::create(&db, SupportedGames::BeatSaber, "1.34.2")
        .await
        .unwrap();

    let proposal = EditProposal::ModVersion(ModVersionProposal {
        mod_version: Some(Version::parse("1.0.1").unwrap()),
        supported_game_version_ids: Some(vec![gv.id, newer_game.id]),
        ..Default::default()
    });
    let mut edit = approvals::submit(&db, admin.id, v.id, proposal).await.unwrap();
    assert!(edit.is_mod_version());
    edit.approve(&db, &admin).await.unwrap();

    let merged = versions::find_by_id(&db, v.id).await.unwrap().unwrap();
    assert_eq!(merged.mod_version, Version::parse("1.0.1").unwrap());
    assert_eq!(merged.supported_game_version_ids, vec![gv.id, newer_game.id]);
    // platform was not proposed
    assert_eq!(merged.platform, Platform::SteamPC);
    assert_eq!(merged.visibility, Visibility::Verified);
}

#[tokio::test]
async fn approving_a_deleted_target_fails_and_stays_pending() {
    let db = test_db().await;
    let (admin, _, _) = seed(&db).await;

    let proposal = EditProposal::Mod(ModProposal {
        name: Some("Ghost".to_string()),
        ..Default::default()
    });
    let mut edit = approvals::submit(&db, admin.id, 999, proposal).await.unwrap();

    let err = edit.approve(&db, &admin).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound("mod")));

    let stored = approvals::find_by_id(&db, edit.id).await.unwrap().unwrap();
    assert!(!stored.approved);
    assert_eq!(stored.approver_id, None);
    assert_eq!(approvals::pending(&db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn approving_a_duplicate_verified_slot_is_a_conflict() {
    let db = test_db().await;
    let (admin, gv, m) = seed(&db).await;

    let mut holder = versions::create(&db, new_version(m.id, "1.0.0", gv.id))
        .await
        .unwrap();
    holder
        .set_visibility(&db, Visibility::Verified, &admin)
        .await
        .unwrap();
    let challenger = versions::create(&db, new_version(m.id, "0.9.0", gv.id))
        .await
        .unwrap();

    let proposal = EditProposal::ModVersion(ModVersionProposal {
        mod_version: Some(Version::parse("1.0.0").unwrap()),
        ..Default::default()
    });
    let mut edit = approvals::submit(&db, admin.id, challenger.id, proposal)
        .await
        .unwrap();
    let err = edit.approve(&db, &admin).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    // the conflict aborted both the merge and the queue flip
    let untouched = versions::find_by_id(&db, challenger.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.mod_version, Version::parse("0.9.0").unwrap());
    assert_eq!(untouched.visibility, Visibility::Unverified);
    assert!(!approvals::find_by_id(&db, edit.id).await.unwrap().unwrap().approved);
}

#[tokio::test]
async fn malformed_queue_rows_are_rejected() {
    let db = test_db().await;
    seed(&db).await;

    // tag says mods, payload is version-shaped
    sqlx::query(
        "INSERT INTO edit_approval_queue (submitter_id, obj_id, obj_table_name, obj, created_at, updated_at)
         VALUES (1, 1, 'mods', '{\"modVersion\":\"1.0.0\"}', '2024-01-01 00:00:00', '2024-01-01 00:00:00')",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let err = approvals::pending(&db).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}
