use bbm_api::models::{SupportedGames, UserRole, UserRolesObject};
use bbm_api::store::{Database, RESERVED_ADMIN_NAME};
use bbm_api::users;

async fn test_db() -> Database {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.migrate().await.unwrap();
    db
}

#[tokio::test]
async fn bootstrap_creates_server_account() {
    let db = test_db().await;
    db.bootstrap().await.unwrap();

    let admin = users::find_by_id(&db, 1).await.unwrap().unwrap();
    assert_eq!(admin.username, RESERVED_ADMIN_NAME);
    assert!(admin.has_sitewide_role(UserRole::Admin));

    // idempotent
    db.bootstrap().await.unwrap();
    let again = users::find_by_username(&db, RESERVED_ADMIN_NAME)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.id, 1);
    assert_eq!(again.roles, admin.roles);
}

#[tokio::test]
async fn bootstrap_restores_admin_while_name_is_reserved() {
    let db = test_db().await;
    db.bootstrap().await.unwrap();

    let mut admin = users::find_by_id(&db, 1).await.unwrap().unwrap();
    admin.roles.sitewide.clear();
    users::update_roles(&db, 1, &admin.roles).await.unwrap();

    db.bootstrap().await.unwrap();
    let healed = users::find_by_id(&db, 1).await.unwrap().unwrap();
    assert!(healed.has_sitewide_role(UserRole::Admin));
}

#[tokio::test]
async fn bootstrap_does_not_heal_tampered_account() {
    let db = test_db().await;
    db.bootstrap().await.unwrap();

    sqlx::query(r#"UPDATE users SET username = 'NotTheAdmin', roles = '{"sitewide":[],"perGame":{}}' WHERE id = 1"#)
        .execute(db.pool())
        .await
        .unwrap();

    db.bootstrap().await.unwrap();
    let tampered = users::find_by_id(&db, 1).await.unwrap().unwrap();
    assert_eq!(tampered.username, "NotTheAdmin");
    assert!(!tampered.has_sitewide_role(UserRole::Admin));
}

#[tokio::test]
async fn integrity_check_reports_ok() {
    let db = test_db().await;
    db.integrity_check().await.unwrap();
}

#[tokio::test]
async fn integrity_task_keeps_running_between_checks() {
    let db = test_db().await;

    let task = db.spawn_integrity_task(std::time::Duration::from_millis(20));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(!task.is_finished());
    task.abort();

    // the store stays usable alongside the periodic check
    db.integrity_check().await.unwrap();
}

#[tokio::test]
async fn game_scoped_roles() {
    let db = test_db().await;
    db.bootstrap().await.unwrap();

    let mut user = users::create(
        &db,
        users::NewUser {
            username: "approver-person".to_string(),
            github_id: Some("12345".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(!user.has_game_role(SupportedGames::BeatSaber, UserRole::Approver));

    user.roles
        .per_game
        .insert(SupportedGames::BeatSaber, vec![UserRole::Approver]);
    users::update_roles(&db, user.id, &user.roles).await.unwrap();

    let reloaded = users::find_by_id(&db, user.id).await.unwrap().unwrap();
    assert!(reloaded.has_game_role(SupportedGames::BeatSaber, UserRole::Approver));
    assert!(!reloaded.has_sitewide_role(UserRole::Approver));

    // sitewide roles count for every game
    let admin = users::find_by_id(&db, 1).await.unwrap().unwrap();
    assert!(admin.has_game_role(SupportedGames::BeatSaber, UserRole::Admin));

    let fresh_roles = UserRolesObject::default();
    assert!(fresh_roles.sitewide.is_empty());
}
