/// Integration tests for granting and revoking access
///
/// These tests require a running PostgreSQL database.
/// Run with: cargo test --test sharing_tests -- --ignored

mod common;

use std::time::Duration;

use todoshare_shared::auth::authorization::resolve_access;
use todoshare_shared::error::TodoError;
use todoshare_shared::models::shared_with::{AccessLevel, SharedWith};
use todoshare_shared::models::task::Task;
use todoshare_shared::models::todo::ToDo;
use todoshare_shared::sharing::{list_grants_for, share_todo, unshare_todo};

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_share_errors_are_distinct() {
    let pool = common::setup().await;
    let owner = common::user(&pool, "owner").await;
    let friend = common::user(&pool, "friend").await;
    let todo = common::todo(&pool, &owner, "Trip").await;

    let err = share_todo(&pool, owner.id, todo.id, &owner.username, AccessLevel::Read)
        .await
        .unwrap_err();
    assert!(matches!(err, TodoError::SelfShare));

    let missing = common::unique_name("ghost");
    let err = share_todo(&pool, owner.id, todo.id, &missing, AccessLevel::Read)
        .await
        .unwrap_err();
    match err {
        TodoError::UnknownUser(name) => assert_eq!(name, missing),
        other => panic!("unexpected error: {other:?}"),
    }

    let grant = share_todo(&pool, owner.id, todo.id, &friend.username, AccessLevel::Read)
        .await
        .unwrap();
    assert_eq!(grant.user_id, friend.id);
    assert_eq!(grant.access_level, AccessLevel::Read);

    // Re-sharing is rejected even with a different level
    let err = share_todo(&pool, owner.id, todo.id, &friend.username, AccessLevel::Write)
        .await
        .unwrap_err();
    assert!(matches!(err, TodoError::AlreadyShared));

    let grants = list_grants_for(&pool, owner.id, todo.id).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].access_level, AccessLevel::Read);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_only_owner_manages_grants() {
    let pool = common::setup().await;
    let owner = common::user(&pool, "owner").await;
    let writer = common::user(&pool, "writer").await;
    let third = common::user(&pool, "third").await;
    let stranger = common::user(&pool, "stranger").await;
    let todo = common::todo(&pool, &owner, "Project").await;

    share_todo(&pool, owner.id, todo.id, &writer.username, AccessLevel::Write)
        .await
        .unwrap();

    let err = share_todo(&pool, writer.id, todo.id, &third.username, AccessLevel::Read)
        .await
        .unwrap_err();
    assert!(matches!(err, TodoError::InsufficientAccess));

    let err = unshare_todo(&pool, writer.id, todo.id, writer.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TodoError::InsufficientAccess));

    let err = share_todo(&pool, stranger.id, todo.id, &third.username, AccessLevel::Read)
        .await
        .unwrap_err();
    assert!(matches!(err, TodoError::Forbidden));

    // Grantees can see who else has access
    let grants = list_grants_for(&pool, writer.id, todo.id).await.unwrap();
    assert_eq!(grants.len(), 1);

    let err = list_grants_for(&pool, stranger.id, todo.id).await.unwrap_err();
    assert!(matches!(err, TodoError::Forbidden));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_unshare_revokes_access() {
    let pool = common::setup().await;
    let owner = common::user(&pool, "owner").await;
    let friend = common::user(&pool, "friend").await;
    let todo = common::todo(&pool, &owner, "Reading list").await;

    let err = unshare_todo(&pool, owner.id, todo.id, friend.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TodoError::NotShared));

    share_todo(&pool, owner.id, todo.id, &friend.username, AccessLevel::Write)
        .await
        .unwrap();
    unshare_todo(&pool, owner.id, todo.id, friend.id).await.unwrap();

    let err = resolve_access(&pool, friend.id, todo.id).await.unwrap_err();
    assert!(matches!(err, TodoError::Forbidden));

    let err = unshare_todo(&pool, owner.id, todo.id, friend.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TodoError::NotShared));

    // Changing a level is revoke then grant
    let grant = share_todo(&pool, owner.id, todo.id, &friend.username, AccessLevel::Read)
        .await
        .unwrap();
    assert_eq!(grant.access_level, AccessLevel::Read);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_share_missing_todo() {
    let pool = common::setup().await;
    let owner = common::user(&pool, "owner").await;
    let friend = common::user(&pool, "friend").await;

    let err = share_todo(&pool, owner.id, i64::MAX, &friend.username, AccessLevel::Read)
        .await
        .unwrap_err();
    assert!(matches!(err, TodoError::NotFound));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Requires running PostgreSQL instance
async fn test_share_waits_for_concurrent_delete() {
    let pool = common::setup().await;
    let owner = common::user(&pool, "owner").await;
    let friend = common::user(&pool, "friend").await;
    let todo = common::todo(&pool, &owner, "Vanishing").await;

    // Same steps as delete_todo, held open while the share starts
    let mut deleting = pool.begin().await.unwrap();
    ToDo::find_by_id_for_update(&mut *deleting, todo.id)
        .await
        .unwrap()
        .unwrap();

    let share = tokio::spawn({
        let pool = pool.clone();
        let username = friend.username.clone();
        let (owner_id, todo_id) = (owner.id, todo.id);
        async move { share_todo(&pool, owner_id, todo_id, &username, AccessLevel::Write).await }
    });

    tokio::time::sleep(Duration::from_millis(300)).await;

    Task::delete_by_todo(&mut *deleting, todo.id).await.unwrap();
    SharedWith::delete_by_todo(&mut *deleting, todo.id).await.unwrap();
    assert!(ToDo::delete(&mut *deleting, todo.id).await.unwrap());
    deleting.commit().await.unwrap();

    let err = share.await.unwrap().unwrap_err();
    assert!(matches!(err, TodoError::NotFound), "unexpected error: {err:?}");

    assert_eq!(common::count_rows(&pool, "shared_with", "todo_id", todo.id).await, 0);
}
