//! Object move jobs against the SQLite repository and search index

mod helpers;

use archivist_jobs::models::record::INFORMATION_OBJECT_ROOT_ID;
use archivist_jobs::models::{JobPayload, JobStatus, MoveRequest};
use archivist_jobs::repository::ResourceRepository;
use helpers::{user, TestEnv};

fn move_request(object_id: i64) -> MoveRequest {
    MoveRequest {
        object_id,
        parent_id: None,
        old_position: None,
        new_position: None,
    }
}

async fn stored_lft(env: &TestEnv, id: i64) -> i64 {
    env.repository.get_by_id(id).await.unwrap().unwrap().lft.unwrap()
}

async fn indexed_lft(env: &TestEnv, id: i64) -> i64 {
    env.search.get(id).await.unwrap().unwrap()["lft"].as_i64().unwrap()
}

#[tokio::test]
async fn test_reorder_updates_tree_and_search() {
    let env = TestEnv::new().await;
    let fonds = env.add_description(INFORMATION_OBJECT_ROOT_ID, "Fonds").await;
    let a = env.add_description(fonds, "A").await;
    let b = env.add_description(fonds, "B").await;
    let c = env.add_description(fonds, "C").await;

    let request = MoveRequest {
        old_position: Some(2),
        new_position: Some(0),
        ..move_request(c)
    };
    let job = env.run_job(JobPayload::ObjectMove(request), user("alice")).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        job.log_messages(),
        vec![
            format!("Moving object (id: {})", c),
            "Moving object between siblings".to_string(),
            format!("Moving object before sibling (id: {})", a),
            format!("Reindexing object id: {}", a),
            format!("Reindexing object id: {}", b),
            format!("Reindexing object id: {}", c),
            "Move completed.".to_string(),
        ]
    );

    assert_eq!(env.repository.ordered_sibling_ids(fonds).await.unwrap(), vec![c, a, b]);
    for id in [a, b, c] {
        assert_eq!(indexed_lft(&env, id).await, stored_lft(&env, id).await);
    }
}

#[tokio::test]
async fn test_reparent_then_reorder() {
    let env = TestEnv::new().await;
    let first = env.add_description(INFORMATION_OBJECT_ROOT_ID, "First").await;
    let second = env.add_description(INFORMATION_OBJECT_ROOT_ID, "Second").await;
    let x = env.add_description(second, "X").await;
    let file = env.add_description(first, "File").await;

    // File becomes the last child of Second, then moves to the front
    let request = MoveRequest {
        parent_id: Some(second),
        old_position: Some(1),
        new_position: Some(0),
        ..move_request(file)
    };
    let job = env.run_job(JobPayload::ObjectMove(request), user("alice")).await;

    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.log_messages());
    assert!(job
        .log_messages()
        .contains(&format!("Moving object to parent (id: {})", second)));
    assert_eq!(env.repository.ordered_sibling_ids(second).await.unwrap(), vec![file, x]);
    assert!(env.repository.ordered_sibling_ids(first).await.unwrap().is_empty());
    assert_eq!(indexed_lft(&env, x).await, stored_lft(&env, x).await);
}

#[tokio::test]
async fn test_unknown_object_fails() {
    let env = TestEnv::new().await;

    let job = env
        .run_job(JobPayload::ObjectMove(move_request(9_999)), user("alice"))
        .await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.log_messages(),
        vec!["Moving object (id: 9999)", "Invalid object id"]
    );
}

#[tokio::test]
async fn test_stale_position_is_rejected() {
    let env = TestEnv::new().await;
    let fonds = env.add_description(INFORMATION_OBJECT_ROOT_ID, "Fonds").await;
    let a = env.add_description(fonds, "A").await;
    let b = env.add_description(fonds, "B").await;

    let request = MoveRequest {
        old_position: Some(0),
        new_position: Some(1),
        ..move_request(b)
    };
    let job = env.run_job(JobPayload::ObjectMove(request), user("alice")).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.log_messages().last().map(String::as_str),
        Some("Mismatch in current position")
    );
    assert_eq!(env.repository.ordered_sibling_ids(fonds).await.unwrap(), vec![a, b]);
}

#[tokio::test]
async fn test_parent_only_move_completes_without_reindex() {
    let env = TestEnv::new().await;
    let first = env.add_description(INFORMATION_OBJECT_ROOT_ID, "First").await;
    let second = env.add_description(INFORMATION_OBJECT_ROOT_ID, "Second").await;
    let file = env.add_description(first, "File").await;

    let request = MoveRequest {
        parent_id: Some(second),
        ..move_request(file)
    };
    let job = env.run_job(JobPayload::ObjectMove(request), user("alice")).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert!(!job.log_messages().iter().any(|m| m.starts_with("Reindexing")));
    assert_eq!(
        env.repository.get_by_id(file).await.unwrap().unwrap().parent_id,
        Some(second)
    );
}
