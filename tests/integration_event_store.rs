//! Integration tests for the event store: append, optimistic concurrency,
//! idempotent replay, and point-in-time reads.

use chrono::Utc;
use uuid::Uuid;

use user_sourcing::aggregate::{Aggregate, User};
use user_sourcing::domain::AggregateType;
use user_sourcing::event_store::EventStore;

mod common;

#[tokio::test]
async fn append_and_load_stream() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool.clone());

    let mut user = User::default();
    let user_id = Uuid::new_v4();
    let event = user
        .create_user(
            user_id,
            "alice".into(),
            "alice@example.com".into(),
            "Alice".into(),
            "A".into(),
            "hash".into(),
            "bcrypt".into(),
            "user".into(),
        )
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    event_store
        .append_to_stream(&mut tx, Uuid::new_v4(), user_id, AggregateType::User, 0, &event)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let events = event_store.get_stream(user_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].revision, 1);
}

#[tokio::test]
async fn concurrent_append_with_stale_revision_conflicts() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool.clone());

    let mut user = User::default();
    let user_id = Uuid::new_v4();
    let create_event = user
        .create_user(
            user_id,
            "bob".into(),
            "bob@example.com".into(),
            "Bob".into(),
            "B".into(),
            "hash".into(),
            "bcrypt".into(),
            "user".into(),
        )
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    event_store
        .append_to_stream(&mut tx, Uuid::new_v4(), user_id, AggregateType::User, 0, &create_event)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let update_event = user.update_user(user_sourcing::domain::UserChanges {
        first_name: Some("Bobby".into()),
        ..Default::default()
    }).unwrap();

    // Expected revision 0 is stale — the stream is already at revision 1.
    let mut tx = pool.begin().await.unwrap();
    let result = event_store
        .append_to_stream(&mut tx, Uuid::new_v4(), user_id, AggregateType::User, 0, &update_event)
        .await;
    assert!(result.is_err());
    assert!(result.unwrap_err().is_concurrency_conflict());
}

#[tokio::test]
async fn duplicate_event_id_is_idempotent() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool.clone());

    let mut user = User::default();
    let user_id = Uuid::new_v4();
    let event = user
        .create_user(
            user_id,
            "carol".into(),
            "carol@example.com".into(),
            "Carol".into(),
            "C".into(),
            "hash".into(),
            "bcrypt".into(),
            "user".into(),
        )
        .unwrap();

    let event_id = Uuid::new_v4();

    let mut tx = pool.begin().await.unwrap();
    let first = event_store
        .append_to_stream(&mut tx, event_id, user_id, AggregateType::User, 0, &event)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let second = event_store
        .append_to_stream(&mut tx, event_id, user_id, AggregateType::User, 0, &event)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.revision, second.revision);

    let events = event_store.get_stream(user_id).await.unwrap();
    assert_eq!(events.len(), 1, "duplicate append must not create a second row");
}

#[tokio::test]
async fn point_in_time_reconstruction() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool.clone());

    let mut user = User::default();
    let user_id = Uuid::new_v4();
    let create_event = user
        .create_user(
            user_id,
            "dave".into(),
            "dave@example.com".into(),
            "Dave".into(),
            "D".into(),
            "hash".into(),
            "bcrypt".into(),
            "user".into(),
        )
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    event_store
        .append_to_stream(&mut tx, Uuid::new_v4(), user_id, AggregateType::User, 0, &create_event)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let t_after_create = Utc::now();

    let update_event = user.update_user(user_sourcing::domain::UserChanges {
        first_name: Some("Davey".into()),
        ..Default::default()
    }).unwrap();

    let mut tx = pool.begin().await.unwrap();
    event_store
        .append_to_stream(&mut tx, Uuid::new_v4(), user_id, AggregateType::User, 1, &update_event)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let at_creation = event_store.get_stream_as_of(user_id, t_after_create).await.unwrap();
    assert_eq!(at_creation.len(), 1);

    let before_creation = event_store
        .get_stream_as_of(user_id, t_after_create - chrono::Duration::hours(1))
        .await
        .unwrap();
    assert!(before_creation.is_empty());
}
