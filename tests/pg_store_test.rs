//! Live-database checks. Run against a disposable postgres with
//! `DATABASE_URL=... cargo test -- --ignored`.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use dm_service::db::init_pool;
use dm_service::error::AppError;
use dm_service::store::postgres::PgStore;
use dm_service::store::{ConversationStore, MessageStore};

async fn live_store() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    let pool = init_pool(&url).await.expect("connect and migrate");
    PgStore::new(pool)
}

async fn seed_user(store: &PgStore, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, username) VALUES ($1, $2)")
        .bind(id)
        .bind(name)
        .execute(store.pool())
        .await
        .expect("seed user");
    id
}

#[tokio::test]
#[ignore]
async fn concurrent_creates_with_reversed_pairs_share_one_conversation() {
    let store = Arc::new(live_store().await);
    let a = seed_user(&store, "pg-alice").await;
    let b = seed_user(&store, "pg-bob").await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        let (x, y) = if i % 2 == 0 { (a, b) } else { (b, a) };
        handles.push(tokio::spawn(
            async move { store.get_or_create(x, y).await },
        ));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "every racer must land on the same row");
}

#[tokio::test]
#[ignore]
async fn append_history_and_unread_roundtrip() {
    let store = live_store().await;
    let a = seed_user(&store, "pg-carol").await;
    let b = seed_user(&store, "pg-dave").await;

    let conversation = store.get_or_create(a, b).await.unwrap();
    for content in ["one", "two", "three"] {
        store
            .append(conversation.id, a, b, content, Utc::now())
            .await
            .unwrap();
    }

    let counts = store.unread_counts(b).await.unwrap();
    assert_eq!(counts.get(&a), Some(&3));

    let history = store.history(conversation.id).await.unwrap();
    assert_eq!(
        history.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
        vec!["one", "two", "three"]
    );
    let seqs: Vec<i64> = history.iter().map(|m| m.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);

    store.mark_read(conversation.id, b).await.unwrap();
    assert!(store.unread_counts(b).await.unwrap().is_empty());
    let history = store.history(conversation.id).await.unwrap();
    assert!(history.iter().all(|m| m.read));
}

#[tokio::test]
#[ignore]
async fn mark_read_on_unknown_conversation_is_not_found() {
    let store = live_store().await;
    let result = store.mark_read(Uuid::new_v4(), Uuid::new_v4()).await;
    assert!(matches!(result, Err(AppError::NotFound)));
}
