use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::AppError;

/// Lookup seam to the external user/profile service. The messaging core
/// never owns user records; it only needs existence checks and display
/// names for populated message events.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: Uuid) -> Result<bool, AppError>;
    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, AppError>;
}

pub struct PgUserDirectory {
    db: Pool<Postgres>,
}

impl PgUserDirectory {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn exists(&self, user_id: Uuid) -> Result<bool, AppError> {
        let row: Option<i32> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, AppError> {
        let name: Option<String> = sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(name)
    }
}

/// In-process directory backing the memory store. `new` only knows users
/// registered via `insert` (tests); `permissive` accepts any id, for dev
/// runs without a database.
#[derive(Default)]
pub struct MemoryUserDirectory {
    inner: Mutex<HashMap<Uuid, String>>,
    permissive: bool,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permissive() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            permissive: true,
        }
    }

    pub fn insert(&self, user_id: Uuid, username: impl Into<String>) {
        self.lock().insert(user_id, username.into());
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn exists(&self, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self.permissive || self.lock().contains_key(&user_id))
    }

    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, AppError> {
        Ok(self.lock().get(&user_id).cloned())
    }
}
