use async_trait::async_trait;
use time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::UserStore;
use super::repo_types::{now_micros, User, UserFields};

/// In-process store for tests and `STORE_BACKEND=memory`. Rows are kept in
/// insertion order, matching what `list` returns from postgres.
#[derive(Default)]
pub struct MemoryUserStore {
    rows: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.rows.read().await.clone())
    }

    async fn create(&self, fields: UserFields) -> anyhow::Result<User> {
        let now = now_micros();
        let user = User {
            id: Uuid::new_v4(),
            name: fields.name,
            email: fields.email,
            age: fields.age,
            password: fields.password,
            created_at: now,
            updated_at: now,
        };
        self.rows.write().await.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, fields: UserFields) -> anyhow::Result<Option<User>> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        row.name = fields.name;
        row.email = fields.email;
        row.age = fields.age;
        row.password = fields.password;
        row.updated_at = now_micros().max(row.updated_at + Duration::microseconds(1));
        Ok(Some(row.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.rows.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|u| u.id != id);
        Ok(rows.len() < before)
    }
}
