use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{now_micros, User, UserFields};

/// Persistence contract for the `users` table.
///
/// Implementations perform no validation; `UserService` is the only caller
/// and validates every payload first.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// All users, oldest first.
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    async fn create(&self, fields: UserFields) -> anyhow::Result<User>;
    /// Replaces every mutable column. `None` when `id` does not exist.
    async fn update(&self, id: Uuid, fields: UserFields) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Earliest created match, since emails are not unique.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, age, password, created_at, updated_at
              FROM users
             ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(rows)
    }

    async fn create(&self, fields: UserFields) -> anyhow::Result<User> {
        let now = now_micros();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, age, password, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id, name, email, age, password, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(fields.age)
        .bind(&fields.password)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, fields: UserFields) -> anyhow::Result<Option<User>> {
        // updated_at must move forward even if the clock has not
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = $2,
                   email = $3,
                   age = $4,
                   password = $5,
                   updated_at = GREATEST($6::timestamptz, updated_at + interval '1 microsecond')
             WHERE id = $1
            RETURNING id, name, email, age, password, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(fields.age)
        .bind(&fields.password)
        .bind(now_micros())
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("update user {id}"))?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, age, password, created_at, updated_at
              FROM users
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("get user {id}"))?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, age, password, created_at, updated_at
              FROM users
             WHERE email = $1
             ORDER BY created_at ASC, id ASC
             LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .with_context(|| format!("delete user {id}"))?;
        Ok(res.rows_affected() > 0)
    }
}
