use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::dto::UserPayload;
use super::repo::UserStore;
use super::repo_types::User;
use super::validation::validate;
use crate::error::UserError;

pub type UserResult<T> = Result<T, UserError>;

/// Entry point for every user operation. Writes always validate first.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

fn unavailable(op: &'static str) -> impl FnOnce(anyhow::Error) -> UserError {
    move |e| {
        error!(error = ?e, op, "user store failure");
        UserError::StoreUnavailable(e)
    }
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> UserResult<Vec<User>> {
        self.store.list().await.map_err(unavailable("list"))
    }

    /// The list plus a weak validator over it. The validator is computed from
    /// what the store returned, so writes from other processes change it too.
    pub async fn list_with_etag(&self) -> UserResult<(Vec<User>, String)> {
        let users = self.list().await?;
        let etag = list_etag(&users);
        Ok((users, etag))
    }

    pub async fn get(&self, id: Uuid) -> UserResult<User> {
        self.store
            .find_by_id(id)
            .await
            .map_err(unavailable("find_by_id"))?
            .ok_or(UserError::NotFound(id))
    }

    pub async fn find_by_email(&self, email: &str) -> UserResult<Option<User>> {
        self.store
            .find_by_email(email)
            .await
            .map_err(unavailable("find_by_email"))
    }

    pub async fn create(&self, payload: &UserPayload) -> UserResult<User> {
        let fields = validate(payload).map_err(|errs| {
            warn!(fields = ?errs.fields(), "create rejected");
            UserError::ValidationFailed(errs)
        })?;
        let user = self
            .store
            .create(fields)
            .await
            .map_err(unavailable("create"))?;
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn update(&self, id: Uuid, payload: &UserPayload) -> UserResult<User> {
        let fields = validate(payload).map_err(|errs| {
            warn!(%id, fields = ?errs.fields(), "update rejected");
            UserError::ValidationFailed(errs)
        })?;
        let user = self
            .store
            .update(id, fields)
            .await
            .map_err(unavailable("update"))?
            .ok_or_else(|| {
                warn!(%id, "update of unknown user");
                UserError::NotFound(id)
            })?;
        info!(user_id = %user.id, "user updated");
        Ok(user)
    }

    /// Deleting an id that does not exist succeeds and changes nothing.
    pub async fn delete(&self, id: Uuid) -> UserResult<()> {
        let removed = self
            .store
            .delete(id)
            .await
            .map_err(unavailable("delete"))?;
        if removed {
            info!(user_id = %id, "user deleted");
        } else {
            debug!(user_id = %id, "delete of unknown user ignored");
        }
        Ok(())
    }
}

/// Every create, update or delete changes some row's `(id, updated_at)` or the
/// set of ids, so the digest moves with any visible change to the list.
pub fn list_etag(users: &[User]) -> String {
    let mut hasher = Sha256::new();
    for u in users {
        hasher.update(u.id.as_bytes());
        hasher.update(u.updated_at.unix_timestamp_nanos().to_be_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("W/\"users-{}-{}\"", users.len(), &digest[..32])
}
