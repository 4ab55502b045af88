//! User directory
//!
//! CRUD over user records with a case-insensitive search. Filtering never
//! touches the loaded list; it is a view over it. Every successful write
//! reloads the list from the server.

use std::sync::Arc;
use tracing::{error, info};

use super::traits::{AuthApi, UserApi};
use crate::types::{LedgerError, NewUser, Role, User, UserId, UserUpdate};

/// Create/edit form
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserForm {
    pub email: String,
    pub fullname: String,
    /// Required on create; on edit an empty password keeps the current one
    pub password: String,
    pub role: Role,
}

/// Proof that a deletion was asked for and must be confirmed
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a deletion only happens once it is confirmed"]
pub struct PendingDeletion {
    user_id: UserId,
}

impl PendingDeletion {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

pub struct UserDirectory<G> {
    gateway: Arc<G>,
    users: Vec<User>,
    query: String,
}

impl<G> UserDirectory<G>
where
    G: UserApi + AuthApi,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            users: Vec::new(),
            query: String::new(),
        }
    }

    /// Fetch the user list
    pub async fn load(&mut self) -> Result<&[User], LedgerError> {
        self.users = self.gateway.list_users().await.map_err(|e| {
            error!("Error loading users: {e}");
            e
        })?;
        Ok(&self.users)
    }

    /// Full list as last loaded
    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    /// Users whose email or full name contains the query, ignoring case
    pub fn filtered(&self) -> Vec<&User> {
        let needle = self.query.to_lowercase();
        self.users
            .iter()
            .filter(|user| {
                needle.is_empty()
                    || user.email.to_lowercase().contains(&needle)
                    || user.fullname.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Register a new user
    pub async fn create(&mut self, form: UserForm) -> Result<User, LedgerError> {
        let email = required("email", &form.email)?;
        let fullname = required("fullname", &form.fullname)?;
        if form.password.is_empty() {
            return Err(LedgerError::missing_field("password"));
        }

        let created = self
            .gateway
            .register(&NewUser {
                email,
                fullname,
                password: form.password,
                role: form.role,
            })
            .await?;
        info!(user_id = created.id, "user created");
        self.reload().await;
        Ok(created)
    }

    /// Update a user; an empty password is left out of the request
    pub async fn update(&mut self, id: UserId, form: UserForm) -> Result<User, LedgerError> {
        let update = UserUpdate {
            email: Some(required("email", &form.email)?),
            fullname: Some(required("fullname", &form.fullname)?),
            password: Some(form.password).filter(|p| !p.is_empty()),
            role: Some(form.role),
        };
        self.apply_update(id, update).await
    }

    /// Send a partial update as is
    pub async fn apply_update(
        &mut self,
        id: UserId,
        update: UserUpdate,
    ) -> Result<User, LedgerError> {
        let updated = self.gateway.update_user(id, &update).await?;
        info!(user_id = id, "user updated");
        self.reload().await;
        Ok(updated)
    }

    /// First step of a deletion
    pub fn request_delete(&self, id: UserId) -> PendingDeletion {
        PendingDeletion { user_id: id }
    }

    /// Second step of a deletion
    pub async fn confirm_delete(&mut self, pending: PendingDeletion) -> Result<(), LedgerError> {
        self.gateway.delete_user(pending.user_id).await?;
        info!(user_id = pending.user_id, "user deleted");
        self.reload().await;
        Ok(())
    }

    async fn reload(&mut self) {
        // load() already logs the failure; the list just stays stale
        let _ = self.load().await;
    }
}

fn required(field: &str, value: &str) -> Result<String, LedgerError> {
    let value = value.trim();
    if value.is_empty() {
        Err(LedgerError::missing_field(field))
    } else {
        Ok(value.to_string())
    }
}
