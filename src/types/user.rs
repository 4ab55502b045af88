//! User, role and session types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::card::Card;
use super::error::LedgerError;

/// User identifier
pub type UserId = u64;

/// Access level of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    #[serde(other)]
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::User => f.write_str("user"),
        }
    }
}

impl FromStr for Role {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(LedgerError::Config {
                message: format!("unknown role '{other}'"),
            }),
        }
    }
}

/// User record as returned by the API
///
/// The password is write-only and never part of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    /// Name shown next to the user's activity: full name, else email
    pub fn display_name(&self) -> &str {
        if self.fullname.trim().is_empty() {
            &self.email
        } else {
            &self.fullname
        }
    }
}

/// Entry of `GET /users/with-balance`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserWithCards {
    #[serde(flatten)]
    pub user: User,
    #[serde(rename = "Cards", alias = "cards", default)]
    pub cards: Vec<Card>,
}

/// Body of `POST /auth/register`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUser {
    pub email: String,
    pub fullname: String,
    pub password: String,
    pub role: Role,
}

/// Body of `PUT /users/:id`
///
/// Absent fields are left out of the JSON so the server keeps them as they
/// are. In particular a missing password leaves the stored one unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Response of `POST /auth/login`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Authenticated identity
///
/// Owned by the session store; everything else only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "id", alias = "userId")]
    pub user_id: UserId,
    #[serde(default)]
    pub fullname: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn display_name(&self) -> &str {
        if self.fullname.trim().is_empty() {
            &self.email
        } else {
            &self.fullname
        }
    }
}

impl From<User> for Session {
    fn from(user: User) -> Self {
        Session {
            user_id: user.id,
            fullname: user.fullname,
            email: user.email,
            role: user.role,
        }
    }
}
