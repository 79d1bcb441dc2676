//! Customer account

use chrono::{DateTime, Utc};
use crate::domain::value_objects::UserId;

#[derive(Clone, Debug)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn register(username: impl Into<String>, email: impl Into<String>, password_hash: String) -> Self {
        Self {
            id: UserId::generate(),
            username: username.into(),
            email: email.into().trim().to_lowercase(),
            password_hash,
            created_at: Utc::now(),
        }
    }
}
