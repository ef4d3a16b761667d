//! User accounts for the login stub.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, UserId, validate};

use crate::{AuthError, Role, hash_password, verify_password};

/// Registration request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate::email("email", &self.email)?;
        if self.password.chars().count() < 8 {
            return Err(DomainError::validation(
                "password must have at least 8 characters",
            ));
        }
        validate::min_len("name", &self.name, 2)?;
        Ok(())
    }
}

/// A registered account. The password is only kept as an argon2 PHC string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// Lookup key for an e-mail address.
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    pub fn register(new: &NewUser, role: Role, now: DateTime<Utc>) -> Result<Self, AuthError> {
        Ok(Self {
            id: UserId::new(),
            email: Self::normalize_email(&new.email),
            name: new.name.trim().to_string(),
            role,
            password_hash: hash_password(&new.password)?,
            created_at: now,
        })
    }

    pub fn check_password(&self, password: &str) -> Result<(), AuthError> {
        if verify_password(password, &self.password_hash)? {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}
