use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use super::error::UserError;
use super::fields::{
    check_width, Balance, Email, Role, COUNTRY_MAX, FIRST_NAME_MAX, LAST_NAME_MAX, PASSWORD_MAX,
    PHONE_MAX,
};

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: String,
    #[serde(skip_serializing, default)]
    #[sqlx(rename = "password")]
    pub password_hash: String, // Argon2 PHC string, not exposed in JSON
    pub balance: Balance,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Editable profile columns. `None` stores NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

impl Profile {
    pub fn validate(&self) -> Result<(), UserError> {
        let columns = [
            ("first_name", &self.first_name, FIRST_NAME_MAX),
            ("last_name", &self.last_name, LAST_NAME_MAX),
            ("country", &self.country, COUNTRY_MAX),
            ("phone", &self.phone, PHONE_MAX),
        ];
        for (field, value, max) in columns {
            if let Some(value) = value {
                check_width(field, value, max)?;
            }
        }
        Ok(())
    }
}

/// Row to insert. `balance` and `role` fall back to the column defaults
/// when left as `None`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub profile: Profile,
    pub email: Email,
    pub password_hash: String,
    pub balance: Option<Balance>,
    pub role: Option<Role>,
}

impl NewUser {
    pub fn new(email: Email, password_hash: String) -> Self {
        Self {
            profile: Profile::default(),
            email,
            password_hash,
            balance: None,
            role: None,
        }
    }

    pub fn validate(&self) -> Result<(), UserError> {
        self.profile.validate()?;
        if self.password_hash.is_empty() {
            return Err(UserError::MissingField("password"));
        }
        check_width("password", &self.password_hash, PASSWORD_MAX)
    }
}
