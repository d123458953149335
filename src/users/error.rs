use thiserror::Error;

/// Errors raised by the users data-access layer.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("email {0} is already registered")]
    EmailTaken(String),

    #[error("{field} is longer than {max} characters")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("value rejected by column width: {0}")]
    ColumnWidth(String),

    #[error("{0} must not be empty")]
    MissingField(&'static str),

    #[error("balance {0} has more than 2 fractional digits")]
    BalancePrecision(String),

    #[error("balance {0} does not fit NUMERIC(10,2)")]
    BalanceOutOfRange(String),

    #[error("user {0} not found")]
    NotFound(i64),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// SQLSTATE codes the schema can raise besides unique violations.
const STRING_DATA_RIGHT_TRUNCATION: &str = "22001";
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

impl UserError {
    /// Maps constraint failures reported by Postgres onto the matching
    /// variant. `email` is used for the `EmailTaken` message.
    pub(crate) fn from_db(err: sqlx::Error, email: Option<&str>) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return UserError::EmailTaken(email.unwrap_or_default().to_string());
            }
            match db_err.code().as_deref() {
                Some(STRING_DATA_RIGHT_TRUNCATION) => {
                    return UserError::ColumnWidth(db_err.message().to_string());
                }
                Some(NUMERIC_VALUE_OUT_OF_RANGE) => {
                    return UserError::BalanceOutOfRange(db_err.message().to_string());
                }
                _ => {}
            }
        }
        UserError::Database(err)
    }
}
