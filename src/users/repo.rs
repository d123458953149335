use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};

use super::error::UserError;
use super::fields::{Balance, Email, Role};
use super::repo_types::{NewUser, Profile, User};

const USER_COLUMNS: &str =
    "id, first_name, last_name, country, phone, email, password, balance, role, created_at";

/// Access to the `users` table.
///
/// Implementations enforce the schema constraints: unique email, declared
/// column widths, two-digit balances, and ids that are assigned once,
/// strictly increase and are never reused.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, new: NewUser) -> Result<User, UserError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, UserError>;
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, UserError>;
    /// Users ordered by id, oldest first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, UserError>;
    async fn count(&self) -> Result<i64, UserError>;
    async fn update_profile(&self, id: i64, profile: Profile) -> Result<User, UserError>;
    async fn update_email(&self, id: i64, email: Email) -> Result<User, UserError>;
    async fn set_balance(&self, id: i64, balance: Balance) -> Result<User, UserError>;
    async fn set_role(&self, id: i64, role: Role) -> Result<User, UserError>;
    /// Returns whether a row was removed.
    async fn delete(&self, id: i64) -> Result<bool, UserError>;
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
    #[instrument(skip(self, new), fields(email = %new.email))]
    async fn insert(&self, new: NewUser) -> Result<User, UserError> {
        new.validate()?;
        let NewUser {
            profile,
            email,
            password_hash,
            balance,
            role,
        } = new;

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO users (first_name, last_name, country, phone, email, password",
        );
        if balance.is_some() {
            qb.push(", balance");
        }
        if role.is_some() {
            qb.push(", role");
        }
        qb.push(") VALUES (");
        {
            let mut values = qb.separated(", ");
            values.push_bind(profile.first_name);
            values.push_bind(profile.last_name);
            values.push_bind(profile.country);
            values.push_bind(profile.phone);
            values.push_bind(email.as_str().to_string());
            values.push_bind(password_hash);
            if let Some(balance) = balance {
                values.push_bind(balance);
            }
            if let Some(role) = role {
                values.push_bind(role);
            }
        }
        qb.push(") RETURNING ");
        qb.push(USER_COLUMNS);

        let user = qb
            .build_query_as::<User>()
            .fetch_one(&self.db)
            .await
            .map_err(|e| UserError::from_db(e, Some(email.as_str())))?;
        debug!(user_id = user.id, "user inserted");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, UserError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, UserError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email.as_str())
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, UserError> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             ORDER BY id ASC
             LIMIT $1 OFFSET $2
            "#
        );
        let rows = sqlx::query_as::<_, User>(&sql)
            .bind(limit.max(0))
            .bind(offset.max(0))
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn count(&self) -> Result<i64, UserError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self, profile))]
    async fn update_profile(&self, id: i64, profile: Profile) -> Result<User, UserError> {
        profile.validate()?;
        let sql = format!(
            r#"
            UPDATE users
               SET first_name = $1, last_name = $2, country = $3, phone = $4
             WHERE id = $5
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(profile.first_name)
            .bind(profile.last_name)
            .bind(profile.country)
            .bind(profile.phone)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| UserError::from_db(e, None))?
            .ok_or(UserError::NotFound(id))
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn update_email(&self, id: i64, email: Email) -> Result<User, UserError> {
        let sql = format!("UPDATE users SET email = $1 WHERE id = $2 RETURNING {USER_COLUMNS}");
        sqlx::query_as::<_, User>(&sql)
            .bind(email.as_str())
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| UserError::from_db(e, Some(email.as_str())))?
            .ok_or(UserError::NotFound(id))
    }

    #[instrument(skip(self), fields(balance = %balance))]
    async fn set_balance(&self, id: i64, balance: Balance) -> Result<User, UserError> {
        let sql = format!("UPDATE users SET balance = $1 WHERE id = $2 RETURNING {USER_COLUMNS}");
        sqlx::query_as::<_, User>(&sql)
            .bind(balance)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| UserError::from_db(e, None))?
            .ok_or(UserError::NotFound(id))
    }

    #[instrument(skip(self), fields(role = %role))]
    async fn set_role(&self, id: i64, role: Role) -> Result<User, UserError> {
        let sql = format!("UPDATE users SET role = $1 WHERE id = $2 RETURNING {USER_COLUMNS}");
        sqlx::query_as::<_, User>(&sql)
            .bind(role)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| UserError::from_db(e, None))?
            .ok_or(UserError::NotFound(id))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<bool, UserError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
