use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::UserError;
use super::fields::{Balance, Email, Role};
use super::repo::UserStore;
use super::repo_types::{NewUser, Profile, User};

#[derive(Default)]
struct Inner {
    last_id: i64,
    rows: BTreeMap<i64, User>,
    // Mirrors the unique index on users.email.
    by_email: HashMap<String, i64>,
}

impl Inner {
    fn email_owner(&self, email: &Email) -> Option<i64> {
        self.by_email.get(email.as_str()).copied()
    }

    fn row_mut(&mut self, id: i64) -> Result<&mut User, UserError> {
        self.rows.get_mut(&id).ok_or(UserError::NotFound(id))
    }
}

/// In-process `UserStore` with the same constraints as the Postgres table.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<Inner>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, new: NewUser) -> Result<User, UserError> {
        new.validate()?;
        let mut inner = self.inner.lock().await;
        if inner.email_owner(&new.email).is_some() {
            return Err(UserError::EmailTaken(new.email.to_string()));
        }

        inner.last_id += 1;
        let user = User {
            id: inner.last_id,
            first_name: new.profile.first_name,
            last_name: new.profile.last_name,
            country: new.profile.country,
            phone: new.profile.phone,
            email: new.email.into(),
            password_hash: new.password_hash,
            balance: new.balance.unwrap_or_default(),
            role: new.role.unwrap_or_default(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.by_email.insert(user.email.clone(), user.id);
        inner.rows.insert(user.id, user.clone());
        debug!(user_id = user.id, "user inserted");
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, UserError> {
        Ok(self.inner.lock().await.rows.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, UserError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .email_owner(email)
            .and_then(|id| inner.rows.get(&id).cloned()))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, UserError> {
        let inner = self.inner.lock().await;
        let skip = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(inner.rows.values().skip(skip).take(take).cloned().collect())
    }

    async fn count(&self) -> Result<i64, UserError> {
        let inner = self.inner.lock().await;
        Ok(inner.rows.len() as i64)
    }

    async fn update_profile(&self, id: i64, profile: Profile) -> Result<User, UserError> {
        profile.validate()?;
        let mut inner = self.inner.lock().await;
        let row = inner.row_mut(id)?;
        row.first_name = profile.first_name;
        row.last_name = profile.last_name;
        row.country = profile.country;
        row.phone = profile.phone;
        Ok(row.clone())
    }

    async fn update_email(&self, id: i64, email: Email) -> Result<User, UserError> {
        let mut inner = self.inner.lock().await;
        match inner.email_owner(&email) {
            Some(owner) if owner != id => return Err(UserError::EmailTaken(email.to_string())),
            _ => {}
        }
        let row = inner.row_mut(id)?;
        let previous = std::mem::replace(&mut row.email, email.into());
        let user = row.clone();
        inner.by_email.remove(&previous);
        inner.by_email.insert(user.email.clone(), id);
        Ok(user)
    }

    async fn set_balance(&self, id: i64, balance: Balance) -> Result<User, UserError> {
        let mut inner = self.inner.lock().await;
        let row = inner.row_mut(id)?;
        row.balance = balance;
        Ok(row.clone())
    }

    async fn set_role(&self, id: i64, role: Role) -> Result<User, UserError> {
        let mut inner = self.inner.lock().await;
        let row = inner.row_mut(id)?;
        row.role = role;
        Ok(row.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool, UserError> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.rows.remove(&id) else {
            return Ok(false);
        };
        inner.by_email.remove(&user.email);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn new_user(email: &str) -> NewUser {
        NewUser::new(Email::parse(email).unwrap(), "$argon2id$v=19$placeholder".into())
    }

    #[tokio::test]
    async fn insert_applies_column_defaults() {
        let store = MemoryUserStore::new();
        let before = OffsetDateTime::now_utc();
        let user = store.insert(new_user("defaults@example.com")).await.unwrap();

        assert_eq!(user.balance.to_string(), "0.00");
        assert_eq!(user.role.as_str(), "user");
        assert!(user.created_at >= before);
        assert!((OffsetDateTime::now_utc() - user.created_at).whole_seconds() < 5);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryUserStore::new();
        store.insert(new_user("dup@example.com")).await.unwrap();
        let err = store.insert(new_user(" Dup@Example.com")).await.unwrap_err();
        assert!(matches!(err, UserError::EmailTaken(e) if e == "dup@example.com"));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ids_increase_and_are_not_reused() {
        let store = MemoryUserStore::new();
        let a = store.insert(new_user("a@example.com")).await.unwrap();
        let b = store.insert(new_user("b@example.com")).await.unwrap();
        assert!(b.id > a.id);

        assert!(store.delete(b.id).await.unwrap());
        let c = store.insert(new_user("c@example.com")).await.unwrap();
        assert!(c.id > b.id);
        assert!(store.find_by_id(b.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_insert_does_not_consume_an_id() {
        let store = MemoryUserStore::new();
        let a = store.insert(new_user("a@example.com")).await.unwrap();
        assert!(store.insert(new_user("a@example.com")).await.is_err());
        let b = store.insert(new_user("b@example.com")).await.unwrap();
        assert_eq!(b.id, a.id + 1);
    }

    #[tokio::test]
    async fn overlong_profile_fields_are_rejected() {
        let store = MemoryUserStore::new();
        let mut new = new_user("long@example.com");
        new.profile.country = Some("x".repeat(51));
        let err = store.insert(new).await.unwrap_err();
        assert!(matches!(err, UserError::FieldTooLong { field: "country", max: 50 }));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn email_change_respects_uniqueness() {
        let store = MemoryUserStore::new();
        let a = store.insert(new_user("a@example.com")).await.unwrap();
        store.insert(new_user("b@example.com")).await.unwrap();

        let err = store
            .update_email(a.id, Email::parse("b@example.com").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::EmailTaken(_)));

        // Re-saving the same address is not a collision.
        let same = store
            .update_email(a.id, Email::parse("A@example.com").unwrap())
            .await
            .unwrap();
        assert_eq!(same.email, "a@example.com");

        let moved = store
            .update_email(a.id, Email::parse("new@example.com").unwrap())
            .await
            .unwrap();
        assert_eq!(moved.id, a.id);
        assert!(store
            .find_by_email(&Email::parse("a@example.com").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn freed_emails_can_be_taken_again() {
        let store = MemoryUserStore::new();
        let a = store.insert(new_user("first@example.com")).await.unwrap();
        store
            .update_email(a.id, Email::parse("second@example.com").unwrap())
            .await
            .unwrap();

        // The old address is free once moved away from.
        let b = store.insert(new_user("first@example.com")).await.unwrap();
        assert!(store.insert(new_user("second@example.com")).await.is_err());

        assert!(store.delete(a.id).await.unwrap());
        let c = store.insert(new_user("second@example.com")).await.unwrap();
        assert!(c.id > b.id);

        let found = store
            .find_by_email(&Email::parse("second@example.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, c.id);
    }

    #[tokio::test]
    async fn mutations_keep_id_and_report_missing_rows() {
        let store = MemoryUserStore::new();
        let user = store.insert(new_user("m@example.com")).await.unwrap();

        let profile = Profile {
            first_name: Some("Grace".into()),
            phone: Some("+1 555 0100".into()),
            ..Profile::default()
        };
        let updated = store.update_profile(user.id, profile.clone()).await.unwrap();
        assert_eq!(updated.id, user.id);
        assert_eq!(updated.first_name.as_deref(), Some("Grace"));
        assert_eq!(updated.created_at, user.created_at);

        let rich = store
            .set_balance(user.id, Balance::new(Decimal::from(10)).unwrap())
            .await
            .unwrap();
        assert_eq!(rich.balance.to_string(), "10.00");

        let admin = store.set_role(user.id, Role::new("admin").unwrap()).await.unwrap();
        assert_eq!(admin.role.as_str(), "admin");

        assert!(matches!(
            store.update_profile(99, profile).await,
            Err(UserError::NotFound(99))
        ));
        assert!(matches!(
            store.set_balance(99, Balance::ZERO).await,
            Err(UserError::NotFound(99))
        ));
        assert!(!store.delete(99).await.unwrap());
    }

    #[tokio::test]
    async fn list_is_ordered_by_id_and_paged() {
        let store = MemoryUserStore::new();
        for i in 0..5 {
            store
                .insert(new_user(&format!("u{i}@example.com")))
                .await
                .unwrap();
        }
        let page = store.list(2, 1).await.unwrap();
        let ids: Vec<i64> = page.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![2, 3]);

        assert_eq!(store.list(10, 0).await.unwrap().len(), 5);
        assert!(store.list(-1, 0).await.unwrap().is_empty());
        assert_eq!(store.list(10, -4).await.unwrap().len(), 5);
    }
}
