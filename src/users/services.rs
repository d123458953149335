use tracing::{info, instrument, warn};

use super::dto::SignupRequest;
use super::error::UserError;
use super::fields::Email;
use super::password::{hash_password, verify_password};
use super::repo_types::{NewUser, Profile, User};
use crate::state::AppState;

/// Creates an account with the default balance and role. The password is
/// stored only as an Argon2 hash.
#[instrument(skip(st, req))]
pub async fn register(st: &AppState, req: SignupRequest) -> Result<User, UserError> {
    let email = Email::parse(&req.email)?;
    let profile = Profile {
        first_name: req.first_name,
        last_name: req.last_name,
        country: req.country,
        phone: req.phone,
    };
    // Width errors surface before paying for the hash.
    profile.validate()?;

    let hash = hash_password(&req.password)?;
    let mut new = NewUser::new(email, hash);
    new.profile = profile;

    let user = st.users.insert(new).await.map_err(|e| {
        if let UserError::EmailTaken(email) = &e {
            warn!(%email, "email already registered");
        }
        e
    })?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Returns the user when `password` matches the stored hash for `email`.
#[instrument(skip(st, password))]
pub async fn authenticate(
    st: &AppState,
    email: &str,
    password: &str,
) -> Result<Option<User>, UserError> {
    let Ok(email) = Email::parse(email) else {
        return Ok(None);
    };

    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Ok(None);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(%email, user_id = user.id, "login invalid password");
        return Ok(None);
    }

    Ok(Some(user))
}
