pub mod password;
pub mod session;

use crate::error::{AppError, AppResult};
use crate::models::user::{Credentials, NewUser, User, UserChanges, UpdateUser};
use crate::services::Store;

use self::password::{hash_password, verify_password};

async fn hash_blocking(plain: String) -> AppResult<String> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(anyhow::Error::from)??;
    Ok(hash)
}

/// Creates an account. Fails with `Conflict` when the username is taken.
#[tracing::instrument(skip_all, fields(username = %new.username))]
pub async fn register(store: &Store, mut new: NewUser) -> AppResult<User> {
    if store.users.find_by_username(&new.username).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "username `{}` is already taken",
            new.username
        )));
    }
    let hash = hash_blocking(std::mem::take(&mut new.password)).await?;
    let user = store.users.create(User::from_new(new, hash)).await?;
    tracing::info!(id = %user.id, "registered user");
    Ok(user)
}

#[tracing::instrument(skip_all, fields(username = %creds.username))]
pub async fn authenticate(store: &Store, creds: Credentials) -> AppResult<User> {
    let user = store
        .users
        .find_by_username(&creds.username)
        .await?
        .ok_or(AppError::BadCredentials)?;

    let hash = user.password.clone();
    let ok = tokio::task::spawn_blocking(move || verify_password(&creds.password, &hash))
        .await
        .map_err(anyhow::Error::from)?;
    if ok {
        Ok(user)
    } else {
        Err(AppError::BadCredentials)
    }
}

/// Turns an update payload into column changes, hashing a new password if one is given.
pub async fn changes_for(update: UpdateUser) -> AppResult<UserChanges> {
    let password = match update.password {
        Some(plain) => Some(hash_blocking(plain).await?),
        None => None,
    };
    Ok(UserChanges {
        username: update.username,
        password,
        first_name: update.first_name,
        last_name: update.last_name,
        email: update.email,
        biography: update.biography,
    })
}
