use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::user::User;

pub const PROFILE: &str = "profile";

/// Path segment standing for the logged-in user, as in `/users/me/likes`.
pub const ME: &str = "me";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionProfile {
    pub id: Uuid,
    pub username: String,
}

pub async fn profile(session: &Session) -> AppResult<Option<SessionProfile>> {
    Ok(session.get::<SessionProfile>(PROFILE).await?)
}

pub async fn require_profile(session: &Session) -> AppResult<SessionProfile> {
    profile(session).await?.ok_or(AppError::Unauthenticated)
}

/// The id annotations are computed for; `None` for anonymous requests.
pub async fn viewer(session: &Session) -> AppResult<Option<Uuid>> {
    Ok(profile(session).await?.map(|p| p.id))
}

pub async fn attach(session: &Session, user: &User) -> AppResult<()> {
    session.cycle_id().await?;
    session
        .insert(
            PROFILE,
            SessionProfile {
                id: user.id,
                username: user.username.clone(),
            },
        )
        .await?;
    Ok(())
}

/// Resolves a `:uid` path segment, where `me` means the session user.
pub async fn resolve_user(session: &Session, raw: &str) -> AppResult<Uuid> {
    if raw == ME {
        return Ok(require_profile(session).await?.id);
    }
    parse_id(raw, "user")
}

pub fn parse_id(raw: &str, what: &'static str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(what))
}
