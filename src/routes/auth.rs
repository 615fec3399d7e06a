use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tower_sessions::Session;

use crate::auth::{self, session};
use crate::error::{AppError, AppResult};
use crate::models::user::{Credentials, NewUser, User};
use crate::services::Store;

async fn register(
    State(store): State<Store>,
    session: Session,
    Json(payload): Json<NewUser>,
) -> AppResult<Json<User>> {
    let user = auth::register(&store, payload).await?;
    session::attach(&session, &user).await?;
    Ok(Json(user))
}

async fn login(
    State(store): State<Store>,
    session: Session,
    Json(creds): Json<Credentials>,
) -> AppResult<Json<User>> {
    let user = auth::authenticate(&store, creds).await?;
    session::attach(&session, &user).await?;
    tracing::info!(id = %user.id, "logged in");
    Ok(Json(user))
}

async fn logout(session: Session) -> AppResult<StatusCode> {
    session.flush().await?;
    Ok(StatusCode::OK)
}

async fn profile(State(store): State<Store>, session: Session) -> AppResult<Json<User>> {
    let profile = session::require_profile(&session).await?;
    // the account may have been deleted from another session
    let user = store
        .users
        .find_by_id(profile.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    Ok(Json(user))
}

async fn delete_account(State(store): State<Store>, session: Session) -> AppResult<StatusCode> {
    let profile = session::require_profile(&session).await?;
    store.delete_user(profile.id).await?;
    session.flush().await?;
    tracing::info!(id = %profile.id, "account deleted");
    Ok(StatusCode::OK)
}

pub fn router() -> Router<Store> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/profile", post(profile))
        .route("/auth/delete", post(delete_account))
        .route("/register", post(register))
        .route("/login", post(login))
}
