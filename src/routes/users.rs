use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tower_sessions::Session;

use crate::auth::{self, session};
use crate::error::{AppError, AppResult};
use crate::models::user::{NewUser, UpdateUser, User};
use crate::services::Store;

async fn find_all_users(State(store): State<Store>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(store.users.find_all().await?))
}

async fn create_user(
    State(store): State<Store>,
    Json(payload): Json<NewUser>,
) -> AppResult<Json<User>> {
    Ok(Json(auth::register(&store, payload).await?))
}

async fn find_user(
    State(store): State<Store>,
    session: Session,
    Path(uid): Path<String>,
) -> AppResult<Json<User>> {
    let uid = session::resolve_user(&session, &uid).await?;
    let user = store
        .users
        .find_by_id(uid)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(user))
}

async fn update_user(
    State(store): State<Store>,
    session: Session,
    Path(uid): Path<String>,
    Json(payload): Json<UpdateUser>,
) -> AppResult<Json<User>> {
    let uid = session::resolve_user(&session, &uid).await?;
    let changes = auth::changes_for(payload).await?;
    let user = store
        .users
        .update(uid, changes)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(user))
}

pub(crate) async fn delete_user(
    State(store): State<Store>,
    session: Session,
    Path(uid): Path<String>,
) -> AppResult<StatusCode> {
    let uid = session::resolve_user(&session, &uid).await?;
    if !store.delete_user(uid).await? {
        return Err(AppError::NotFound("user"));
    }
    Ok(StatusCode::OK)
}

pub fn router() -> Router<Store> {
    Router::new()
        .route("/users", get(find_all_users).post(create_user))
        .route(
            "/users/:uid",
            get(find_user).put(update_user).delete(delete_user),
        )
}
