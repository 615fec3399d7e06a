use axum::{
    extract::State,
    routing::{delete, post},
    Json, Router,
};

use crate::auth;
use crate::error::AppResult;
use crate::models::user::{NewUser, User};
use crate::services::Store;

use super::users::delete_user;

async fn create_user(
    State(store): State<Store>,
    Json(payload): Json<NewUser>,
) -> AppResult<Json<User>> {
    Ok(Json(auth::register(&store, payload).await?))
}

pub fn router() -> Router<Store> {
    Router::new()
        .route("/admin", post(create_user))
        .route("/admin/:uid", delete(delete_user))
}
