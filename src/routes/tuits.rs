use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tower_sessions::Session;

use crate::auth::session;
use crate::error::{AppError, AppResult};
use crate::models::tuit::{AnnotatedTuit, CreateTuit, Tuit};
use crate::services::Store;

async fn find_all_tuits(
    State(store): State<Store>,
    session: Session,
) -> AppResult<Json<Vec<AnnotatedTuit>>> {
    let viewer = session::viewer(&session).await?;
    let tuits = store.tuits.find_all().await?;
    Ok(Json(store.annotate(viewer, tuits).await?))
}

async fn find_tuit(
    State(store): State<Store>,
    session: Session,
    Path(tid): Path<String>,
) -> AppResult<Json<AnnotatedTuit>> {
    let tid = session::parse_id(&tid, "tuit")?;
    let viewer = session::viewer(&session).await?;
    let tuit = store
        .tuits
        .find_by_id(tid)
        .await?
        .ok_or(AppError::NotFound("tuit"))?;
    let annotated = store
        .annotate(viewer, vec![tuit])
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound("tuit"))?;
    Ok(Json(annotated))
}

async fn update_tuit(
    State(store): State<Store>,
    Path(tid): Path<String>,
    Json(payload): Json<CreateTuit>,
) -> AppResult<Json<Tuit>> {
    let tid = session::parse_id(&tid, "tuit")?;
    let tuit = store
        .tuits
        .update_text(tid, payload.tuit)
        .await?
        .ok_or(AppError::NotFound("tuit"))?;
    Ok(Json(tuit))
}

async fn delete_tuit(State(store): State<Store>, Path(tid): Path<String>) -> AppResult<StatusCode> {
    let tid = session::parse_id(&tid, "tuit")?;
    if !store.delete_tuit(tid).await? {
        return Err(AppError::NotFound("tuit"));
    }
    Ok(StatusCode::OK)
}

async fn find_tuits_by_user(
    State(store): State<Store>,
    session: Session,
    Path(uid): Path<String>,
) -> AppResult<Json<Vec<AnnotatedTuit>>> {
    let author = session::resolve_user(&session, &uid).await?;
    let viewer = session::viewer(&session).await?;
    let tuits = store.tuits.find_by_author(author).await?;
    Ok(Json(store.annotate(viewer, tuits).await?))
}

async fn create_tuit(
    State(store): State<Store>,
    session: Session,
    Path(uid): Path<String>,
    Json(payload): Json<CreateTuit>,
) -> AppResult<Json<Tuit>> {
    let author = session::resolve_user(&session, &uid).await?;
    if store.users.find_by_id(author).await?.is_none() {
        return Err(AppError::NotFound("user"));
    }
    let tuit = store.tuits.create(Tuit::new(author, payload.tuit)).await?;
    Ok(Json(tuit))
}

pub fn router() -> Router<Store> {
    Router::new()
        .route("/tuits", get(find_all_tuits))
        .route(
            "/tuits/:tid",
            get(find_tuit).put(update_tuit).delete(delete_tuit),
        )
        .route(
            "/users/:uid/tuits",
            get(find_tuits_by_user).post(create_tuit),
        )
}
