use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use futures::future::try_join_all;
use tower_sessions::Session;

use crate::auth::session;
use crate::error::{AppError, AppResult};
use crate::helpers::MaskStatus;
use crate::models::relation::{Relation, ToggleOutcome};
use crate::models::tuit::AnnotatedTuit;
use crate::models::user::User;
use crate::services::Store;

/// Tuits `uid` liked, disliked or bookmarked, annotated for the session user.
async fn tuits_of_user(
    rel: Relation,
    store: Store,
    session: Session,
    uid: String,
) -> AppResult<Json<Vec<AnnotatedTuit>>> {
    let uid = session::resolve_user(&session, &uid).await?;
    let viewer = session::viewer(&session).await?;

    let records = store.relations.find_by_user(rel, uid).await?;
    let tuits = try_join_all(records.iter().map(|r| store.tuits.find_by_id(r.tuit_id)))
        .await?
        .into_iter()
        .flatten()
        .collect();

    Ok(Json(store.annotate(viewer, tuits).await?))
}

/// Users who liked or disliked `tid`.
async fn users_of_tuit(rel: Relation, store: Store, tid: String) -> AppResult<Json<Vec<User>>> {
    let tid = session::parse_id(&tid, "tuit")?;
    let records = store.relations.find_by_tuit(rel, tid).await?;
    let users = try_join_all(records.iter().map(|r| store.users.find_by_id(r.user_id)))
        .await?
        .into_iter()
        .flatten()
        .collect();
    Ok(Json(users))
}

#[tracing::instrument(skip(store, session))]
async fn try_toggle(
    rel: Relation,
    store: &Store,
    session: &Session,
    uid: &str,
    tid: &str,
) -> AppResult<ToggleOutcome> {
    let user = session::resolve_user(session, uid).await?;
    let tuit = session::parse_id(tid, "tuit")?;
    if store.users.find_by_id(user).await?.is_none() {
        return Err(AppError::NotFound("user"));
    }
    if store.tuits.find_by_id(tuit).await?.is_none() {
        return Err(AppError::NotFound("tuit"));
    }
    let state = store.toggle(rel, user, tuit).await?;
    Ok(ToggleOutcome { state })
}

// Clients of the toggle endpoints only ever see 403 on failure.
async fn toggle(
    rel: Relation,
    store: Store,
    session: Session,
    uid: String,
    tid: String,
) -> AppResult<Json<ToggleOutcome>> {
    try_toggle(rel, &store, &session, &uid, &tid)
        .await
        .map(Json)
        .mask_status(StatusCode::FORBIDDEN)
}

pub fn router() -> Router<Store> {
    let mut router = Router::new();
    for rel in Relation::ALL {
        let segment = rel.segment();
        router = router
            .route(
                &format!("/users/:uid/{segment}"),
                get(
                    move |State(store): State<Store>, session: Session, Path(uid): Path<String>| {
                        tuits_of_user(rel, store, session, uid)
                    },
                ),
            )
            .route(
                &format!("/users/:uid/{segment}/:tid"),
                put(
                    move |State(store): State<Store>,
                          session: Session,
                          Path((uid, tid)): Path<(String, String)>| {
                        toggle(rel, store, session, uid, tid)
                    },
                ),
            );
    }
    for rel in [Relation::Like, Relation::Dislike] {
        router = router.route(
            &format!("/tuits/:tid/{}", rel.segment()),
            get(move |State(store): State<Store>, Path(tid): Path<String>| {
                users_of_tuit(rel, store, tid)
            }),
        );
    }
    router
}
