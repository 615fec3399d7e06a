use axum::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::models::tuit::{Stats, Tuit};
use crate::schema;

use super::{Pool, StoreError, StoreResult, Svc};

#[async_trait]
pub trait TuitService: Svc {
    /// Newest first.
    async fn find_all(&self) -> StoreResult<Vec<Tuit>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Tuit>>;
    /// Newest first.
    async fn find_by_author(&self, author: Uuid) -> StoreResult<Vec<Tuit>>;
    async fn create(&self, tuit: Tuit) -> StoreResult<Tuit>;
    async fn update_text(&self, id: Uuid, text: String) -> StoreResult<Option<Tuit>>;
    async fn update_stats(&self, id: Uuid, stats: Stats) -> StoreResult<Option<Tuit>>;
    /// Sets the like and dislike counters from the current join records.
    ///
    /// Concurrent recounts of one tuit are serialized, so the last one to finish
    /// sees every relation change committed before it started.
    async fn recount(&self, id: Uuid) -> StoreResult<Option<Tuit>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
    async fn delete_by_author(&self, author: Uuid) -> StoreResult<u64>;
}

#[derive(Clone)]
pub struct TuitServiceDb {
    db: Pool,
}

impl Svc for TuitServiceDb {}

impl TuitServiceDb {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TuitService for TuitServiceDb {
    async fn find_all(&self) -> StoreResult<Vec<Tuit>> {
        use schema::tuits::dsl::*;

        let mut conn = self.db.get().await?;
        let ts = tuits
            .order((posted_on.desc(), id.desc()))
            .select(Tuit::as_select())
            .load(&mut conn)
            .await?;
        Ok(ts)
    }

    async fn find_by_id(&self, tid: Uuid) -> StoreResult<Option<Tuit>> {
        use schema::tuits::dsl::*;

        let mut conn = self.db.get().await?;
        let t = tuits
            .find(tid)
            .select(Tuit::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(t)
    }

    async fn find_by_author(&self, author: Uuid) -> StoreResult<Vec<Tuit>> {
        use schema::tuits::dsl::*;

        let mut conn = self.db.get().await?;
        let ts = tuits
            .filter(posted_by.eq(author))
            .order((posted_on.desc(), id.desc()))
            .select(Tuit::as_select())
            .load(&mut conn)
            .await?;
        Ok(ts)
    }

    #[tracing::instrument(skip_all, fields(author = ?t.posted_by))]
    async fn create(&self, t: Tuit) -> StoreResult<Tuit> {
        use schema::tuits::dsl::*;

        let mut conn = self.db.get().await?;
        let created = diesel::insert_into(tuits)
            .values(&t)
            .returning(Tuit::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(created)
    }

    #[tracing::instrument(skip(self, text))]
    async fn update_text(&self, tid: Uuid, text: String) -> StoreResult<Option<Tuit>> {
        use schema::tuits::dsl::*;

        let mut conn = self.db.get().await?;
        let t = diesel::update(tuits.find(tid))
            .set(tuit.eq(text))
            .returning(Tuit::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(t)
    }

    async fn update_stats(&self, tid: Uuid, stats: Stats) -> StoreResult<Option<Tuit>> {
        use schema::tuits::dsl::*;

        let mut conn = self.db.get().await?;
        let t = diesel::update(tuits.find(tid))
            .set((
                reply_count.eq(stats.replies),
                retuit_count.eq(stats.retuits),
                like_count.eq(stats.likes),
                dislike_count.eq(stats.dislikes),
            ))
            .returning(Tuit::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(t)
    }

    #[tracing::instrument(skip(self))]
    async fn recount(&self, tid: Uuid) -> StoreResult<Option<Tuit>> {
        use schema::{dislikes, likes, tuits};

        let mut conn = self.db.get().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                // row lock first, the counts below then see every committed toggle
                let locked = tuits::table
                    .find(tid)
                    .select(tuits::id)
                    .for_update()
                    .first::<Uuid>(conn)
                    .await
                    .optional()?;
                if locked.is_none() {
                    return Ok(None);
                }

                let liked: i64 = likes::table
                    .filter(likes::tuit_id.eq(tid))
                    .count()
                    .get_result(conn)
                    .await?;
                let disliked: i64 = dislikes::table
                    .filter(dislikes::tuit_id.eq(tid))
                    .count()
                    .get_result(conn)
                    .await?;

                let t = diesel::update(tuits::table.find(tid))
                    .set((
                        tuits::like_count.eq(i32::try_from(liked).unwrap_or(i32::MAX)),
                        tuits::dislike_count.eq(i32::try_from(disliked).unwrap_or(i32::MAX)),
                    ))
                    .returning(Tuit::as_returning())
                    .get_result(conn)
                    .await?;
                Ok(Some(t))
            }
            .scope_boxed()
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, tid: Uuid) -> StoreResult<bool> {
        use schema::tuits::dsl::*;

        let mut conn = self.db.get().await?;
        let n = diesel::delete(tuits.find(tid)).execute(&mut conn).await?;
        Ok(n > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_by_author(&self, author: Uuid) -> StoreResult<u64> {
        use schema::tuits::dsl::*;

        let mut conn = self.db.get().await?;
        let n = diesel::delete(tuits.filter(posted_by.eq(author)))
            .execute(&mut conn)
            .await?;
        Ok(n as u64)
    }
}
