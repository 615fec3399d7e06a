use axum::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::models::relation::{JoinRecord, Membership, Relation};

use super::{Pool, StoreResult, Svc};

/// Likes, dislikes and bookmarks. Every method is keyed by the relation kind.
#[async_trait]
pub trait RelationService: Svc {
    async fn find(&self, rel: Relation, user: Uuid, tuit: Uuid) -> StoreResult<Option<JoinRecord>>;
    /// Removes the record if present, creates it otherwise. Returns the resulting state.
    async fn toggle(&self, rel: Relation, user: Uuid, tuit: Uuid) -> StoreResult<Membership>;
    async fn find_by_user(&self, rel: Relation, user: Uuid) -> StoreResult<Vec<JoinRecord>>;
    async fn find_by_tuit(&self, rel: Relation, tuit: Uuid) -> StoreResult<Vec<JoinRecord>>;
    async fn count_by_tuit(&self, rel: Relation, tuit: Uuid) -> StoreResult<u64>;
    async fn delete_by_user(&self, rel: Relation, user: Uuid) -> StoreResult<u64>;
    async fn delete_by_tuit(&self, rel: Relation, tuit: Uuid) -> StoreResult<u64>;
}

// Runs `$body` with `$t` bound to the schema module of the relation's table.
macro_rules! with_table {
    ($rel:expr, $t:ident => $body:expr) => {
        match $rel {
            Relation::Like => {
                use crate::schema::likes as $t;
                $body
            }
            Relation::Dislike => {
                use crate::schema::dislikes as $t;
                $body
            }
            Relation::Bookmark => {
                use crate::schema::bookmarks as $t;
                $body
            }
        }
    };
}

#[derive(Clone)]
pub struct RelationServiceDb {
    db: Pool,
}

impl Svc for RelationServiceDb {}

impl RelationServiceDb {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RelationService for RelationServiceDb {
    async fn find(&self, rel: Relation, user: Uuid, tuit: Uuid) -> StoreResult<Option<JoinRecord>> {
        let mut conn = self.db.get().await?;
        let record = with_table!(rel, t => {
            t::table
                .filter(t::user_id.eq(user))
                .filter(t::tuit_id.eq(tuit))
                .select((t::id, t::user_id, t::tuit_id))
                .first::<JoinRecord>(&mut conn)
                .await
                .optional()?
        });
        Ok(record)
    }

    // The unique (user_id, tuit_id) index makes a racing insert a no-op
    // instead of a second record.
    #[tracing::instrument(skip(self))]
    async fn toggle(&self, rel: Relation, user: Uuid, tuit: Uuid) -> StoreResult<Membership> {
        let mut conn = self.db.get().await?;
        let removed = with_table!(rel, t => {
            diesel::delete(t::table.filter(t::user_id.eq(user)).filter(t::tuit_id.eq(tuit)))
                .execute(&mut conn)
                .await?
        });
        if removed > 0 {
            return Ok(Membership::Absent);
        }

        let record = JoinRecord::new(user, tuit);
        with_table!(rel, t => {
            diesel::insert_into(t::table)
                .values((
                    t::id.eq(record.id),
                    t::user_id.eq(record.user_id),
                    t::tuit_id.eq(record.tuit_id),
                ))
                .on_conflict((t::user_id, t::tuit_id))
                .do_nothing()
                .execute(&mut conn)
                .await?
        });
        Ok(Membership::Present)
    }

    async fn find_by_user(&self, rel: Relation, user: Uuid) -> StoreResult<Vec<JoinRecord>> {
        let mut conn = self.db.get().await?;
        let records = with_table!(rel, t => {
            t::table
                .filter(t::user_id.eq(user))
                .order(t::id.asc())
                .select((t::id, t::user_id, t::tuit_id))
                .load::<JoinRecord>(&mut conn)
                .await?
        });
        Ok(records)
    }

    async fn find_by_tuit(&self, rel: Relation, tuit: Uuid) -> StoreResult<Vec<JoinRecord>> {
        let mut conn = self.db.get().await?;
        let records = with_table!(rel, t => {
            t::table
                .filter(t::tuit_id.eq(tuit))
                .order(t::id.asc())
                .select((t::id, t::user_id, t::tuit_id))
                .load::<JoinRecord>(&mut conn)
                .await?
        });
        Ok(records)
    }

    async fn count_by_tuit(&self, rel: Relation, tuit: Uuid) -> StoreResult<u64> {
        let mut conn = self.db.get().await?;
        let n: i64 = with_table!(rel, t => {
            t::table
                .filter(t::tuit_id.eq(tuit))
                .count()
                .get_result::<i64>(&mut conn)
                .await?
        });
        Ok(n.max(0) as u64)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_by_user(&self, rel: Relation, user: Uuid) -> StoreResult<u64> {
        let mut conn = self.db.get().await?;
        let n = with_table!(rel, t => {
            diesel::delete(t::table.filter(t::user_id.eq(user)))
                .execute(&mut conn)
                .await?
        });
        Ok(n as u64)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_by_tuit(&self, rel: Relation, tuit: Uuid) -> StoreResult<u64> {
        let mut conn = self.db.get().await?;
        let n = with_table!(rel, t => {
            diesel::delete(t::table.filter(t::tuit_id.eq(tuit)))
                .execute(&mut conn)
                .await?
        });
        Ok(n as u64)
    }
}
