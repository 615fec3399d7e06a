pub mod annotate;
pub mod memory;
pub mod relations;
pub mod tuits;
pub mod users;

use std::sync::Arc;

use diesel_async::pooled_connection::deadpool;
use diesel_async::AsyncPgConnection;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::relation::{Membership, Relation};
use crate::models::tuit::{AnnotatedTuit, Tuit};

use self::memory::MemoryBackend;
use self::relations::{RelationService, RelationServiceDb};
use self::tuits::{TuitService, TuitServiceDb};
use self::users::{UserService, UserServiceDb};

pub type Pool = deadpool::Pool<AsyncPgConnection>;

/// Marker for store services that can be shared across request tasks.
pub trait Svc: Send + Sync + 'static {}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username `{0}` is already taken")]
    Conflict(String),
    #[error("could not get a database connection: {0}")]
    Pool(#[from] deadpool::PoolError),
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Handles to every store service, built once at startup and shared by all handlers.
#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn UserService>,
    pub tuits: Arc<dyn TuitService>,
    pub relations: Arc<dyn RelationService>,
}

impl Store {
    pub fn postgres(db: Pool) -> Self {
        Self {
            users: Arc::new(UserServiceDb::new(db.clone())),
            tuits: Arc::new(TuitServiceDb::new(db.clone())),
            relations: Arc::new(RelationServiceDb::new(db)),
        }
    }

    pub fn in_memory() -> Self {
        let backend = Arc::new(MemoryBackend::default());
        Self {
            users: backend.clone(),
            tuits: backend.clone(),
            relations: backend,
        }
    }

    pub async fn annotate(
        &self,
        viewer: Option<Uuid>,
        tuits: Vec<Tuit>,
    ) -> StoreResult<Vec<AnnotatedTuit>> {
        annotate::annotate(self.relations.as_ref(), viewer, tuits).await
    }

    /// Flips the relation and refreshes the tuit's like/dislike counter.
    ///
    /// The flip is kept even when the counter refresh fails; the next toggle on
    /// the tuit brings the counters back in line.
    #[tracing::instrument(skip(self))]
    pub async fn toggle(&self, rel: Relation, user: Uuid, tuit: Uuid) -> StoreResult<Membership> {
        let state = self.relations.toggle(rel, user, tuit).await?;
        if let Err(e) = self.refresh_stats(tuit).await {
            warn!(%e, "toggled {rel} but could not refresh counters");
        }
        info!(?state, "toggled {rel}");
        Ok(state)
    }

    /// Recounts likes and dislikes for a tuit. A missing tuit is ignored.
    pub async fn refresh_stats(&self, tuit: Uuid) -> StoreResult<()> {
        self.tuits.recount(tuit).await?;
        Ok(())
    }

    /// Deletes a tuit together with every like, dislike and bookmark pointing at it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_tuit(&self, tuit: Uuid) -> StoreResult<bool> {
        for rel in Relation::ALL {
            self.relations.delete_by_tuit(rel, tuit).await?;
        }
        self.tuits.delete(tuit).await
    }

    /// Deletes a user, their tuits, their join records and every join record on their tuits.
    ///
    /// Counters on other users' tuits that this user liked or disliked are refreshed afterwards.
    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, user: Uuid) -> StoreResult<bool> {
        if self.users.find_by_id(user).await?.is_none() {
            return Ok(false);
        }

        let mut touched = Vec::new();
        for rel in [Relation::Like, Relation::Dislike] {
            touched.extend(
                self.relations
                    .find_by_user(rel, user)
                    .await?
                    .into_iter()
                    .map(|r| r.tuit_id),
            );
        }

        let authored = self.tuits.find_by_author(user).await?;
        for tuit in &authored {
            for rel in Relation::ALL {
                self.relations.delete_by_tuit(rel, tuit.id).await?;
            }
        }
        for rel in Relation::ALL {
            let n = self.relations.delete_by_user(rel, user).await?;
            debug!(removed = n, "deleted {rel} records");
        }
        let removed_tuits = self.tuits.delete_by_author(user).await?;

        touched.sort_unstable();
        touched.dedup();
        for tuit in touched {
            self.refresh_stats(tuit).await?;
        }

        let deleted = self.users.delete(user).await?;
        info!(removed_tuits, "deleted user");
        Ok(deleted)
    }
}

fn clamp_count(n: u64) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::async_trait;

    use super::*;
    use crate::models::tuit::Stats;
    use crate::models::user::{NewUser, User};

    pub(crate) fn user(name: &str) -> User {
        User::from_new(
            NewUser {
                username: name.to_string(),
                password: String::new(),
                first_name: None,
                last_name: None,
                email: None,
                biography: None,
            },
            "hash".to_string(),
        )
    }

    #[tokio::test]
    async fn toggle_updates_counters() {
        let store = Store::in_memory();
        let alice = store.users.create(user("alice")).await.unwrap();
        let bob = store.users.create(user("bob")).await.unwrap();
        let t = store.tuits.create(Tuit::new(alice.id, "hi".into())).await.unwrap();

        store.toggle(Relation::Like, alice.id, t.id).await.unwrap();
        store.toggle(Relation::Like, bob.id, t.id).await.unwrap();
        store.toggle(Relation::Dislike, bob.id, t.id).await.unwrap();
        let stats = store.tuits.find_by_id(t.id).await.unwrap().unwrap().stats;
        assert_eq!((stats.likes, stats.dislikes), (2, 1));

        let state = store.toggle(Relation::Like, bob.id, t.id).await.unwrap();
        assert_eq!(state, Membership::Absent);
        let stats = store.tuits.find_by_id(t.id).await.unwrap().unwrap().stats;
        assert_eq!(stats.likes, 1);
    }

    #[tokio::test]
    async fn toggle_round_trip() {
        let store = Store::in_memory();
        let alice = store.users.create(user("alice")).await.unwrap();
        let t = store.tuits.create(Tuit::new(alice.id, "hi".into())).await.unwrap();

        for rel in Relation::ALL {
            assert_eq!(store.toggle(rel, alice.id, t.id).await.unwrap(), Membership::Present);
            assert_eq!(store.toggle(rel, alice.id, t.id).await.unwrap(), Membership::Absent);
            assert_eq!(store.toggle(rel, alice.id, t.id).await.unwrap(), Membership::Present);
            assert!(store.relations.find(rel, alice.id, t.id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn delete_user_cascades() {
        let store = Store::in_memory();
        let alice = store.users.create(user("alice")).await.unwrap();
        let bob = store.users.create(user("bob")).await.unwrap();
        let mine = store.tuits.create(Tuit::new(alice.id, "mine".into())).await.unwrap();
        let theirs = store.tuits.create(Tuit::new(bob.id, "theirs".into())).await.unwrap();

        for rel in Relation::ALL {
            store.toggle(rel, alice.id, theirs.id).await.unwrap();
            store.toggle(rel, bob.id, mine.id).await.unwrap();
        }

        assert!(store.delete_user(alice.id).await.unwrap());

        assert!(store.users.find_by_id(alice.id).await.unwrap().is_none());
        assert!(store.tuits.find_by_id(mine.id).await.unwrap().is_none());
        for rel in Relation::ALL {
            assert!(store.relations.find_by_user(rel, alice.id).await.unwrap().is_empty());
            assert!(store.relations.find_by_tuit(rel, mine.id).await.unwrap().is_empty());
            // bob only ever reacted to alice's tuit
            assert!(store.relations.find_by_user(rel, bob.id).await.unwrap().is_empty());
        }

        let stats = store.tuits.find_by_id(theirs.id).await.unwrap().unwrap().stats;
        assert_eq!((stats.likes, stats.dislikes), (0, 0));
        assert!(!store.delete_user(alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_tuit_removes_join_records() {
        let store = Store::in_memory();
        let alice = store.users.create(user("alice")).await.unwrap();
        let t = store.tuits.create(Tuit::new(alice.id, "bye".into())).await.unwrap();
        store.toggle(Relation::Bookmark, alice.id, t.id).await.unwrap();

        assert!(store.delete_tuit(t.id).await.unwrap());
        assert!(store
            .relations
            .find(Relation::Bookmark, alice.id, t.id)
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete_tuit(t.id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_toggles_keep_counters_exact() {
        let store = Store::in_memory();
        for _ in 0..20 {
            let t = store
                .tuits
                .create(Tuit::new(Uuid::now_v7(), "busy".into()))
                .await
                .unwrap();
            let handles: Vec<_> = (0..64)
                .map(|i| {
                    let store = store.clone();
                    let rel = if i % 4 == 0 { Relation::Dislike } else { Relation::Like };
                    tokio::spawn(async move { store.toggle(rel, Uuid::now_v7(), t.id).await })
                })
                .collect();
            for h in handles {
                h.await.unwrap().unwrap();
            }

            let stats = store.tuits.find_by_id(t.id).await.unwrap().unwrap().stats;
            let likes = store.relations.count_by_tuit(Relation::Like, t.id).await.unwrap();
            let dislikes = store.relations.count_by_tuit(Relation::Dislike, t.id).await.unwrap();
            assert_eq!((stats.likes as u64, stats.dislikes as u64), (likes, dislikes));
            assert_eq!((likes, dislikes), (48, 16));
        }
    }

    /// Tuit store whose counter refresh always fails.
    struct BrokenRecount(Arc<MemoryBackend>);

    impl Svc for BrokenRecount {}

    #[async_trait]
    impl TuitService for BrokenRecount {
        async fn find_all(&self) -> StoreResult<Vec<Tuit>> {
            TuitService::find_all(self.0.as_ref()).await
        }
        async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Tuit>> {
            TuitService::find_by_id(self.0.as_ref(), id).await
        }
        async fn find_by_author(&self, author: Uuid) -> StoreResult<Vec<Tuit>> {
            self.0.find_by_author(author).await
        }
        async fn create(&self, tuit: Tuit) -> StoreResult<Tuit> {
            TuitService::create(self.0.as_ref(), tuit).await
        }
        async fn update_text(&self, id: Uuid, text: String) -> StoreResult<Option<Tuit>> {
            self.0.update_text(id, text).await
        }
        async fn update_stats(&self, id: Uuid, stats: Stats) -> StoreResult<Option<Tuit>> {
            self.0.update_stats(id, stats).await
        }
        async fn recount(&self, _: Uuid) -> StoreResult<Option<Tuit>> {
            Err(StoreError::Query(diesel::result::Error::BrokenTransactionManager))
        }
        async fn delete(&self, id: Uuid) -> StoreResult<bool> {
            TuitService::delete(self.0.as_ref(), id).await
        }
        async fn delete_by_author(&self, author: Uuid) -> StoreResult<u64> {
            self.0.delete_by_author(author).await
        }
    }

    #[tokio::test]
    async fn toggle_survives_failed_counter_refresh() {
        let backend = Arc::new(MemoryBackend::default());
        let store = Store {
            users: backend.clone(),
            tuits: Arc::new(BrokenRecount(backend.clone())),
            relations: backend,
        };
        let alice = store.users.create(user("alice")).await.unwrap();
        let t = store.tuits.create(Tuit::new(alice.id, "hi".into())).await.unwrap();

        let state = store.toggle(Relation::Like, alice.id, t.id).await.unwrap();
        assert_eq!(state, Membership::Present);
        assert!(store.relations.find(Relation::Like, alice.id, t.id).await.unwrap().is_some());
    }
}
