//! Viewer-relative decoration of tuit listings.
//!
//! For every tuit in a listing the viewer's like, dislike and bookmark records are
//! looked up concurrently, and the results are merged back onto the tuits as flags.

use std::collections::HashSet;

use futures::future::try_join_all;
use uuid::Uuid;

use crate::models::relation::{JoinRecord, Relation};
use crate::models::tuit::{AnnotatedTuit, Tuit};

use super::relations::RelationService;
use super::StoreResult;

/// Decorates `tuits` with the viewer's flags, keeping order and length.
///
/// All `3 * tuits.len()` lookups are in flight at the same time. A single failed
/// lookup fails the whole call, no partial listing is returned.
/// Without a viewer nothing is looked up and every flag is false.
#[tracing::instrument(skip_all, fields(viewer = ?viewer, tuits = tuits.len()))]
pub async fn annotate(
    relations: &dyn RelationService,
    viewer: Option<Uuid>,
    tuits: Vec<Tuit>,
) -> StoreResult<Vec<AnnotatedTuit>> {
    let Some(viewer) = viewer else {
        return Ok(tuits.into_iter().map(AnnotatedTuit::from).collect());
    };

    let lookups = |rel: Relation| {
        try_join_all(
            tuits
                .iter()
                .map(move |t| relations.find(rel, viewer, t.id)),
        )
    };
    let (liked, disliked, bookmarked) = tokio::try_join!(
        lookups(Relation::Like),
        lookups(Relation::Dislike),
        lookups(Relation::Bookmark),
    )?;

    let (liked, disliked, bookmarked) = (tuit_ids(liked), tuit_ids(disliked), tuit_ids(bookmarked));

    Ok(tuits
        .into_iter()
        .map(|tuit| AnnotatedTuit {
            liked_by_me: liked.contains(&tuit.id),
            disliked_by_me: disliked.contains(&tuit.id),
            bookmarked_by_me: bookmarked.contains(&tuit.id),
            owned_by_me: tuit.posted_by == Some(viewer),
            tuit,
        })
        .collect())
}

fn tuit_ids(found: Vec<Option<JoinRecord>>) -> HashSet<Uuid> {
    found.into_iter().flatten().map(|r| r.tuit_id).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::async_trait;
    use tokio::sync::Barrier;

    use super::*;
    use crate::models::relation::Membership;
    use crate::services::memory::MemoryBackend;
    use crate::services::{StoreError, Svc};

    fn tuit_by(author: Option<Uuid>, text: &str) -> Tuit {
        let mut t = Tuit::new(Uuid::now_v7(), text.to_string());
        t.posted_by = author;
        t
    }

    fn flags(a: &AnnotatedTuit) -> [bool; 4] {
        [a.liked_by_me, a.disliked_by_me, a.bookmarked_by_me, a.owned_by_me]
    }

    /// Delegates to a real backend but fails dislike lookups for one tuit.
    struct FailingDislikes {
        inner: MemoryBackend,
        poisoned: Uuid,
    }

    impl Svc for FailingDislikes {}

    #[async_trait]
    impl RelationService for FailingDislikes {
        async fn find(&self, rel: Relation, user: Uuid, tuit: Uuid) -> StoreResult<Option<JoinRecord>> {
            if rel == Relation::Dislike && tuit == self.poisoned {
                return Err(StoreError::Query(diesel::result::Error::BrokenTransactionManager));
            }
            self.inner.find(rel, user, tuit).await
        }
        async fn toggle(&self, rel: Relation, user: Uuid, tuit: Uuid) -> StoreResult<Membership> {
            self.inner.toggle(rel, user, tuit).await
        }
        async fn find_by_user(&self, rel: Relation, user: Uuid) -> StoreResult<Vec<JoinRecord>> {
            self.inner.find_by_user(rel, user).await
        }
        async fn find_by_tuit(&self, rel: Relation, tuit: Uuid) -> StoreResult<Vec<JoinRecord>> {
            self.inner.find_by_tuit(rel, tuit).await
        }
        async fn count_by_tuit(&self, rel: Relation, tuit: Uuid) -> StoreResult<u64> {
            self.inner.count_by_tuit(rel, tuit).await
        }
        async fn delete_by_user(&self, rel: Relation, user: Uuid) -> StoreResult<u64> {
            self.inner.delete_by_user(rel, user).await
        }
        async fn delete_by_tuit(&self, rel: Relation, tuit: Uuid) -> StoreResult<u64> {
            self.inner.delete_by_tuit(rel, tuit).await
        }
    }

    /// Every lookup waits until all of them have started, so a sequential
    /// implementation would never finish.
    struct Rendezvous {
        barrier: Arc<Barrier>,
        started: AtomicUsize,
    }

    impl Svc for Rendezvous {}

    #[async_trait]
    impl RelationService for Rendezvous {
        async fn find(&self, _: Relation, _: Uuid, _: Uuid) -> StoreResult<Option<JoinRecord>> {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.barrier.wait().await;
            Ok(None)
        }
        async fn toggle(&self, _: Relation, _: Uuid, _: Uuid) -> StoreResult<Membership> {
            unreachable!()
        }
        async fn find_by_user(&self, _: Relation, _: Uuid) -> StoreResult<Vec<JoinRecord>> {
            unreachable!()
        }
        async fn find_by_tuit(&self, _: Relation, _: Uuid) -> StoreResult<Vec<JoinRecord>> {
            unreachable!()
        }
        async fn count_by_tuit(&self, _: Relation, _: Uuid) -> StoreResult<u64> {
            unreachable!()
        }
        async fn delete_by_user(&self, _: Relation, _: Uuid) -> StoreResult<u64> {
            unreachable!()
        }
        async fn delete_by_tuit(&self, _: Relation, _: Uuid) -> StoreResult<u64> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn empty_listing() {
        let mem = MemoryBackend::default();
        let out = annotate(&mem, Some(Uuid::now_v7()), vec![]).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn liked_bookmarked_and_owned() {
        let mem = MemoryBackend::default();
        let u1 = Uuid::now_v7();
        let p1 = tuit_by(Some(Uuid::now_v7()), "p1");
        let p2 = tuit_by(Some(Uuid::now_v7()), "p2");
        let p3 = tuit_by(Some(u1), "p3");
        mem.toggle(Relation::Like, u1, p1.id).await.unwrap();
        mem.toggle(Relation::Bookmark, u1, p2.id).await.unwrap();

        let out = annotate(&mem, Some(u1), vec![p1.clone(), p2.clone(), p3.clone()])
            .await
            .unwrap();

        let ids: Vec<Uuid> = out.iter().map(|a| a.tuit.id).collect();
        assert_eq!(ids, vec![p1.id, p2.id, p3.id]);
        assert_eq!(flags(&out[0]), [true, false, false, false]);
        assert_eq!(flags(&out[1]), [false, false, true, false]);
        assert_eq!(flags(&out[2]), [false, false, false, true]);
    }

    #[tokio::test]
    async fn other_viewers_records_do_not_leak() {
        let mem = MemoryBackend::default();
        let (me, someone) = (Uuid::now_v7(), Uuid::now_v7());
        let t = tuit_by(Some(someone), "t");
        for rel in Relation::ALL {
            mem.toggle(rel, someone, t.id).await.unwrap();
        }

        let out = annotate(&mem, Some(me), vec![t]).await.unwrap();
        assert_eq!(flags(&out[0]), [false; 4]);
    }

    #[tokio::test]
    async fn like_and_dislike_can_coexist() {
        let mem = MemoryBackend::default();
        let me = Uuid::now_v7();
        let t = tuit_by(None, "t");
        mem.toggle(Relation::Like, me, t.id).await.unwrap();
        mem.toggle(Relation::Dislike, me, t.id).await.unwrap();

        let out = annotate(&mem, Some(me), vec![t]).await.unwrap();
        assert_eq!(flags(&out[0]), [true, true, false, false]);
    }

    #[tokio::test]
    async fn orphan_and_duplicate_tuits_are_kept() {
        let mem = MemoryBackend::default();
        let me = Uuid::now_v7();
        let orphan = tuit_by(None, "nobody wrote this");
        let mine = tuit_by(Some(me), "mine");
        mem.toggle(Relation::Like, me, mine.id).await.unwrap();

        let out = annotate(&mem, Some(me), vec![orphan.clone(), mine.clone(), mine.clone()])
            .await
            .unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(flags(&out[0]), [false; 4]);
        assert_eq!(flags(&out[1]), [true, false, false, true]);
        assert_eq!(out[1], out[2]);
    }

    #[tokio::test]
    async fn anonymous_viewer_gets_no_flags() {
        let mem = MemoryBackend::default();
        let author = Uuid::now_v7();
        let t = tuit_by(Some(author), "t");
        mem.toggle(Relation::Like, author, t.id).await.unwrap();

        let out = annotate(&mem, None, vec![t.clone()]).await.unwrap();
        assert_eq!(out, vec![AnnotatedTuit::from(t)]);
    }

    #[tokio::test]
    async fn one_failed_lookup_fails_everything() {
        let me = Uuid::now_v7();
        let good = tuit_by(Some(me), "good");
        let bad = tuit_by(None, "bad");
        let failing = FailingDislikes {
            inner: MemoryBackend::default(),
            poisoned: bad.id,
        };
        failing.toggle(Relation::Like, me, good.id).await.unwrap();

        let out = annotate(&failing, Some(me), vec![good, bad]).await;
        assert!(matches!(out, Err(StoreError::Query(_))));
    }

    #[tokio::test]
    async fn lookups_run_concurrently() {
        let n = 4;
        let rendezvous = Rendezvous {
            barrier: Arc::new(Barrier::new(3 * n)),
            started: AtomicUsize::new(0),
        };
        let tuits: Vec<Tuit> = (0..n).map(|i| tuit_by(None, &i.to_string())).collect();

        let out = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            annotate(&rendezvous, Some(Uuid::now_v7()), tuits),
        )
        .await
        .expect("lookups were serialized")
        .unwrap();

        assert_eq!(out.len(), n);
        assert_eq!(rendezvous.started.load(Ordering::SeqCst), 3 * n);
    }
}
