//! In-process backend used when no database URL is configured, and by the tests.

use std::cmp::Reverse;

use axum::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::relation::{JoinRecord, Membership, Relation};
use crate::models::tuit::{Stats, Tuit};
use crate::models::user::{User, UserChanges};

use super::relations::RelationService;
use super::tuits::TuitService;
use super::users::UserService;
use super::{clamp_count, StoreError, StoreResult, Svc};

#[derive(Default)]
pub struct MemoryBackend {
    users: DashMap<Uuid, User>,
    usernames: DashMap<String, Uuid>,
    tuits: DashMap<Uuid, Tuit>,
    relations: DashMap<(Relation, Uuid, Uuid), JoinRecord>,
}

impl Svc for MemoryBackend {}

impl MemoryBackend {
    fn records_where(&self, keep: impl Fn(&(Relation, Uuid, Uuid)) -> bool) -> Vec<JoinRecord> {
        let mut records: Vec<JoinRecord> = self
            .relations
            .iter()
            .filter(|e| keep(e.key()))
            .map(|e| *e.value())
            .collect();
        records.sort_by_key(|r| r.id);
        records
    }

    fn remove_where(&self, keep: impl Fn(&(Relation, Uuid, Uuid)) -> bool) -> u64 {
        let before = self.relations.len();
        self.relations.retain(|k, _| !keep(k));
        (before - self.relations.len()) as u64
    }

    fn count_where(&self, rel: Relation, tuit: Uuid) -> u64 {
        self.relations
            .iter()
            .filter(|e| {
                let &(r, _, t) = e.key();
                r == rel && t == tuit
            })
            .count() as u64
    }

    fn newest_first(mut tuits: Vec<Tuit>) -> Vec<Tuit> {
        tuits.sort_by_key(|t| Reverse((t.posted_on, t.id)));
        tuits
    }
}

#[async_trait]
impl UserService for MemoryBackend {
    async fn find_all(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| (u.joined, u.id));
        Ok(users)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let Some(id) = self.usernames.get(username).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn create(&self, user: User) -> StoreResult<User> {
        match self.usernames.entry(user.username.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(user.username)),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
                self.users.insert(user.id, user.clone());
                Ok(user)
            }
        }
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        // a delete racing this update waits on the guard, it cannot be undone by it
        let Some(mut current) = self.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(wanted) = changes.username.as_ref().filter(|w| **w != current.username) {
            match self.usernames.entry(wanted.clone()) {
                Entry::Occupied(_) => return Err(StoreError::Conflict(wanted.clone())),
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
            self.usernames.remove(&current.username);
        }

        changes.apply_to(&mut current);
        Ok(Some(current.clone()))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        match self.users.remove(&id) {
            Some((_, user)) => {
                self.usernames.remove(&user.username);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl TuitService for MemoryBackend {
    async fn find_all(&self) -> StoreResult<Vec<Tuit>> {
        let tuits = self.tuits.iter().map(|e| e.value().clone()).collect();
        Ok(Self::newest_first(tuits))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Tuit>> {
        Ok(self.tuits.get(&id).map(|t| t.clone()))
    }

    async fn find_by_author(&self, author: Uuid) -> StoreResult<Vec<Tuit>> {
        let tuits = self
            .tuits
            .iter()
            .filter(|e| e.value().posted_by == Some(author))
            .map(|e| e.value().clone())
            .collect();
        Ok(Self::newest_first(tuits))
    }

    async fn create(&self, tuit: Tuit) -> StoreResult<Tuit> {
        self.tuits.insert(tuit.id, tuit.clone());
        Ok(tuit)
    }

    async fn update_text(&self, id: Uuid, text: String) -> StoreResult<Option<Tuit>> {
        Ok(self.tuits.get_mut(&id).map(|mut t| {
            t.tuit = text;
            t.clone()
        }))
    }

    async fn update_stats(&self, id: Uuid, stats: Stats) -> StoreResult<Option<Tuit>> {
        Ok(self.tuits.get_mut(&id).map(|mut t| {
            t.stats = stats;
            t.clone()
        }))
    }

    // Counting under the tuit's write guard serializes recounts of the same tuit.
    async fn recount(&self, id: Uuid) -> StoreResult<Option<Tuit>> {
        let Some(mut t) = self.tuits.get_mut(&id) else {
            return Ok(None);
        };
        t.stats.likes = clamp_count(self.count_where(Relation::Like, id));
        t.stats.dislikes = clamp_count(self.count_where(Relation::Dislike, id));
        Ok(Some(t.clone()))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tuits.remove(&id).is_some())
    }

    async fn delete_by_author(&self, author: Uuid) -> StoreResult<u64> {
        let before = self.tuits.len();
        self.tuits.retain(|_, t| t.posted_by != Some(author));
        Ok((before - self.tuits.len()) as u64)
    }
}

#[async_trait]
impl RelationService for MemoryBackend {
    async fn find(&self, rel: Relation, user: Uuid, tuit: Uuid) -> StoreResult<Option<JoinRecord>> {
        Ok(self.relations.get(&(rel, user, tuit)).map(|e| *e.value()))
    }

    async fn toggle(&self, rel: Relation, user: Uuid, tuit: Uuid) -> StoreResult<Membership> {
        Ok(match self.relations.entry((rel, user, tuit)) {
            Entry::Occupied(existing) => {
                existing.remove();
                Membership::Absent
            }
            Entry::Vacant(slot) => {
                slot.insert(JoinRecord::new(user, tuit));
                Membership::Present
            }
        })
    }

    async fn find_by_user(&self, rel: Relation, user: Uuid) -> StoreResult<Vec<JoinRecord>> {
        Ok(self.records_where(|&(r, u, _)| r == rel && u == user))
    }

    async fn find_by_tuit(&self, rel: Relation, tuit: Uuid) -> StoreResult<Vec<JoinRecord>> {
        Ok(self.records_where(|&(r, _, t)| r == rel && t == tuit))
    }

    async fn count_by_tuit(&self, rel: Relation, tuit: Uuid) -> StoreResult<u64> {
        Ok(self.count_where(rel, tuit))
    }

    async fn delete_by_user(&self, rel: Relation, user: Uuid) -> StoreResult<u64> {
        Ok(self.remove_where(|&(r, u, _)| r == rel && u == user))
    }

    async fn delete_by_tuit(&self, rel: Relation, tuit: Uuid) -> StoreResult<u64> {
        Ok(self.remove_where(|&(r, _, t)| r == rel && t == tuit))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::user::NewUser;

    fn user(name: &str) -> User {
        let new = NewUser {
            username: name.to_string(),
            password: "pw".into(),
            first_name: None,
            last_name: None,
            email: None,
            biography: None,
        };
        User::from_new(new, "hash".into())
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let mem = MemoryBackend::default();
        UserService::create(&mem, user("alice")).await.unwrap();
        let err = UserService::create(&mem, user("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(name) if name == "alice"));
    }

    #[tokio::test]
    async fn rename_frees_old_username() {
        let mem = MemoryBackend::default();
        let alice = UserService::create(&mem, user("alice")).await.unwrap();
        UserService::create(&mem, user("bob")).await.unwrap();

        let clash = UserChanges {
            username: Some("bob".into()),
            ..Default::default()
        };
        assert!(matches!(
            UserService::update(&mem, alice.id, clash).await,
            Err(StoreError::Conflict(_))
        ));

        let rename = UserChanges {
            username: Some("alicia".into()),
            biography: Some("hello".into()),
            ..Default::default()
        };
        let renamed = UserService::update(&mem, alice.id, rename).await.unwrap().unwrap();
        assert_eq!(renamed.username, "alicia");
        assert_eq!(renamed.biography.as_deref(), Some("hello"));
        assert!(mem.find_by_username("alice").await.unwrap().is_none());
        UserService::create(&mem, user("alice")).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_toggles_keep_at_most_one_record() {
        let mem = Arc::new(MemoryBackend::default());
        let (u, t) = (Uuid::now_v7(), Uuid::now_v7());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let mem = mem.clone();
                tokio::spawn(async move { mem.toggle(Relation::Like, u, t).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        // an even number of flips lands back on absent
        assert!(mem.find(Relation::Like, u, t).await.unwrap().is_none());
        assert_eq!(mem.count_by_tuit(Relation::Like, t).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn relation_kinds_are_independent() {
        let mem = MemoryBackend::default();
        let (u, t) = (Uuid::now_v7(), Uuid::now_v7());
        mem.toggle(Relation::Like, u, t).await.unwrap();
        mem.toggle(Relation::Dislike, u, t).await.unwrap();

        assert!(mem.find(Relation::Like, u, t).await.unwrap().is_some());
        assert!(mem.find(Relation::Dislike, u, t).await.unwrap().is_some());
        assert!(mem.find(Relation::Bookmark, u, t).await.unwrap().is_none());

        assert_eq!(mem.delete_by_user(Relation::Like, u).await.unwrap(), 1);
        assert_eq!(mem.find_by_user(Relation::Dislike, u).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn rename_racing_delete_leaves_nothing_behind() {
        let mem = Arc::new(MemoryBackend::default());
        for round in 0..200 {
            let id = UserService::create(mem.as_ref(), user(&format!("u{round}")))
                .await
                .unwrap()
                .id;
            let renamer = {
                let mem = mem.clone();
                tokio::spawn(async move {
                    let rename = UserChanges {
                        username: Some(format!("r{round}")),
                        ..Default::default()
                    };
                    UserService::update(mem.as_ref(), id, rename).await
                })
            };
            let deleter = {
                let mem = mem.clone();
                tokio::spawn(async move { UserService::delete(mem.as_ref(), id).await })
            };

            renamer.await.unwrap().unwrap();
            assert!(deleter.await.unwrap().unwrap());
            assert!(UserService::find_by_id(mem.as_ref(), id).await.unwrap().is_none());
        }
        assert!(mem.users.is_empty());
        assert!(mem.usernames.is_empty());
    }
}
