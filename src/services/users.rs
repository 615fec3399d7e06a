use axum::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use crate::models::user::*;
use diesel_async::RunQueryDsl;

use crate::schema;

use super::{Pool, StoreError, StoreResult, Svc};

#[async_trait]
pub trait UserService: Svc {
    async fn find_all(&self) -> StoreResult<Vec<User>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    /// Fails with [`StoreError::Conflict`] when the username is taken.
    async fn create(&self, user: User) -> StoreResult<User>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[derive(Clone)]
pub struct UserServiceDb {
    db: Pool,
}

impl Svc for UserServiceDb {}

fn unique_violation(username: &str) -> impl FnOnce(DieselError) -> StoreError + '_ {
    move |e| match e {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            StoreError::Conflict(username.to_string())
        }
        e => e.into(),
    }
}

#[async_trait]
impl UserService for UserServiceDb {
    async fn find_all(&self) -> StoreResult<Vec<User>> {
        use schema::users::dsl::*;

        let mut conn = self.db.get().await?;
        let us: Vec<User> = users
            .order(joined.asc())
            .select(User::as_select())
            .load(&mut conn)
            .await?;
        Ok(us)
    }

    async fn find_by_id(&self, uid: Uuid) -> StoreResult<Option<User>> {
        use schema::users::dsl::*;

        let mut conn = self.db.get().await?;
        let user = users
            .find(uid)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(user)
    }

    async fn find_by_username(&self, name: &str) -> StoreResult<Option<User>> {
        use schema::users::dsl::*;

        let mut conn = self.db.get().await?;
        let user = users
            .filter(username.eq(name))
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(user)
    }

    #[tracing::instrument(skip_all, fields(username = %u.username))]
    async fn create(&self, u: User) -> StoreResult<User> {
        use schema::users::dsl::*;

        let mut conn = self.db.get().await?;

        let user = diesel::insert_into(users)
            .values(&u)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(unique_violation(&u.username))?;

        Ok(user)
    }

    #[tracing::instrument(skip(self, changes))]
    async fn update(&self, uid: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        use schema::users::dsl::*;

        if changes.is_empty() {
            return self.find_by_id(uid).await;
        }

        let mut conn = self.db.get().await?;
        let wanted = changes.username.clone().unwrap_or_default();
        let user = diesel::update(users.find(uid))
            .set(&changes)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(unique_violation(&wanted))?;
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, uid: Uuid) -> StoreResult<bool> {
        use schema::users::dsl::*;

        let mut conn = self.db.get().await?;
        let n = diesel::delete(users.find(uid)).execute(&mut conn).await?;
        Ok(n > 0)
    }
}

impl UserServiceDb {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }
}
