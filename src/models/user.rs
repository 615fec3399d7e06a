use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// the input to the `register` and `create_user` handlers
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub biography: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// the input to the `update_user` handler; `password` is plain text here
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub username: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub biography: Option<String>,
}

/// Column updates for a user. `None` leaves the column untouched.
#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = crate::schema::users)]
pub struct UserChanges {
    pub username: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub biography: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.password.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.biography.is_none()
    }

    pub fn apply_to(self, user: &mut User) {
        if let Some(v) = self.username {
            user.username = v;
        }
        if let Some(v) = self.password {
            user.password = v;
        }
        if self.first_name.is_some() {
            user.first_name = self.first_name;
        }
        if self.last_name.is_some() {
            user.last_name = self.last_name;
        }
        if self.email.is_some() {
            user.email = self.email;
        }
        if self.biography.is_some() {
            user.biography = self.biography;
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// argon2 PHC string
    #[serde(skip_serializing)]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub biography: Option<String>,
    pub joined: DateTime<Utc>,
}

impl User {
    /// Builds a fresh user from a registration payload and an already hashed password.
    pub fn from_new(new: NewUser, password_hash: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            username: new.username,
            password: password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            biography: new.biography,
            joined: Utc::now(),
        }
    }
}
