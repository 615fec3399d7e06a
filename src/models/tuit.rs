use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize, Debug, Clone)]
pub struct CreateTuit {
    pub tuit: String,
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::tuits)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Stats {
    #[diesel(column_name = reply_count)]
    pub replies: i32,
    #[diesel(column_name = retuit_count)]
    pub retuits: i32,
    #[diesel(column_name = like_count)]
    pub likes: i32,
    #[diesel(column_name = dislike_count)]
    pub dislikes: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::tuits)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Tuit {
    pub id: Uuid,
    pub tuit: String,
    pub posted_by: Option<Uuid>,
    pub posted_on: DateTime<Utc>,
    #[diesel(embed)]
    pub stats: Stats,
}

impl Tuit {
    pub fn new(author: Uuid, text: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            tuit: text,
            posted_by: Some(author),
            posted_on: Utc::now(),
            stats: Stats::default(),
        }
    }
}

/// A tuit as seen by one viewer. Never persisted.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedTuit {
    #[serde(flatten)]
    pub tuit: Tuit,
    pub liked_by_me: bool,
    pub disliked_by_me: bool,
    pub bookmarked_by_me: bool,
    pub owned_by_me: bool,
}

impl From<Tuit> for AnnotatedTuit {
    fn from(tuit: Tuit) -> Self {
        Self {
            tuit,
            liked_by_me: false,
            disliked_by_me: false,
            bookmarked_by_me: false,
            owned_by_me: false,
        }
    }
}
