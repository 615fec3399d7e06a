use std::fmt;

use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

/// The three user/tuit join tables. They share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Like,
    Dislike,
    Bookmark,
}

impl Relation {
    pub const ALL: [Relation; 3] = [Relation::Like, Relation::Dislike, Relation::Bookmark];

    /// Path segment used by the HTTP routes, e.g. `/users/:uid/likes`.
    pub fn segment(self) -> &'static str {
        match self {
            Relation::Like => "likes",
            Relation::Dislike => "dislikes",
            Relation::Bookmark => "bookmarks",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Like => "like",
            Relation::Dislike => "dislike",
            Relation::Bookmark => "bookmark",
        })
    }
}

// selected as `(id, user_id, tuit_id)` from whichever table backs the relation
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct JoinRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tuit_id: Uuid,
}

impl JoinRecord {
    pub fn new(user_id: Uuid, tuit_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            tuit_id,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Present,
    Absent,
}

#[derive(Serialize, Debug)]
pub struct ToggleOutcome {
    pub state: Membership,
}
