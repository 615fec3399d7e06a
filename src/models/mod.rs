pub mod relation;
pub mod tuit;
pub mod user;
