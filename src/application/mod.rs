//! Application services: feeds, follows, authoring.

pub mod auth;
pub mod error;
pub mod feed;
pub mod follow;
pub mod pagination;
pub mod posts;
pub mod repos;
