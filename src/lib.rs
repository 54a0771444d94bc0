//! Yatube: community blogging with groups, comments and a follow feed.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
