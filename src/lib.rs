//! Personal homepage server: GitHub profile, projects and discussion posts,
//! plus Last.fm now-playing, rendered to HTML behind a single-flight cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
pub mod util;
