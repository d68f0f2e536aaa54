pub mod meilisearch;
pub mod rest;

pub use meilisearch::MeilisearchStore;
pub use rest::{RestConnectionSource, StaticConnectionSource};
