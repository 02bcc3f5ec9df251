//! Planeja+ Storage - Persistence abstraction
//!
//! This crate provides the domain models and the persistence layer for
//! Planeja+: a key-value state store (memory, JSON files or PostgreSQL)
//! and read repositories for the project/task/team snapshot.

pub mod db;
pub mod models;
pub mod repository;
pub mod state;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
pub use state::{
    create_state_store, load_json, save_json, FileStateStore, MemoryStateStore, PgStateStore,
    StateStore,
};
