/// Finished duel persistence.
pub mod duel_store;
/// Database model definitions.
pub mod models;
/// Question sources.
pub mod questions;
/// Storage abstraction layer for database operations.
pub mod storage;
