//! Request handlers.

pub mod accounts;
pub mod health;
pub mod ingest;
pub mod search;
pub mod transcript;
pub mod verify;
