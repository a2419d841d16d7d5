//! Integration tests across the store, outbox, engine and HTTP client

pub mod outbox_test;
pub mod store_test;
