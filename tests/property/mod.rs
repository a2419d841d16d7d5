//! Property-based tests

pub mod geo_proptest;
pub mod retry_proptest;
