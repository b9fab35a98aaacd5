//! Client code for shellcache.
//!
//! This crate provides the reqwest-backed network implementation the engine
//! uses to reach the application's origin and third-party hosts.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, response_type_for};
