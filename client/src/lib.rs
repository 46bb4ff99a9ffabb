#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! The store-client capability consumed by the resource-limit engine.
//!
//! The engine never talks to a concrete store; it is handed a [`Client`] by
//! the embedding process. The [`fake`] module provides the in-memory client
//! the test suites run against.

mod cache;
mod client;
pub mod fake;

pub use self::cache::StoreCache;
pub use self::client::{Client, Error, SharedClient};
