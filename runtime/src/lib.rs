#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Configuration and wiring for the resource-limit engine.
//!
//! The embedding process parses [`Args`], hands [`Args::build`] a store
//! client, and gets back a [`Runtime`]: the admission interceptor for its
//! request path plus a running background reconciler.

mod args;

pub use self::args::{Args, Runtime};
