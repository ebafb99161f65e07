//! Shared plumbing for the Monlight services (Error Tracker, Log Viewer,
//! Metrics Collector, Browser Relay). Each binary embeds an HTTP listener,
//! a local SQLite store and a handful of background workers; this crate
//! holds the parts that would otherwise be copy-pasted four times: the
//! storage adapter, the stackable auth/rate/body gates, the env-parsing
//! helpers and the uniform JSON error taxonomy.

pub mod envutil;
pub mod error;
pub mod gates;
pub mod health;
pub mod storage;
pub mod time;

pub use error::AppError;
