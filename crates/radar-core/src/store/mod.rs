//! SQLite store handle.
//!
//! One connection is held for the duration of a run; every component
//! borrows it from [`Store`].

mod config;
mod engine;

pub use config::StoreConfig;
pub use engine::Store;
