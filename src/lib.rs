//! seedtrack - playtime and seeding tracker for a game server
//!
//! See [`tracker`] for the components and [`config`] for the runtime settings.

pub mod config;
pub mod sqlite_pragma;
pub mod tracker;
