//! Project time tracker CLI library.
//!
//! This crate provides the `bp` command-line interface over the ledger in
//! `bp-core` and the `SQLite` store in `bp-db`.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, PeriodArgs, ProjectsAction};
pub use config::Config;
