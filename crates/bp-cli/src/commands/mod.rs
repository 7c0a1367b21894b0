//! CLI subcommand implementations.

pub mod daily;
pub mod events;
pub mod projects;
pub mod report;
pub mod status;
pub mod track;
pub mod util;
pub mod watch;
