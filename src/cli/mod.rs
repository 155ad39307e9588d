//! Terminal subcommands. Each opens its own database handle from the loaded config.

pub mod backfill;
pub mod chat;
pub mod doctor;
pub mod enrich;
pub mod import;
pub mod search;
pub mod sessions;
pub mod stats;
