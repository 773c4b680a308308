//! CLI subcommands.

pub mod assets;
pub mod cache;
pub mod common;
pub mod prefetch;
pub mod serve;
pub mod source;
