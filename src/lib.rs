//! Environment synchronization for WordPress projects
//!
//! Moves a site's database and uploads between development, staging and
//! production by sequencing `wp`, `rsync` and `ssh` invocations.

// envsync/src/lib.rs
pub mod cli;
pub mod config;
pub mod detect;
pub mod environment;
pub mod errors;
pub mod notify;
pub mod sync;
pub mod utils;
