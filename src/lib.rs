//! dlsort - sort a downloads directory by file type
//!
//! This library classifies the top-level files of a directory by extension,
//! moves each one into its category's subdirectory without overwriting
//! anything, and reports per-file failures without aborting the batch.

pub mod category;
pub mod cli;
pub mod config;
pub mod file_organizer;
pub mod output;
pub mod resolver;

pub use category::{Category, CategoryRegistry};
pub use config::{ConfigError, Configuration, Settings};
pub use file_organizer::{BatchReport, FileTask, MoveFailure, OrganizeError, Organizer};

pub use cli::{Cli, run_cli};
