//! Local filesystem helpers used by the local provider

pub mod entry;
pub mod ops;
pub mod utils;

pub use entry::{entity_from_path, path_string};
pub use ops::{read_directory, sort_entries};
