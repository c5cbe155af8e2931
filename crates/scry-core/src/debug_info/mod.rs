//! # Debug Info
//!
//! Parsing and locating debug information for modules: the [`DebugFile`]
//! wrapper over an object file's symbol table and DWARF, the search options,
//! and the standard finder that walks the filesystem for matching files.

mod file;
mod options;
mod standard;

pub use file::{ConstantRecord, DebugFile, ObjectRecord, TypeRecord};
pub use options::DebugInfoOptions;
pub use standard::{
    StandardDebugInfoFinder, StandardObjectFinder, StandardSymbolFinder, StandardTypeFinder,
};

/// Name the built-in debug-info finder registers under.
pub const STANDARD_FINDER_NAME: &str = "standard";
