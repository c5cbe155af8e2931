//! # scry-core
//!
//! Debug-target introspection primitives for scry.
//!
//! This crate provides the model of one inspected target, including:
//! - The [`Program`] aggregate: platform, memory reader, module registry,
//!   finder chains, threads
//! - Pluggable resolution via named finder chains for debug info, types,
//!   objects, and symbols
//! - Debug-info parsing (ELF + DWARF) and the standard filesystem finder
//! - Frame-pointer stack walking with symbolization
//!
//! ## Targets
//!
//! - **Live processes**: attached through procfs (`/proc/<pid>/maps`,
//!   `/proc/<pid>/mem`, `/proc/<pid>/task`)
//! - **Core dumps**: ELF core files read in place
//! - **Linux kernel**: the running kernel through `/proc/kcore`

pub mod debug_info;
pub mod error;
pub mod finder;
pub mod memory;
pub mod module;
pub mod object;
pub mod program;
pub mod symbol;
pub mod types;

mod coredump;
mod live;
mod stack;

pub use error::{Result, ScryError};
pub use finder::{
    DebugInfoFinder, EnablePosition, FinderChain, ObjectFinder, SymbolFinder, TypeFinder,
};
pub use module::{Module, ModuleKind};
pub use object::{
    FindObjectFlags, Object, ObjectKind, ObjectRepr, ProgramId, QualifiedType, Qualifiers,
    TypeInfo, TypeKind, TypeKindSet,
};
pub use program::Program;
pub use symbol::{SymbolIndex, SymbolQuery};
// Re-export commonly used types
pub use types::{
    Address, AddressSpace, Architecture, ByteOrder, Language, Platform, ProcessId, ProgramFlags,
    StackFrame, StackTrace, Symbol, Thread, ThreadId,
};
