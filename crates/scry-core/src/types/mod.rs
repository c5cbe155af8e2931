//! # Types
//!
//! Target-agnostic types used throughout the introspection core.
//!
//! These types abstract away details of the inspected target, allowing the
//! rest of the crate to work with concepts like "address", "platform", and
//! "thread" without knowing whether the target is a live process, a kernel,
//! or a core dump.

pub mod address;
pub mod platform;
pub mod process;
pub mod stack;
pub mod symbols;

// Re-export all public types
pub use address::{Address, AddressSpace};
pub use platform::{Architecture, ByteOrder, Language, Platform, ProgramFlags};
pub use process::{ProcessId, Thread, ThreadId};
pub use stack::{FrameStatus, StackFrame, StackTrace};
pub use symbols::{Symbol, SymbolBinding, SymbolKind};
