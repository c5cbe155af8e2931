//! # Error Types
//!
//! General error handling for the introspection core.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::types::AddressSpace;

/// Main error type for program introspection operations
///
/// This enum represents all the ways an operation on a [`Program`] can fail.
/// Each variant corresponds to a specific error condition that can occur when
/// reading target memory, resolving names, or loading debug information.
///
/// ## Error Categories
///
/// 1. **Memory errors**: Unmapped
/// 2. **Resolution errors**: NotFound, ObjectNotFound, Lookup
/// 3. **Usage errors**: InvalidArgument (including cross-program misuse)
/// 4. **Debug-info errors**: MissingDebugInfo, Parse
/// 5. **I/O errors**: Io (file reads, live-process reads, etc.)
///
/// Resolution not-found errors (`NotFound`, `ObjectNotFound`, `Lookup`) are
/// recoverable: the queried entity simply does not exist in the target. All
/// other variants indicate a real failure.
///
/// [`Program`]: crate::program::Program
#[derive(Error, Debug)]
pub enum ScryError
{
    /// A memory read fell outside every registered segment
    ///
    /// This happens when:
    /// - No segment covers the requested address at all
    /// - A segment covers the start of the range but not all of it
    ///
    /// The address space is included so callers can distinguish a missing
    /// virtual mapping from a missing physical one.
    #[error("Address 0x{address:x} is not mapped in the {space} address space")]
    Unmapped
    {
        /// First address of the failed read.
        address: u64,
        /// Which address space the read targeted.
        space: AddressSpace,
    },

    /// A finder chain was exhausted without any entry producing a result
    ///
    /// Every enabled finder reported "not found". This is the recoverable
    /// outcome of a name or address lookup; the message describes what was
    /// being searched for.
    #[error("Not found: {0}")]
    NotFound(String),

    /// `find_object` could not resolve the requested name
    ///
    /// Distinguished from the generic [`ScryError::NotFound`] so that callers
    /// can access the queried name programmatically (e.g. for "did you mean"
    /// suggestions). `Program::contains` maps this variant to `false` instead
    /// of propagating it.
    #[error("Object not found: {name}")]
    ObjectNotFound
    {
        /// The name that was requested.
        name: String,
    },

    /// A module or thread was not found by its lookup key
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// Invalid argument passed to an introspection function
    ///
    /// Examples:
    /// - Registering a finder under an already-taken name
    /// - `set_enabled_*_finders` with an unregistered name
    /// - A symbol finder returning several results when one was requested
    /// - Passing a module, type, or object from a different program
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Debug information was required but could not be loaded
    ///
    /// Raised by `load_debug_info` when the main module's debug info is
    /// mandatory (`main = true`) and no finder could provide it. Per-module
    /// failures during batch loading are recorded on the modules themselves
    /// rather than raised here.
    #[error("Missing debug info: {0}")]
    MissingDebugInfo(String),

    /// The binary-format collaborator rejected a file or blob
    ///
    /// Wraps structured parse failures from ELF/DWARF decoding. The string
    /// includes the file path or module name where available.
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O error (for file operations, live-process reads, etc.)
    ///
    /// This is a standard Rust `std::io::Error` converted to our error type.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScryError
{
    /// Returns `true` for the recoverable "nothing matched" variants.
    ///
    /// Finder chain resolution swallows these and advances to the next
    /// entry; any other error aborts the chain.
    pub fn is_not_found(&self) -> bool
    {
        matches!(
            self,
            ScryError::NotFound(_) | ScryError::ObjectNotFound { .. } | ScryError::Lookup(_)
        )
    }
}

/// Convenience type alias for `Result<T, ScryError>`
///
/// ```rust
/// use scry_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, ScryError>;
