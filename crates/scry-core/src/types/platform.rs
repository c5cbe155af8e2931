//! Target platform description.

use std::fmt;

/// CPU architecture of the inspected target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture
{
    /// 64-bit ARM (AArch64).
    Arm64,
    /// 64-bit x86 (AMD64).
    X86_64,
    /// Architecture we don't have specific support for.
    Unknown(&'static str),
}

impl Architecture
{
    /// Pointer size in bytes for this architecture.
    pub const fn pointer_size_bytes(self) -> u8
    {
        match self {
            Architecture::Arm64 | Architecture::X86_64 => 8,
            Architecture::Unknown(_) => 8,
        }
    }
}

impl fmt::Display for Architecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            Architecture::Arm64 => "arm64",
            Architecture::X86_64 => "x86_64",
            Architecture::Unknown(name) => name,
        };
        write!(f, "{label}")
    }
}

/// Byte order used when decoding fixed-width integers from target memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder
{
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

/// Architecture, byte order, and ABI descriptors for one target
///
/// Every [`Program`] is bound to a platform at construction (or to the host
/// platform when none is given). The platform drives integer decoding in
/// memory reads and the word width of `read_word`.
///
/// ## Example
///
/// ```rust
/// use scry_core::types::Platform;
///
/// let platform = Platform::host();
/// assert!(platform.word_size() == 8);
/// ```
///
/// [`Program`]: crate::program::Program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform
{
    architecture: Architecture,
    byte_order: ByteOrder,
}

impl Platform
{
    /// Create a platform from explicit descriptors.
    pub const fn new(architecture: Architecture, byte_order: ByteOrder) -> Self
    {
        Self {
            architecture,
            byte_order,
        }
    }

    /// The platform this crate was compiled for.
    pub fn host() -> Self
    {
        let architecture = if cfg!(target_arch = "aarch64") {
            Architecture::Arm64
        } else if cfg!(target_arch = "x86_64") {
            Architecture::X86_64
        } else {
            Architecture::Unknown("host")
        };
        let byte_order = if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        };
        Self::new(architecture, byte_order)
    }

    /// Target CPU architecture.
    pub const fn architecture(self) -> Architecture
    {
        self.architecture
    }

    /// Target byte order.
    pub const fn byte_order(self) -> ByteOrder
    {
        self.byte_order
    }

    /// Width of a target machine word in bytes.
    pub const fn word_size(self) -> u8
    {
        self.architecture.pointer_size_bytes()
    }
}

/// Source language assumed for name lookups and presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language
{
    /// C (the default for kernel and most userspace targets).
    #[default]
    C,
    /// C++.
    Cpp,
    /// Rust.
    Rust,
}

impl fmt::Display for Language
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            Language::C => "c",
            Language::Cpp => "c++",
            Language::Rust => "rust",
        };
        write!(f, "{label}")
    }
}

/// Flags describing what kind of target a program is inspecting
///
/// Set by the backing attachment (`set_pid`, `set_kernel`, `set_core_dump`)
/// and never by lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgramFlags
{
    /// The target is the Linux kernel (live or vmcore).
    pub is_linux_kernel: bool,
    /// The target is a running process rather than a dump.
    pub is_live: bool,
}
