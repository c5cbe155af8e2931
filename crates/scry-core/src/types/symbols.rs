//! Symbol value types.

use std::fmt;

use super::Address;

/// Linkage binding of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolBinding
{
    /// Not visible outside the containing compilation unit.
    Local,
    /// Visible to all components being combined.
    Global,
    /// Global, but lower precedence than an explicit global.
    Weak,
    /// Binding not known or not applicable.
    Unknown,
}

impl fmt::Display for SymbolBinding
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolBinding::Local => "local",
            SymbolBinding::Global => "global",
            SymbolBinding::Weak => "weak",
            SymbolBinding::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// Kind of entity a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind
{
    /// Data object (variable).
    Object,
    /// Executable code (function).
    Function,
    /// Section symbol.
    Section,
    /// Source file name symbol.
    File,
    /// Kind not known or not representable.
    Unknown,
}

impl fmt::Display for SymbolKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolKind::Object => "object",
            SymbolKind::Function => "function",
            SymbolKind::Section => "section",
            SymbolKind::File => "file",
            SymbolKind::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// A name + address + size descriptor produced by symbol lookups
///
/// Symbols are value types: they are produced by a [`Program`]'s symbol
/// finder chain and remain meaningful only for the program that resolved
/// them.
///
/// [`Program`]: crate::program::Program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol
{
    /// Symbol name as recorded in the symbol table (mangled if applicable).
    pub name: String,
    /// Start address in the target's address space.
    pub address: Address,
    /// Size in bytes (0 when unknown).
    pub size: u64,
    /// Linkage binding.
    pub binding: SymbolBinding,
    /// Entity kind.
    pub kind: SymbolKind,
}

impl Symbol
{
    /// Returns `true` if `address` falls within `[self.address, self.address + self.size)`.
    ///
    /// A zero-sized symbol only contains its own start address.
    pub fn contains(&self, address: Address) -> bool
    {
        if self.size == 0 {
            return self.address == address;
        }
        address >= self.address && address.value() < self.address.value().saturating_add(self.size)
    }

    /// Demangled presentation of the symbol name, falling back to the raw name.
    pub fn display_name(&self) -> String
    {
        rustc_demangle::try_demangle(&self.name)
            .map(|demangled| demangled.to_string())
            .unwrap_or_else(|_| self.name.clone())
    }
}

impl fmt::Display for Symbol
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} @ {} ({} bytes)", self.name, self.address, self.size)
    }
}
