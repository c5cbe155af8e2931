//! Memory address types.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed memory address
///
/// This wrapper around `u64` provides type safety when working with target
/// addresses. It prevents accidentally mixing addresses with other `u64`
/// values (like sizes, counts, or module ids).
///
/// ## Why use a newtype?
///
/// - **Type safety**: Prevents accidentally passing a size where an address is expected
/// - **Self-documenting**: Makes it clear that a value represents a target address
/// - **Future extensibility**: Can add address validation or methods later
///
/// ## Example
///
/// ```rust
/// use scry_core::types::Address;
///
/// let addr = Address::from(0x1000);
/// let next_addr = addr + 0x100; // Add offset
/// assert_eq!(next_addr.value(), 0x1100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// This is equivalent to `Address::from(value)` but can be used in const
    /// contexts.
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// Returns `Some(new_address)` if the addition doesn't overflow, or
    /// `None` if it does.
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset from this address, checking for underflow
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Add an offset to this address, saturating at the maximum value
    pub fn saturating_add(self, offset: u64) -> Self
    {
        Address(self.0.saturating_add(offset))
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}

/// Addressing context for a memory read
///
/// Segments are registered against one of the two address spaces, and a read
/// only consults segments in the space it targets. Virtual is the common
/// case; physical addressing is used by kernel and core-dump targets that
/// expose raw RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace
{
    /// Virtual addresses, translated through the target's page tables.
    Virtual,
    /// Physical (untranslated) addresses.
    Physical,
}

impl fmt::Display for AddressSpace
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            AddressSpace::Virtual => "virtual",
            AddressSpace::Physical => "physical",
        };
        write!(f, "{label}")
    }
}
