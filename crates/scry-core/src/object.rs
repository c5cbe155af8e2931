//! Type and object value types.
//!
//! These are the values lookups produce: a [`QualifiedType`] from
//! `find_type`, an [`Object`] from `find_object`. Both carry the identity of
//! the [`Program`] that resolved them; mixing values across programs is a
//! hard `InvalidArgument`, checked at the API boundary.
//!
//! [`Program`]: crate::program::Program

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Address;

/// Opaque identity of one [`Program`] instance
///
/// Allocated from a process-wide counter at program construction. Value
/// types carry it so cross-program misuse can be rejected cheaply.
///
/// [`Program`]: crate::program::Program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(u64);

impl ProgramId
{
    pub(crate) fn next() -> Self
    {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ProgramId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Category of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeKind
{
    /// `void`.
    Void = 0,
    /// Integer type.
    Int,
    /// Boolean type.
    Bool,
    /// Floating-point type.
    Float,
    /// Structure type.
    Struct,
    /// Union type.
    Union,
    /// Class type.
    Class,
    /// Enumerated type.
    Enum,
    /// Type definition (alias).
    Typedef,
    /// Pointer type.
    Pointer,
    /// Array type.
    Array,
    /// Function type.
    Function,
}

impl TypeKind
{
    const ALL: [TypeKind; 12] = [
        TypeKind::Void,
        TypeKind::Int,
        TypeKind::Bool,
        TypeKind::Float,
        TypeKind::Struct,
        TypeKind::Union,
        TypeKind::Class,
        TypeKind::Enum,
        TypeKind::Typedef,
        TypeKind::Pointer,
        TypeKind::Array,
        TypeKind::Function,
    ];
}

/// Set of acceptable type kinds for a type query
///
/// A small bitset; `TypeKindSet::all()` accepts anything, which is what the
/// plain `find_type(name)` surface uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeKindSet(u16);

impl TypeKindSet
{
    /// The empty set.
    pub const fn empty() -> Self
    {
        TypeKindSet(0)
    }

    /// The set containing every kind.
    pub fn all() -> Self
    {
        TypeKind::ALL.iter().copied().collect()
    }

    /// The set containing a single kind.
    pub const fn of(kind: TypeKind) -> Self
    {
        TypeKindSet(1 << kind as u16)
    }

    /// Whether `kind` is in the set.
    pub const fn contains(self, kind: TypeKind) -> bool
    {
        self.0 & (1 << kind as u16) != 0
    }

    /// Whether the set is empty.
    pub const fn is_empty(self) -> bool
    {
        self.0 == 0
    }
}

impl BitOr for TypeKindSet
{
    type Output = TypeKindSet;

    fn bitor(self, rhs: Self) -> Self::Output
    {
        TypeKindSet(self.0 | rhs.0)
    }
}

impl BitOrAssign for TypeKindSet
{
    fn bitor_assign(&mut self, rhs: Self)
    {
        self.0 |= rhs.0;
    }
}

impl FromIterator<TypeKind> for TypeKindSet
{
    fn from_iter<I: IntoIterator<Item = TypeKind>>(iter: I) -> Self
    {
        let mut set = TypeKindSet::empty();
        for kind in iter {
            set |= TypeKindSet::of(kind);
        }
        set
    }
}

/// `const`/`volatile` qualifiers attached to a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Qualifiers(u8);

impl Qualifiers
{
    /// No qualifiers.
    pub const NONE: Qualifiers = Qualifiers(0);
    /// `const`.
    pub const CONST: Qualifiers = Qualifiers(1);
    /// `volatile`.
    pub const VOLATILE: Qualifiers = Qualifiers(2);

    /// Whether every qualifier in `other` is present in `self`.
    pub const fn contains(self, other: Qualifiers) -> bool
    {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Qualifiers
{
    type Output = Qualifiers;

    fn bitor(self, rhs: Self) -> Self::Output
    {
        Qualifiers(self.0 | rhs.0)
    }
}

impl fmt::Display for Qualifiers
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let mut first = true;
        if self.contains(Qualifiers::CONST) {
            write!(f, "const")?;
            first = false;
        }
        if self.contains(Qualifiers::VOLATILE) {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "volatile")?;
        }
        Ok(())
    }
}

/// Description of one named type resolved from debug info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo
{
    /// Program that resolved the type.
    pub program: ProgramId,
    /// Type name.
    pub name: String,
    /// Category.
    pub kind: TypeKind,
    /// Size in bytes, when known.
    pub size: Option<u64>,
    /// Declaring file, when known (used for filename disambiguation).
    pub filename: Option<String>,
}

/// A type plus qualifiers, as produced by `find_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedType
{
    /// The underlying type.
    pub info: TypeInfo,
    /// Qualifiers applied to it.
    pub qualifiers: Qualifiers,
}

impl QualifiedType
{
    /// Unqualified wrapper around `info`.
    pub fn unqualified(info: TypeInfo) -> Self
    {
        Self {
            info,
            qualifiers: Qualifiers::NONE,
        }
    }

    /// Program that resolved this type.
    pub fn program(&self) -> ProgramId
    {
        self.info.program
    }
}

impl fmt::Display for QualifiedType
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        if self.qualifiers != Qualifiers::NONE {
            write!(f, "{} ", self.qualifiers)?;
        }
        write!(f, "{}", self.info.name)
    }
}

/// Filter for `find_object`: which kinds of entity are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindObjectFlags(u8);

impl FindObjectFlags
{
    /// Enumeration constants.
    pub const CONSTANT: FindObjectFlags = FindObjectFlags(1);
    /// Functions.
    pub const FUNCTION: FindObjectFlags = FindObjectFlags(2);
    /// Variables.
    pub const VARIABLE: FindObjectFlags = FindObjectFlags(4);
    /// Any of the above.
    pub const ANY: FindObjectFlags = FindObjectFlags(7);

    /// Whether `kind` is acceptable under these flags.
    pub fn accepts(self, kind: ObjectKind) -> bool
    {
        let bit = match kind {
            ObjectKind::Constant => FindObjectFlags::CONSTANT,
            ObjectKind::Function => FindObjectFlags::FUNCTION,
            ObjectKind::Variable => FindObjectFlags::VARIABLE,
        };
        self.0 & bit.0 != 0
    }
}

impl BitOr for FindObjectFlags
{
    type Output = FindObjectFlags;

    fn bitor(self, rhs: Self) -> Self::Output
    {
        FindObjectFlags(self.0 | rhs.0)
    }
}

/// What kind of entity an [`Object`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind
{
    /// An enumeration constant (pure value, no storage).
    Constant,
    /// A function (storage is its entry point).
    Function,
    /// A variable (storage is its address).
    Variable,
}

/// How an object's value is represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectRepr
{
    /// The object lives in target memory at this address.
    Reference(Address),
    /// The object is a pure value (e.g. an enumerator).
    Value(i64),
}

/// A typed runtime value bound to a Program
///
/// Produced by `find_object` and the object finder chain. Remains valid only
/// in association with the program that resolved it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object
{
    /// Program that resolved the object.
    pub program: ProgramId,
    /// Name the object was resolved under.
    pub name: String,
    /// Entity kind.
    pub kind: ObjectKind,
    /// The object's type.
    pub type_: QualifiedType,
    /// Value representation.
    pub repr: ObjectRepr,
}

impl Object
{
    /// Target address for reference objects, `None` for pure values.
    pub fn address(&self) -> Option<Address>
    {
        match self.repr {
            ObjectRepr::Reference(address) => Some(address),
            ObjectRepr::Value(_) => None,
        }
    }
}

impl fmt::Display for Object
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match &self.repr {
            ObjectRepr::Reference(address) => {
                write!(f, "({}){} @ {}", self.type_, self.name, address)
            }
            ObjectRepr::Value(value) => write!(f, "({}){} = {}", self.type_, self.name, value),
        }
    }
}

/// Returns `true` if `haystack` (a declaring file path) matches `needle`.
///
/// Matching is suffix matching on whole path components: a query
/// of `"dir/file.c"` matches `"src/dir/file.c"` but not `"otherdir/file.c"`.
/// An empty or absent needle matches everything.
pub fn filename_matches(haystack: Option<&str>, needle: Option<&str>) -> bool
{
    let Some(needle) = needle else {
        return true;
    };
    if needle.is_empty() {
        return true;
    }
    let Some(haystack) = haystack else {
        return false;
    };
    let hay: Vec<&str> = haystack.split('/').filter(|part| !part.is_empty()).collect();
    let ndl: Vec<&str> = needle.split('/').filter(|part| !part.is_empty()).collect();
    if ndl.len() > hay.len() {
        return false;
    }
    hay[hay.len() - ndl.len()..] == ndl[..]
}
