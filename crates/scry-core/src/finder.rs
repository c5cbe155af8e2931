//! # Finder Chains
//!
//! Ordered, named, independently enable/disable-able resolution strategies.
//!
//! A [`Program`] owns four chains, one per query kind: debug-info, type,
//! object, and symbol. Each chain tries its enabled entries in priority
//! order until one produces a result ("found"), declines ("not found", try
//! the next entry), or fails hard (abort the chain, propagate the error).
//! Resolution is strictly sequential, so side effects of earlier strategies
//! are visible to later ones, and a strategy may re-enter lookups on the
//! same program while resolving.
//!
//! The chain itself is generic over the strategy trait; the per-kind traits
//! ([`TypeFinder`], [`ObjectFinder`], [`SymbolFinder`], [`DebugInfoFinder`])
//! express the "found / not found / error" outcome as `Result<Option<T>>`
//! (or `Result<Vec<Symbol>>` for symbols, where an empty vector means "not
//! found").
//!
//! [`Program`]: crate::program::Program

use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{Result, ScryError};
use crate::module::Module;
use crate::object::{FindObjectFlags, Object, QualifiedType, TypeKindSet};
use crate::program::Program;
use crate::symbol::{SymbolIndex, SymbolQuery};
use crate::types::Symbol;

/// Where a newly registered finder lands in the enabled order
///
/// Replaces the sentinel-index encoding some debugger cores use: the three
/// cases are spelled out instead of being squeezed into reserved `usize`
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnablePosition
{
    /// Register without enabling; the entry can be enabled later via
    /// `set_enabled`.
    DontEnable,
    /// Enable as the new highest-priority entry.
    First,
    /// Enable at a zero-based index into the currently enabled subsequence,
    /// inserting before that position. An index past the end appends.
    At(usize),
}

struct FinderEntry<F: ?Sized>
{
    name: String,
    finder: Arc<F>,
}

/// One ordered chain of named strategies
///
/// Generic over the strategy trait object so the registration and
/// enable/disable protocol is written once and shared by all four kinds.
pub struct FinderChain<F: ?Sized>
{
    entries: Vec<FinderEntry<F>>,
    /// Indices into `entries`, highest priority first.
    enabled: SmallVec<[usize; 4]>,
}

impl<F: ?Sized> Default for FinderChain<F>
{
    fn default() -> Self
    {
        Self {
            entries: Vec::new(),
            enabled: SmallVec::new(),
        }
    }
}

impl<F: ?Sized> FinderChain<F>
{
    /// Register a named strategy.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if `name` is already registered in this chain, or
    /// if `position` is `At(i)` with `i` referring into a shorter enabled
    /// subsequence than `i` allows (past-the-end appends, so only truly
    /// unrepresentable positions fail — none do today).
    pub fn register(&mut self, name: &str, finder: Arc<F>, position: EnablePosition) -> Result<()>
    {
        if self.entries.iter().any(|entry| entry.name == name) {
            return Err(ScryError::InvalidArgument(format!(
                "duplicate finder name: {name}"
            )));
        }
        let index = self.entries.len();
        self.entries.push(FinderEntry {
            name: name.to_owned(),
            finder,
        });
        match position {
            EnablePosition::DontEnable => {}
            EnablePosition::First => self.enabled.insert(0, index),
            EnablePosition::At(at) => {
                let at = at.min(self.enabled.len());
                self.enabled.insert(at, index);
            }
        }
        Ok(())
    }

    /// Names of all registered entries, enabled or not, in registration order.
    pub fn registered_names(&self) -> Vec<&str>
    {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    /// Names of the enabled entries in priority order, highest first.
    pub fn enabled_names(&self) -> Vec<&str>
    {
        self.enabled
            .iter()
            .map(|&index| self.entries[index].name.as_str())
            .collect()
    }

    /// Replace the enabled subsequence and its order atomically.
    ///
    /// Entries not named in `names` become disabled. An unknown name is an
    /// error and leaves the chain unchanged.
    pub fn set_enabled<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()>
    {
        let mut new_enabled: SmallVec<[usize; 4]> = SmallVec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let index = self
                .entries
                .iter()
                .position(|entry| entry.name == name)
                .ok_or_else(|| {
                    ScryError::InvalidArgument(format!("finder {name} is not registered"))
                })?;
            if new_enabled.contains(&index) {
                return Err(ScryError::InvalidArgument(format!(
                    "finder {name} listed more than once"
                )));
            }
            new_enabled.push(index);
        }
        self.enabled = new_enabled;
        Ok(())
    }

    /// Enabled strategies in priority order.
    ///
    /// Returns owned `Arc` clones so the caller holds no borrow on the chain
    /// while invoking strategies (a strategy may re-enter the program).
    pub fn enabled_finders(&self) -> Vec<Arc<F>>
    {
        self.enabled
            .iter()
            .map(|&index| Arc::clone(&self.entries[index].finder))
            .collect()
    }

    /// The single enabled strategy, if exactly one is enabled.
    pub fn sole_enabled(&self) -> Option<&Arc<F>>
    {
        match self.enabled.as_slice() {
            [index] => Some(&self.entries[*index].finder),
            _ => None,
        }
    }
}

/// Strategy locating and attaching debug info for a batch of modules
///
/// A finder inspects the modules still wanting debug info and attaches a
/// [`DebugFile`] to each one it can satisfy (via [`Module::try_attach_file`]
/// or [`Module::attach_debug`]). Modules it cannot satisfy are simply left
/// alone for the next finder. Returning an error aborts the whole load.
///
/// [`DebugFile`]: crate::debug_info::DebugFile
/// [`Module::try_attach_file`]: crate::module::Module::try_attach_file
/// [`Module::attach_debug`]: crate::module::Module::attach_debug
pub trait DebugInfoFinder
{
    /// Attempt to find debug info for the given modules.
    fn find(&self, prog: &Program, modules: &[Arc<Module>]) -> Result<()>;
}

/// Strategy resolving a type by name.
pub trait TypeFinder
{
    /// Find a type named `name` whose kind is in `kinds`, optionally
    /// declared in a file matching `filename`.
    ///
    /// `Ok(None)` means "not found, try the next finder"; an error aborts
    /// the chain.
    fn find(
        &self,
        prog: &Program,
        kinds: TypeKindSet,
        name: &str,
        filename: Option<&str>,
    ) -> Result<Option<QualifiedType>>;
}

/// Strategy resolving an object (variable, function, or constant) by name.
pub trait ObjectFinder
{
    /// Find an object named `name` matching `flags`, optionally declared in
    /// a file matching `filename`.
    fn find(
        &self,
        prog: &Program,
        name: &str,
        filename: Option<&str>,
        flags: FindObjectFlags,
    ) -> Result<Option<Object>>;
}

/// Strategy resolving symbols by name and/or address.
pub trait SymbolFinder
{
    /// Find symbols matching the query. An empty vector means "not found".
    ///
    /// When `query.one` is set, the caller wants at most one best match;
    /// returning more than one is an `InvalidArgument` error (enforced by
    /// the chain driver).
    fn find(&self, prog: &Program, query: &SymbolQuery<'_>) -> Result<Vec<Symbol>>;

    /// Downcast hook for the [`SymbolIndex`] fast path.
    ///
    /// The chain driver bypasses generic dispatch when the sole enabled
    /// symbol finder is a prebuilt index. Purely an optimization; the
    /// default of `None` keeps generic dispatch.
    fn as_index(&self) -> Option<&SymbolIndex>
    {
        None
    }
}
