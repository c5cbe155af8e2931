//! Symbol queries and the prebuilt symbol index.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::error::Result;
use crate::finder::SymbolFinder;
use crate::program::Program;
use crate::types::{Address, Symbol};

/// One symbol lookup as seen by a symbol finder
///
/// At least one of `name` and `address` is set. `one` requests at most a
/// single best match; a finder returning several results when `one` is set
/// is an error.
#[derive(Debug, Clone, Copy)]
pub struct SymbolQuery<'a>
{
    /// Name to match exactly, if the lookup was by name.
    pub name: Option<&'a str>,
    /// Address to match, if the lookup was by address.
    pub address: Option<Address>,
    /// Whether at most one result is wanted.
    pub one: bool,
}

/// Prebuilt index over a fixed set of symbols
///
/// Useful when a caller already has a symbol table (e.g. extracted from a
/// format this core doesn't parse) and wants efficient lookups without
/// writing a finder. Registering an index as the *sole enabled* symbol
/// finder lets the chain query it directly, skipping generic dispatch.
///
/// Symbols are stored sorted by address; name lookups go through a side
/// table.
pub struct SymbolIndex
{
    by_address: Vec<Symbol>,
    by_name: HashMap<String, SmallVec<[usize; 1]>>,
    /// Largest symbol size in the index; bounds the backward scan in
    /// address lookups.
    max_size: u64,
}

impl SymbolIndex
{
    /// Build an index from a set of symbols.
    pub fn new(mut symbols: Vec<Symbol>) -> Self
    {
        symbols.sort_by_key(|symbol| symbol.address);
        let mut by_name: HashMap<String, SmallVec<[usize; 1]>> = HashMap::new();
        for (index, symbol) in symbols.iter().enumerate() {
            by_name.entry(symbol.name.clone()).or_default().push(index);
        }
        let max_size = symbols.iter().map(|symbol| symbol.size).max().unwrap_or(0);
        Self {
            by_address: symbols,
            by_name,
            max_size,
        }
    }

    /// Number of indexed symbols.
    pub fn len(&self) -> usize
    {
        self.by_address.len()
    }

    /// Returns `true` if the index holds no symbols.
    pub fn is_empty(&self) -> bool
    {
        self.by_address.is_empty()
    }

    /// All symbols matching `name`.
    pub fn find_by_name(&self, name: &str) -> Vec<Symbol>
    {
        self.by_name
            .get(name)
            .map(|indices| {
                indices
                    .iter()
                    .map(|&index| self.by_address[index].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All symbols whose range contains `address`.
    pub fn find_by_address(&self, address: Address) -> Vec<Symbol>
    {
        // Candidates start at or before the address; walk backwards from the
        // partition point until symbols can no longer reach it.
        let partition = self.by_address.partition_point(|symbol| symbol.address <= address);
        let mut matches = Vec::new();
        for symbol in self.by_address[..partition].iter().rev() {
            if symbol.contains(address) {
                matches.push(symbol.clone());
            }
            // A small symbol nested inside a larger one can end before the
            // address while the enclosing one still contains it, so keep
            // walking until no symbol in the index could reach this far.
            if address.value().saturating_sub(symbol.address.value()) > self.max_size {
                break;
            }
        }
        matches
    }

    /// Resolve a query directly against the index.
    ///
    /// The `one` flag picks the best match (innermost containing symbol for
    /// address lookups, first registered for name lookups) instead of
    /// returning everything, so the "multiple when one requested" error
    /// cannot arise from an index.
    pub fn query(&self, query: &SymbolQuery<'_>) -> Vec<Symbol>
    {
        let mut matches = match (query.name, query.address) {
            (Some(name), Some(address)) => {
                let mut found = self.find_by_name(name);
                found.retain(|symbol| symbol.contains(address));
                found
            }
            (Some(name), None) => self.find_by_name(name),
            (None, Some(address)) => self.find_by_address(address),
            (None, None) => self.by_address.clone(),
        };
        if query.one {
            matches.truncate(1);
        }
        matches
    }
}

impl SymbolFinder for SymbolIndex
{
    fn find(&self, _prog: &Program, query: &SymbolQuery<'_>) -> Result<Vec<Symbol>>
    {
        Ok(self.query(query))
    }

    fn as_index(&self) -> Option<&SymbolIndex>
    {
        Some(self)
    }
}
