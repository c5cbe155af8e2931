//! # Module Registry
//!
//! Tracks the loadable binary units known to a [`Program`]: the main
//! executable, shared libraries, the vDSO, relocatable objects, kernel
//! modules, and caller-injected "extra" modules.
//!
//! Module identity is the `(kind, name, key)` tuple, where the key is the
//! kind-specific disambiguator (dynamic-link address, load address, or
//! numeric id). Find-or-create calls return the existing module when one
//! matches, so handles are stable: a [`Module`] handle stays valid for the
//! life of its program.
//!
//! A module can be *known* (created) without being *loaded* (confirmed
//! mapped into the target's address space); the registry exposes both views.
//!
//! [`Program`]: crate::program::Program

use std::fmt;
use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::debug_info::DebugFile;
use crate::error::{Result, ScryError};
use crate::object::ProgramId;
use crate::types::Address;

/// Category of a loadable binary unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind
{
    /// The main executable. At most one per program.
    Main,
    /// A dynamically linked shared library.
    SharedLibrary,
    /// The virtual dynamic shared object mapped by the kernel.
    Vdso,
    /// A relocatable object (e.g. a kernel module loaded at a fixed address).
    Relocatable,
    /// A Linux kernel loadable module.
    LinuxKernelLoadable,
    /// A synthetic or caller-injected module.
    Extra,
}

impl fmt::Display for ModuleKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            ModuleKind::Main => "main",
            ModuleKind::SharedLibrary => "shared library",
            ModuleKind::Vdso => "vdso",
            ModuleKind::Relocatable => "relocatable",
            ModuleKind::LinuxKernelLoadable => "linux kernel loadable",
            ModuleKind::Extra => "extra",
        };
        write!(f, "{label}")
    }
}

/// One loadable binary unit known to a Program
///
/// Handles are `Arc`-shared and non-owning in spirit: the registry keeps
/// modules alive for the program's lifetime, and identity fields never
/// change after creation. Mutable state (mapped range, attached debug info,
/// load error) lives behind interior locks so lookups can update it lazily.
pub struct Module
{
    program: ProgramId,
    kind: ModuleKind,
    name: String,
    /// Kind-specific disambiguator: dynamic-link address for shared
    /// libraries and the vDSO, load address for relocatable and kernel
    /// modules, numeric id for extra modules. Zero for the main module.
    key: u64,
    address_range: RwLock<Option<(u64, u64)>>,
    build_id: RwLock<Option<Vec<u8>>>,
    debug: OnceCell<Arc<DebugFile>>,
    load_error: RwLock<Option<String>>,
}

impl Module
{
    fn new(program: ProgramId, kind: ModuleKind, name: String, key: u64) -> Self
    {
        Self {
            program,
            kind,
            name,
            key,
            address_range: RwLock::new(None),
            build_id: RwLock::new(None),
            debug: OnceCell::new(),
            load_error: RwLock::new(None),
        }
    }

    /// Program this module belongs to.
    pub fn program(&self) -> ProgramId
    {
        self.program
    }

    /// Module kind.
    pub fn kind(&self) -> ModuleKind
    {
        self.kind
    }

    /// Identifying name (path or synthetic name).
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Kind-specific identity key (address or id; 0 for the main module).
    pub fn key(&self) -> u64
    {
        self.key
    }

    /// The mapped address range, if the module is confirmed loaded.
    pub fn address_range(&self) -> Option<(u64, u64)>
    {
        *self.address_range.read().unwrap()
    }

    /// Mark the module as loaded at `[start, end)`.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if `start >= end`.
    pub fn set_address_range(&self, start: Address, end: Address) -> Result<()>
    {
        if start >= end {
            return Err(ScryError::InvalidArgument(format!(
                "empty module address range {start}..{end}"
            )));
        }
        *self.address_range.write().unwrap() = Some((start.value(), end.value()));
        Ok(())
    }

    /// Whether the module is confirmed mapped into the target.
    pub fn is_loaded(&self) -> bool
    {
        self.address_range().is_some()
    }

    /// Whether `address` falls inside the module's mapped range.
    pub fn contains_address(&self, address: Address) -> bool
    {
        match self.address_range() {
            Some((start, end)) => address.value() >= start && address.value() < end,
            None => false,
        }
    }

    /// Build id recorded for this module, if any.
    pub fn build_id(&self) -> Option<Vec<u8>>
    {
        self.build_id.read().unwrap().clone()
    }

    /// Record the module's build id (used by the standard debug-info finder).
    pub fn set_build_id(&self, build_id: Vec<u8>)
    {
        *self.build_id.write().unwrap() = Some(build_id);
    }

    /// The attached debug info, once loaded.
    pub fn debug_file(&self) -> Option<Arc<DebugFile>>
    {
        self.debug.get().cloned()
    }

    /// Wrapping offset added to a debug-file virtual address to get the
    /// runtime address (zero until both the mapped range and debug info are
    /// known).
    pub fn load_bias(&self) -> u64
    {
        match (self.address_range(), self.debug_file()) {
            (Some((start, _)), Some(file)) => start.wrapping_sub(file.first_load_address()),
            _ => 0,
        }
    }

    /// Whether the module still wants debug info loaded.
    pub fn wants_debug_info(&self) -> bool
    {
        self.debug.get().is_none()
    }

    /// Attach parsed debug info. Idempotent: a second attach is a no-op.
    pub fn attach_debug(&self, file: Arc<DebugFile>)
    {
        if self.debug.set(file).is_ok() {
            *self.load_error.write().unwrap() = None;
            debug!(module = %self.name, "attached debug info");
        }
    }

    /// Try to parse `path` and attach it as this module's debug info.
    ///
    /// Returns `Ok(true)` on success (or if debug info was already
    /// attached), `Ok(false)` if the file doesn't exist, and an error if it
    /// exists but cannot be parsed.
    pub fn try_attach_file(&self, path: &std::path::Path) -> Result<bool>
    {
        if !self.wants_debug_info() {
            return Ok(true);
        }
        if !path.exists() {
            return Ok(false);
        }
        let file = DebugFile::open(path)?;
        if let Some(build_id) = file.build_id() {
            self.set_build_id(build_id.to_vec());
        }
        self.attach_debug(Arc::new(file));
        Ok(true)
    }

    /// The error recorded by the most recent failed debug-info load.
    pub fn debug_info_error(&self) -> Option<String>
    {
        self.load_error.read().unwrap().clone()
    }

    /// Record a per-module debug-info load failure.
    pub fn set_debug_info_error(&self, message: String)
    {
        *self.load_error.write().unwrap() = Some(message);
    }
}

impl fmt::Debug for Module
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Module")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("key", &self.key)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

/// Registry of all modules known to one program.
#[derive(Default)]
pub struct ModuleRegistry
{
    modules: Vec<Arc<Module>>,
}

impl ModuleRegistry
{
    pub(crate) fn new() -> Self
    {
        Self::default()
    }

    fn find(&self, kind: ModuleKind, name: &str, key: u64) -> Option<Arc<Module>>
    {
        self.modules
            .iter()
            .find(|module| module.kind == kind && module.name == name && module.key == key)
            .cloned()
    }

    fn create(&mut self, program: ProgramId, kind: ModuleKind, name: &str, key: u64) -> Arc<Module>
    {
        debug!(%kind, name, key, "creating module");
        let module = Arc::new(Module::new(program, kind, name.to_owned(), key));
        self.modules.push(Arc::clone(&module));
        module
    }

    /// Find or create the main module.
    ///
    /// At most one main module exists; a create with a different name than
    /// the existing one is an `InvalidArgument`.
    pub fn find_or_create_main(
        &mut self,
        program: ProgramId,
        name: &str,
    ) -> Result<(Arc<Module>, bool)>
    {
        if let Some(existing) = self.main() {
            if existing.name() != name {
                return Err(ScryError::InvalidArgument(format!(
                    "main module already created as {}, cannot recreate as {name}",
                    existing.name()
                )));
            }
            return Ok((existing, false));
        }
        Ok((self.create(program, ModuleKind::Main, name, 0), true))
    }

    /// The main module, if created.
    pub fn main(&self) -> Option<Arc<Module>>
    {
        self.modules
            .iter()
            .find(|module| module.kind == ModuleKind::Main)
            .cloned()
    }

    /// Find or create a non-main module keyed by `(kind, name, key)`.
    pub fn find_or_create(
        &mut self,
        program: ProgramId,
        kind: ModuleKind,
        name: &str,
        key: u64,
    ) -> Result<(Arc<Module>, bool)>
    {
        if kind == ModuleKind::Main {
            return self.find_or_create_main(program, name);
        }
        if let Some(existing) = self.find(kind, name, key) {
            return Ok((existing, false));
        }
        Ok((self.create(program, kind, name, key), true))
    }

    /// Find an existing non-main module by its identity tuple.
    pub fn find_exact(&self, kind: ModuleKind, name: &str, key: u64) -> Option<Arc<Module>>
    {
        self.find(kind, name, key)
    }

    /// First module whose name matches.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<Module>>
    {
        self.modules.iter().find(|module| module.name == name).cloned()
    }

    /// Module whose mapped range contains `address`.
    pub fn find_by_address(&self, address: Address) -> Option<Arc<Module>>
    {
        self.modules
            .iter()
            .find(|module| module.contains_address(address))
            .cloned()
    }

    /// All known modules, in creation order.
    pub fn all(&self) -> Vec<Arc<Module>>
    {
        self.modules.clone()
    }

    /// Only the modules confirmed loaded into the address space.
    pub fn loaded(&self) -> Vec<Arc<Module>>
    {
        self.modules
            .iter()
            .filter(|module| module.is_loaded())
            .cloned()
            .collect()
    }
}
