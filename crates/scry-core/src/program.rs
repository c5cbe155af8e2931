//! # Program
//!
//! The aggregate root of the crate: one [`Program`] represents one debug
//! target (a live process, a core dump, or the running kernel) and owns its
//! memory reader, module registry, finder chains, and threads.
//!
//! A program starts empty. Attaching a backing (`set_pid`, `set_core_dump`,
//! `set_kernel`) populates memory segments, modules, and threads; lookups
//! (`find_type`, `find_object`, `symbol_by_name`, ...) then resolve through
//! the finder chains. Every value a lookup produces carries the program's
//! numeric identity, and values from one program are rejected by another.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::coredump;
use crate::debug_info::{
    DebugInfoOptions, StandardDebugInfoFinder, StandardObjectFinder, StandardSymbolFinder,
    StandardTypeFinder, STANDARD_FINDER_NAME,
};
use crate::error::{Result, ScryError};
use crate::finder::{
    DebugInfoFinder, EnablePosition, FinderChain, ObjectFinder, SymbolFinder, TypeFinder,
};
use crate::live;
use crate::memory::{MemoryReader, MemorySegment, SegmentReadFn};
use crate::module::{Module, ModuleKind, ModuleRegistry};
use crate::object::{FindObjectFlags, Object, ProgramId, QualifiedType, TypeKindSet};
use crate::stack;
use crate::symbol::SymbolQuery;
use crate::types::{
    Address, AddressSpace, Language, Platform, ProcessId, ProgramFlags, StackTrace, Symbol,
    Thread, ThreadId,
};

/// One debug target and everything known about it.
pub struct Program
{
    id: ProgramId,
    platform: Platform,
    flags: ProgramFlags,
    language: Language,
    pid: Option<ProcessId>,
    core_dump_path: Option<PathBuf>,
    memory: MemoryReader,
    modules: ModuleRegistry,
    threads: BTreeMap<ThreadId, Thread>,
    debug_info_finders: FinderChain<dyn DebugInfoFinder>,
    type_finders: FinderChain<dyn TypeFinder>,
    object_finders: FinderChain<dyn ObjectFinder>,
    symbol_finders: FinderChain<dyn SymbolFinder>,
    debug_info_options: DebugInfoOptions,
    log_level: tracing::Level,
    progress_reporting: bool,
    cache: HashMap<String, String>,
    config: HashMap<String, String>,
}

impl Program
{
    /// An empty program for the given platform, with the standard finders
    /// registered and enabled in every chain.
    pub fn new(platform: Platform) -> Self
    {
        Self::with_options(platform, DebugInfoOptions::default())
    }

    /// Like [`Program::new`] with explicit debug-info search options.
    pub fn with_options(platform: Platform, options: DebugInfoOptions) -> Self
    {
        let mut debug_info_finders: FinderChain<dyn DebugInfoFinder> = FinderChain::default();
        let mut type_finders: FinderChain<dyn TypeFinder> = FinderChain::default();
        let mut object_finders: FinderChain<dyn ObjectFinder> = FinderChain::default();
        let mut symbol_finders: FinderChain<dyn SymbolFinder> = FinderChain::default();

        // Fresh chains; the standard name cannot collide.
        debug_info_finders
            .register(
                STANDARD_FINDER_NAME,
                Arc::new(StandardDebugInfoFinder::new(options.clone())),
                EnablePosition::First,
            )
            .ok();
        type_finders
            .register(
                STANDARD_FINDER_NAME,
                Arc::new(StandardTypeFinder),
                EnablePosition::First,
            )
            .ok();
        object_finders
            .register(
                STANDARD_FINDER_NAME,
                Arc::new(StandardObjectFinder),
                EnablePosition::First,
            )
            .ok();
        symbol_finders
            .register(
                STANDARD_FINDER_NAME,
                Arc::new(StandardSymbolFinder),
                EnablePosition::First,
            )
            .ok();

        Self {
            id: ProgramId::next(),
            platform,
            flags: ProgramFlags::default(),
            language: Language::default(),
            pid: None,
            core_dump_path: None,
            memory: MemoryReader::new(),
            modules: ModuleRegistry::new(),
            threads: BTreeMap::new(),
            debug_info_finders,
            type_finders,
            object_finders,
            symbol_finders,
            debug_info_options: options,
            log_level: tracing::Level::WARN,
            progress_reporting: false,
            cache: HashMap::new(),
            config: HashMap::new(),
        }
    }

    /// A program attached to the running process with the given PID.
    pub fn from_pid(pid: ProcessId) -> Result<Self>
    {
        let mut prog = Self::new(Platform::host());
        prog.set_pid(pid)?;
        Ok(prog)
    }

    /// A program backed by an ELF core dump.
    pub fn from_core_dump(path: &Path) -> Result<Self>
    {
        let mut prog = Self::new(Platform::host());
        prog.set_core_dump(path)?;
        Ok(prog)
    }

    /// A program attached to the running kernel via `/proc/kcore`.
    pub fn from_kernel() -> Result<Self>
    {
        let mut prog = Self::new(Platform::host());
        prog.set_kernel()?;
        Ok(prog)
    }

    fn ensure_no_backing(&self) -> Result<()>
    {
        if self.pid.is_some() || self.core_dump_path.is_some() || self.flags.is_linux_kernel {
            return Err(ScryError::InvalidArgument(
                "program already has a target backing".to_owned(),
            ));
        }
        Ok(())
    }

    /// Attach a live process: maps its memory, creates modules for the
    /// executable, every file-backed mapping, and the vDSO, and enumerates
    /// threads.
    pub fn set_pid(&mut self, pid: ProcessId) -> Result<()>
    {
        self.ensure_no_backing()?;

        for segment in live::memory_segments(pid)? {
            self.memory.add_segment(segment);
        }

        let exe = live::executable_path(pid)?;
        let exe_name = exe.to_string_lossy().into_owned();
        let maps = live::read_maps(pid)?;
        for (path, start, end) in live::file_mappings(&maps) {
            let name = path.to_string_lossy().into_owned();
            let (module, _) = if name == exe_name {
                self.modules.find_or_create_main(self.id, &name)?
            } else if name == live::VDSO_NAME {
                self.modules.find_or_create(self.id, ModuleKind::Vdso, &name, start)?
            } else {
                self.modules
                    .find_or_create(self.id, ModuleKind::SharedLibrary, &name, start)?
            };
            module.set_address_range(Address::new(start), Address::new(end))?;
        }

        for thread in live::threads(pid)? {
            self.threads.insert(thread.tid, thread);
        }

        self.pid = Some(pid);
        self.flags.is_live = true;
        info!(pid = u32::from(pid), "attached to live process");
        Ok(())
    }

    /// Attach a core dump: its loadable segments become the program's
    /// virtual memory and its platform replaces the constructor's.
    pub fn set_core_dump(&mut self, path: &Path) -> Result<()>
    {
        self.ensure_no_backing()?;

        let layout = coredump::load_core(path, AddressSpace::Virtual)?;
        self.platform = layout.platform;
        for segment in layout.segments {
            self.memory.add_segment(segment);
        }
        self.core_dump_path = Some(path.to_owned());
        info!(path = %path.display(), "attached core dump");
        Ok(())
    }

    /// Attach the running kernel through `/proc/kcore`.
    pub fn set_kernel(&mut self) -> Result<()>
    {
        self.ensure_no_backing()?;

        let layout = coredump::load_core(Path::new("/proc/kcore"), AddressSpace::Virtual)?;
        self.platform = layout.platform;
        for segment in layout.segments {
            self.memory.add_segment(segment);
        }
        self.flags.is_linux_kernel = true;
        self.flags.is_live = true;
        info!("attached running kernel");
        Ok(())
    }

    /// Stable numeric identity used for cross-program checks.
    pub fn id(&self) -> ProgramId
    {
        self.id
    }

    /// Target platform.
    pub fn platform(&self) -> Platform
    {
        self.platform
    }

    /// Target kind flags.
    pub fn flags(&self) -> ProgramFlags
    {
        self.flags
    }

    /// Assumed source language for lookups and presentation.
    pub fn language(&self) -> Language
    {
        self.language
    }

    /// Override the assumed source language.
    pub fn set_language(&mut self, language: Language)
    {
        self.language = language;
    }

    /// PID of the attached live process, if any.
    pub fn pid(&self) -> Option<ProcessId>
    {
        self.pid
    }

    /// Path of the attached core dump, if any.
    pub fn core_dump_path(&self) -> Option<&Path>
    {
        self.core_dump_path.as_deref()
    }

    /// Verbosity threshold for consumers that surface program activity.
    pub fn log_level(&self) -> tracing::Level
    {
        self.log_level
    }

    /// Set the verbosity threshold.
    pub fn set_log_level(&mut self, level: tracing::Level)
    {
        self.log_level = level;
    }

    /// Whether long-running operations should report progress.
    pub fn progress_reporting(&self) -> bool
    {
        self.progress_reporting
    }

    /// Toggle progress reporting for long-running operations.
    pub fn set_progress_reporting(&mut self, enabled: bool)
    {
        self.progress_reporting = enabled;
    }

    /// Caller-extensible scratch map, never interpreted by the core.
    pub fn cache(&self) -> &HashMap<String, String>
    {
        &self.cache
    }

    /// Mutable access to the scratch map.
    pub fn cache_mut(&mut self) -> &mut HashMap<String, String>
    {
        &mut self.cache
    }

    /// Caller-extensible configuration map, never interpreted by the core.
    pub fn config(&self) -> &HashMap<String, String>
    {
        &self.config
    }

    /// Mutable access to the configuration map.
    pub fn config_mut(&mut self) -> &mut HashMap<String, String>
    {
        &mut self.config
    }

    fn check_same_program(&self, other: ProgramId, what: &str) -> Result<()>
    {
        if other == self.id {
            Ok(())
        } else {
            Err(ScryError::InvalidArgument(format!(
                "{what} is from a different program"
            )))
        }
    }

    // ---- memory ----

    /// Register a memory segment covering `[address, address + size)`.
    ///
    /// Later registrations shadow earlier overlapping ones.
    pub fn add_memory_segment(
        &mut self,
        address: Address,
        size: u64,
        space: AddressSpace,
        read_fn: SegmentReadFn,
    )
    {
        self.memory
            .add_segment(MemorySegment::new(address, size, space, read_fn));
    }

    /// Read `size` bytes of target memory.
    pub fn read(&self, address: Address, size: u64, space: AddressSpace) -> Result<Vec<u8>>
    {
        self.memory.read(address, size, space)
    }

    /// Read an unsigned 8-bit integer from virtual memory.
    pub fn read_u8(&self, address: Address) -> Result<u8>
    {
        self.read_uint(address, 1).map(|value| value as u8)
    }

    /// Read an unsigned 16-bit integer from virtual memory.
    pub fn read_u16(&self, address: Address) -> Result<u16>
    {
        self.read_uint(address, 2).map(|value| value as u16)
    }

    /// Read an unsigned 32-bit integer from virtual memory.
    pub fn read_u32(&self, address: Address) -> Result<u32>
    {
        self.read_uint(address, 4).map(|value| value as u32)
    }

    /// Read an unsigned 64-bit integer from virtual memory.
    pub fn read_u64(&self, address: Address) -> Result<u64>
    {
        self.read_uint(address, 8)
    }

    /// Read one machine word from virtual memory, sized per the platform.
    pub fn read_word(&self, address: Address) -> Result<u64>
    {
        self.read_uint(address, self.platform.word_size())
    }

    fn read_uint(&self, address: Address, width: u8) -> Result<u64>
    {
        self.memory
            .read_uint(address, width, AddressSpace::Virtual, self.platform.byte_order())
    }

    // ---- modules ----

    /// Find or create the main module. At most one exists; recreating it
    /// under a different name is an error.
    pub fn find_or_create_main_module(&mut self, name: &str) -> Result<(Arc<Module>, bool)>
    {
        self.modules.find_or_create_main(self.id, name)
    }

    /// Find or create a shared library module keyed by its dynamic-link
    /// address.
    pub fn find_or_create_shared_library_module(
        &mut self,
        name: &str,
        dynamic_address: Address,
    ) -> Result<(Arc<Module>, bool)>
    {
        self.modules
            .find_or_create(self.id, ModuleKind::SharedLibrary, name, dynamic_address.value())
    }

    /// Find or create the vDSO module keyed by its dynamic-link address.
    pub fn find_or_create_vdso_module(
        &mut self,
        name: &str,
        dynamic_address: Address,
    ) -> Result<(Arc<Module>, bool)>
    {
        self.modules
            .find_or_create(self.id, ModuleKind::Vdso, name, dynamic_address.value())
    }

    /// Find or create a relocatable module keyed by its load address.
    pub fn find_or_create_relocatable_module(
        &mut self,
        name: &str,
        address: Address,
    ) -> Result<(Arc<Module>, bool)>
    {
        self.modules
            .find_or_create(self.id, ModuleKind::Relocatable, name, address.value())
    }

    /// Find or create a Linux kernel loadable module keyed by its base
    /// address.
    pub fn find_or_create_linux_kernel_loadable_module(
        &mut self,
        name: &str,
        address: Address,
    ) -> Result<(Arc<Module>, bool)>
    {
        self.modules
            .find_or_create(self.id, ModuleKind::LinuxKernelLoadable, name, address.value())
    }

    /// Find or create an extra (caller-defined) module keyed by a numeric
    /// id.
    pub fn find_or_create_extra_module(
        &mut self,
        name: &str,
        id: u64,
    ) -> Result<(Arc<Module>, bool)>
    {
        self.modules.find_or_create(self.id, ModuleKind::Extra, name, id)
    }

    /// The main module.
    ///
    /// ## Errors
    ///
    /// `Lookup` if no main module has been created.
    pub fn main_module(&self) -> Result<Arc<Module>>
    {
        self.modules
            .main()
            .ok_or_else(|| ScryError::Lookup("no main module".to_owned()))
    }

    /// Module matching `name`.
    pub fn module_by_name(&self, name: &str) -> Result<Arc<Module>>
    {
        self.modules
            .find_by_name(name)
            .ok_or_else(|| ScryError::Lookup(format!("no module named {name}")))
    }

    /// Module whose mapped range contains `address`.
    pub fn module_by_address(&self, address: Address) -> Result<Arc<Module>>
    {
        self.modules
            .find_by_address(address)
            .ok_or_else(|| ScryError::Lookup(format!("no module at {address}")))
    }

    /// All known modules, in creation order.
    pub fn modules(&self) -> Vec<Arc<Module>>
    {
        self.modules.all()
    }

    /// Only the modules confirmed loaded into the target's address space.
    pub fn loaded_modules(&self) -> Vec<Arc<Module>>
    {
        self.modules.loaded()
    }

    // ---- finder chains ----

    /// Register a named debug-info finder.
    pub fn register_debug_info_finder(
        &mut self,
        name: &str,
        finder: Arc<dyn DebugInfoFinder>,
        position: EnablePosition,
    ) -> Result<()>
    {
        self.debug_info_finders.register(name, finder, position)
    }

    /// Names of all registered debug-info finders.
    pub fn registered_debug_info_finders(&self) -> Vec<&str>
    {
        self.debug_info_finders.registered_names()
    }

    /// Replace the enabled debug-info finders with `names`, in priority
    /// order.
    pub fn set_enabled_debug_info_finders<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()>
    {
        self.debug_info_finders.set_enabled(names)
    }

    /// Names of the enabled debug-info finders, highest priority first.
    pub fn enabled_debug_info_finders(&self) -> Vec<&str>
    {
        self.debug_info_finders.enabled_names()
    }

    /// Register a named type finder.
    pub fn register_type_finder(
        &mut self,
        name: &str,
        finder: Arc<dyn TypeFinder>,
        position: EnablePosition,
    ) -> Result<()>
    {
        self.type_finders.register(name, finder, position)
    }

    /// Names of all registered type finders.
    pub fn registered_type_finders(&self) -> Vec<&str>
    {
        self.type_finders.registered_names()
    }

    /// Replace the enabled type finders with `names`, in priority order.
    pub fn set_enabled_type_finders<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()>
    {
        self.type_finders.set_enabled(names)
    }

    /// Names of the enabled type finders, highest priority first.
    pub fn enabled_type_finders(&self) -> Vec<&str>
    {
        self.type_finders.enabled_names()
    }

    /// Register a named object finder.
    pub fn register_object_finder(
        &mut self,
        name: &str,
        finder: Arc<dyn ObjectFinder>,
        position: EnablePosition,
    ) -> Result<()>
    {
        self.object_finders.register(name, finder, position)
    }

    /// Names of all registered object finders.
    pub fn registered_object_finders(&self) -> Vec<&str>
    {
        self.object_finders.registered_names()
    }

    /// Replace the enabled object finders with `names`, in priority order.
    pub fn set_enabled_object_finders<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()>
    {
        self.object_finders.set_enabled(names)
    }

    /// Names of the enabled object finders, highest priority first.
    pub fn enabled_object_finders(&self) -> Vec<&str>
    {
        self.object_finders.enabled_names()
    }

    /// Register a named symbol finder.
    pub fn register_symbol_finder(
        &mut self,
        name: &str,
        finder: Arc<dyn SymbolFinder>,
        position: EnablePosition,
    ) -> Result<()>
    {
        self.symbol_finders.register(name, finder, position)
    }

    /// Names of all registered symbol finders.
    pub fn registered_symbol_finders(&self) -> Vec<&str>
    {
        self.symbol_finders.registered_names()
    }

    /// Replace the enabled symbol finders with `names`, in priority order.
    pub fn set_enabled_symbol_finders<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()>
    {
        self.symbol_finders.set_enabled(names)
    }

    /// Names of the enabled symbol finders, highest priority first.
    pub fn enabled_symbol_finders(&self) -> Vec<&str>
    {
        self.symbol_finders.enabled_names()
    }

    // ---- debug info loading ----

    /// Load debug information.
    ///
    /// Explicit `paths` attach to the module they name (or the main module
    /// when no name matches). With `default`, debug info is searched for
    /// every known module; with `main` (implied by `default`), the main
    /// module's debug info is mandatory. Per-module failures are recorded on
    /// the modules rather than aborting the batch; already-loaded modules
    /// are skipped, so reloading is idempotent.
    ///
    /// ## Errors
    ///
    /// `MissingDebugInfo` if `main` is set and the main module still lacks
    /// debug info afterwards.
    pub fn load_debug_info(&mut self, paths: &[PathBuf], default: bool, main: bool) -> Result<()>
    {
        let main = main || default;

        for path in paths {
            let name = path.to_string_lossy();
            let module = match self.modules.find_by_name(&name) {
                Some(module) => module,
                None => match self.modules.main() {
                    Some(module) => module,
                    None => {
                        let (module, _) =
                            self.modules
                                .find_or_create(self.id, ModuleKind::Extra, &name, 0)?;
                        module
                    }
                },
            };
            match module.try_attach_file(path) {
                Ok(true) => {}
                Ok(false) => module.set_debug_info_error(format!(
                    "no such file: {}",
                    path.display()
                )),
                Err(err) => module.set_debug_info_error(err.to_string()),
            }
        }

        let wanted: Vec<Arc<Module>> = if default {
            self.modules.all()
        } else if main {
            self.modules.main().into_iter().collect()
        } else {
            Vec::new()
        };
        self.run_debug_info_finders(&wanted)?;

        if main {
            let main_module = self
                .modules
                .main()
                .ok_or_else(|| ScryError::MissingDebugInfo("no main module".to_owned()))?;
            if main_module.wants_debug_info() {
                let detail = main_module
                    .debug_info_error()
                    .unwrap_or_else(|| "no finder could provide it".to_owned());
                return Err(ScryError::MissingDebugInfo(format!(
                    "main module {}: {detail}",
                    main_module.name()
                )));
            }
        }
        Ok(())
    }

    /// Load debug information for specific modules.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if any module belongs to a different program.
    pub fn load_module_debug_info(&mut self, modules: &[Arc<Module>]) -> Result<()>
    {
        for module in modules {
            self.check_same_program(module.program(), "module")?;
        }
        self.run_debug_info_finders(modules)
    }

    fn run_debug_info_finders(&self, modules: &[Arc<Module>]) -> Result<()>
    {
        if modules.is_empty() {
            return Ok(());
        }
        for finder in self.debug_info_finders.enabled_finders() {
            let wanting: Vec<Arc<Module>> = modules
                .iter()
                .filter(|module| module.wants_debug_info())
                .cloned()
                .collect();
            if wanting.is_empty() {
                break;
            }
            finder.find(self, &wanting)?;
        }
        let loaded = modules.iter().filter(|module| !module.wants_debug_info()).count();
        debug!(requested = modules.len(), loaded, "debug info load pass finished");
        Ok(())
    }

    // ---- lookups ----

    /// Find a type by name, any kind.
    pub fn find_type(&self, name: &str, filename: Option<&str>) -> Result<QualifiedType>
    {
        self.find_type_kinds(TypeKindSet::all(), name, filename)
    }

    /// Find a type by name, restricted to the given kinds.
    ///
    /// ## Errors
    ///
    /// `NotFound` when every enabled type finder declines.
    pub fn find_type_kinds(
        &self,
        kinds: TypeKindSet,
        name: &str,
        filename: Option<&str>,
    ) -> Result<QualifiedType>
    {
        for finder in self.type_finders.enabled_finders() {
            if let Some(found) = finder.find(self, kinds, name, filename)? {
                return Ok(found);
            }
        }
        Err(ScryError::NotFound(format!("type {name}")))
    }

    /// Find an object (variable, function, or constant) by name.
    ///
    /// ## Errors
    ///
    /// [`ScryError::ObjectNotFound`] carrying the queried name when every
    /// enabled object finder declines.
    pub fn find_object(
        &self,
        name: &str,
        filename: Option<&str>,
        flags: FindObjectFlags,
    ) -> Result<Object>
    {
        for finder in self.object_finders.enabled_finders() {
            if let Some(found) = finder.find(self, name, filename, flags)? {
                return Ok(found);
            }
        }
        Err(ScryError::ObjectNotFound {
            name: name.to_owned(),
        })
    }

    /// Whether an object named `name` exists in the target.
    ///
    /// Not-found outcomes become `false`; hard lookup failures still
    /// propagate.
    pub fn contains(&self, name: &str) -> Result<bool>
    {
        match self.find_object(name, None, FindObjectFlags::ANY) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Size in bytes of a type resolved by this program.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` for a type from a different program, `Lookup` for
    /// an incomplete type with no size.
    pub fn type_size(&self, type_: &QualifiedType) -> Result<u64>
    {
        self.check_same_program(type_.program(), "type")?;
        type_
            .info
            .size
            .ok_or_else(|| ScryError::Lookup(format!("type {} has no size", type_.info.name)))
    }

    // ---- symbols ----

    fn run_symbol_query(&self, query: &SymbolQuery<'_>) -> Result<Vec<Symbol>>
    {
        // When the sole enabled finder is a prebuilt index, skip dispatch
        // and query it directly.
        if let Some(sole) = self.symbol_finders.sole_enabled() {
            if let Some(index) = sole.as_index() {
                return Ok(index.query(query));
            }
        }

        for finder in self.symbol_finders.enabled_finders() {
            let results = finder.find(self, query)?;
            if query.one && results.len() > 1 {
                return Err(ScryError::InvalidArgument(
                    "symbol finder returned multiple symbols when one was requested".to_owned(),
                ));
            }
            if !results.is_empty() {
                return Ok(results);
            }
        }
        Ok(Vec::new())
    }

    /// The symbol named `name`.
    ///
    /// ## Errors
    ///
    /// `NotFound` if no enabled symbol finder knows the name,
    /// `InvalidArgument` if a finder returns several candidates.
    pub fn symbol_by_name(&self, name: &str) -> Result<Symbol>
    {
        let query = SymbolQuery {
            name: Some(name),
            address: None,
            one: true,
        };
        self.run_symbol_query(&query)?
            .into_iter()
            .next()
            .ok_or_else(|| ScryError::NotFound(format!("symbol {name}")))
    }

    /// The symbol containing `address`.
    pub fn symbol_by_address(&self, address: Address) -> Result<Symbol>
    {
        let query = SymbolQuery {
            name: None,
            address: Some(address),
            one: true,
        };
        self.run_symbol_query(&query)?
            .into_iter()
            .next()
            .ok_or_else(|| ScryError::NotFound(format!("symbol at {address}")))
    }

    /// All symbols matching the optional name and address filters. With no
    /// filters, every symbol the enabled finders know.
    pub fn symbols(
        &self,
        name: Option<&str>,
        address: Option<Address>,
    ) -> Result<Vec<Symbol>>
    {
        let query = SymbolQuery {
            name,
            address,
            one: false,
        };
        self.run_symbol_query(&query)
    }

    // ---- threads ----

    /// Inject or replace a thread (e.g. registers captured by an external
    /// tracer).
    pub fn add_thread(&mut self, thread: Thread)
    {
        self.threads.insert(thread.tid, thread);
    }

    /// All known threads, ordered by id.
    pub fn threads(&self) -> Vec<Thread>
    {
        self.threads.values().copied().collect()
    }

    /// The thread with the given id.
    ///
    /// ## Errors
    ///
    /// `Lookup` if the thread is unknown.
    pub fn thread(&self, tid: ThreadId) -> Result<Thread>
    {
        self.threads
            .get(&tid)
            .copied()
            .ok_or_else(|| ScryError::Lookup(format!("no thread {}", tid.raw())))
    }

    /// The main thread: for a live process the thread whose id equals the
    /// PID, otherwise the lowest-id thread.
    pub fn main_thread(&self) -> Result<Thread>
    {
        if let Some(pid) = self.pid {
            if let Some(thread) = self.threads.get(&ThreadId(u64::from(u32::from(pid)))) {
                return Ok(*thread);
            }
        }
        self.threads
            .values()
            .next()
            .copied()
            .ok_or_else(|| ScryError::Lookup("no threads".to_owned()))
    }

    /// The thread that caused the target to crash. Only meaningful for core
    /// dumps.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` for live targets, `Lookup` when no thread is
    /// marked crashed.
    pub fn crashed_thread(&self) -> Result<Thread>
    {
        if self.flags.is_live {
            return Err(ScryError::InvalidArgument(
                "crashed thread is only meaningful for core dumps".to_owned(),
            ));
        }
        self.threads
            .values()
            .find(|thread| thread.crashed)
            .copied()
            .ok_or_else(|| ScryError::Lookup("no crashed thread".to_owned()))
    }

    // ---- stack traces ----

    /// Walk the stack of the thread with the given id.
    pub fn stack_trace(&self, tid: ThreadId) -> Result<StackTrace>
    {
        let thread = self.thread(tid)?;
        stack::unwind(self, &thread)
    }

    /// Symbolize a caller-provided list of program counters into a trace.
    pub fn stack_trace_from_pcs(&self, pcs: &[Address]) -> StackTrace
    {
        stack::trace_from_pcs(self, pcs)
    }

    /// Best-effort symbol for a frame's program counter.
    pub(crate) fn frame_symbol(&self, pc: Address) -> Option<Symbol>
    {
        let query = SymbolQuery {
            name: None,
            address: Some(pc),
            one: true,
        };
        self.run_symbol_query(&query).ok()?.into_iter().next()
    }

    /// Best-effort source location for a frame's program counter.
    pub(crate) fn frame_source(&self, pc: Address) -> Option<(String, u32)>
    {
        let module = self.modules.find_by_address(pc)?;
        let file = module.debug_file()?;
        let file_address = pc.value().wrapping_sub(module.load_bias());
        file.source_location(file_address)
    }

    /// The debug-info search options this program was created with.
    pub fn debug_info_options(&self) -> &DebugInfoOptions
    {
        &self.debug_info_options
    }
}

impl std::fmt::Debug for Program
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("Program")
            .field("id", &self.id)
            .field("platform", &self.platform)
            .field("flags", &self.flags)
            .field("modules", &self.modules.all().len())
            .field("threads", &self.threads.len())
            .finish_non_exhaustive()
    }
}
