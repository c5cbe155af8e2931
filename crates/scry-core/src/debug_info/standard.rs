use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::debug_info::{DebugFile, DebugInfoOptions};
use crate::error::Result;
use crate::finder::{DebugInfoFinder, ObjectFinder, SymbolFinder, TypeFinder};
use crate::module::Module;
use crate::object::{
    FindObjectFlags, Object, ObjectKind, ObjectRepr, QualifiedType, TypeInfo, TypeKind,
    TypeKindSet,
};
use crate::program::Program;
use crate::symbol::SymbolQuery;
use crate::types::{Address, Symbol};

/// The built-in debug-info finder, registered under the name `"standard"`
///
/// Searches, in order: the module's own path, build-id stores under the
/// configured directories, then detached `.debug` files next to the binary
/// and under the configured directories. A file that exists but fails to
/// parse records a per-module error and stops the search for that module;
/// other modules are still attempted.
pub struct StandardDebugInfoFinder
{
    options: DebugInfoOptions,
}

impl StandardDebugInfoFinder
{
    pub fn new(options: DebugInfoOptions) -> Self
    {
        Self { options }
    }

    fn candidates(&self, module: &Module) -> Vec<PathBuf>
    {
        let mut paths = Vec::new();
        let module_path = Path::new(module.name());
        paths.push(module_path.to_owned());

        if self.options.try_build_id {
            if let Some(build_id) = module.build_id() {
                if build_id.len() > 1 {
                    let head = format!("{:02x}", build_id[0]);
                    let tail: String = build_id[1..]
                        .iter()
                        .map(|byte| format!("{byte:02x}"))
                        .collect();
                    for dir in &self.options.directories {
                        paths.push(dir.join(".build-id").join(&head).join(format!("{tail}.debug")));
                    }
                }
            }
        }

        if self.options.try_debug_link {
            if let Some(stem) = module_path.file_name() {
                let mut link_name = stem.to_owned();
                link_name.push(".debug");
                if let Some(parent) = module_path.parent() {
                    paths.push(parent.join(&link_name));
                    for dir in &self.options.directories {
                        let mut under = dir.clone();
                        if let Ok(relative) = parent.strip_prefix("/") {
                            under = under.join(relative);
                        }
                        paths.push(under.join(&link_name));
                    }
                }
            }
        }

        paths
    }
}

impl DebugInfoFinder for StandardDebugInfoFinder
{
    fn find(&self, _prog: &Program, modules: &[Arc<Module>]) -> Result<()>
    {
        for module in modules {
            if !module.wants_debug_info() {
                continue;
            }
            for candidate in self.candidates(module) {
                match module.try_attach_file(&candidate) {
                    Ok(true) => {
                        debug!(module = module.name(), path = %candidate.display(), "found debug info");
                        break;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!(module = module.name(), path = %candidate.display(), %err, "failed to load debug info");
                        module.set_debug_info_error(err.to_string());
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

fn modules_with_debug(prog: &Program) -> Vec<(Arc<Module>, Arc<DebugFile>)>
{
    prog.modules()
        .into_iter()
        .filter_map(|module| {
            let file = module.debug_file()?;
            Some((module, file))
        })
        .collect()
}

/// Type lookup against the DWARF of every module with loaded debug info,
/// registered under `"standard"`.
#[derive(Debug, Default)]
pub struct StandardTypeFinder;

impl TypeFinder for StandardTypeFinder
{
    fn find(
        &self,
        prog: &Program,
        kinds: TypeKindSet,
        name: &str,
        filename: Option<&str>,
    ) -> Result<Option<QualifiedType>>
    {
        for (_, file) in modules_with_debug(prog) {
            if let Some(record) = file.find_type(kinds, name, filename)? {
                let info = TypeInfo {
                    program: prog.id(),
                    name: record.name,
                    kind: record.kind,
                    size: record.size,
                    filename: record.filename,
                };
                return Ok(Some(QualifiedType::unqualified(info)));
            }
        }
        Ok(None)
    }
}

/// Object lookup against DWARF declarations and symbol tables, registered
/// under `"standard"`
///
/// Functions and variables resolve to reference objects at their biased
/// runtime address; enumeration constants resolve to value objects.
#[derive(Debug, Default)]
pub struct StandardObjectFinder;

impl StandardObjectFinder
{
    fn object_type(prog: &Program, file: &DebugFile, type_name: Option<String>) -> QualifiedType
    {
        if let Some(type_name) = type_name {
            if let Ok(Some(record)) = file.find_type(TypeKindSet::all(), &type_name, None) {
                return QualifiedType::unqualified(TypeInfo {
                    program: prog.id(),
                    name: record.name,
                    kind: record.kind,
                    size: record.size,
                    filename: record.filename,
                });
            }
            return QualifiedType::unqualified(TypeInfo {
                program: prog.id(),
                name: type_name,
                kind: TypeKind::Void,
                size: None,
                filename: None,
            });
        }
        QualifiedType::unqualified(TypeInfo {
            program: prog.id(),
            name: "void".to_owned(),
            kind: TypeKind::Void,
            size: None,
            filename: None,
        })
    }
}

impl ObjectFinder for StandardObjectFinder
{
    fn find(
        &self,
        prog: &Program,
        name: &str,
        filename: Option<&str>,
        flags: FindObjectFlags,
    ) -> Result<Option<Object>>
    {
        for (module, file) in modules_with_debug(prog) {
            let bias = module.load_bias();

            for kind in [ObjectKind::Function, ObjectKind::Variable] {
                if !flags.accepts(kind) {
                    continue;
                }
                if let Some(record) = file.find_declaration(name, kind, filename)? {
                    // Fall back to the symbol table when DWARF recorded no
                    // address (common for variables).
                    let address = record.address.or_else(|| {
                        file.symbols()
                            .find_by_name(name)
                            .first()
                            .map(|symbol| symbol.address.value())
                    });
                    let Some(address) = address else {
                        continue;
                    };
                    return Ok(Some(Object {
                        program: prog.id(),
                        name: record.name,
                        kind,
                        type_: Self::object_type(prog, &file, record.type_name),
                        repr: ObjectRepr::Reference(Address::new(address.wrapping_add(bias))),
                    }));
                }
            }

            if flags.accepts(ObjectKind::Constant) {
                if let Some(record) = file.find_constant(name, filename)? {
                    let type_ = Self::object_type(prog, &file, record.enum_name);
                    return Ok(Some(Object {
                        program: prog.id(),
                        name: record.name,
                        kind: ObjectKind::Constant,
                        type_,
                        repr: ObjectRepr::Value(record.value),
                    }));
                }
            }
        }
        Ok(None)
    }
}

/// Symbol lookup against the symbol tables of modules with loaded debug
/// info, registered under `"standard"`
///
/// Symbol addresses in the file are rebased into the target's address space
/// with the owning module's load bias. Address queries are answered only by
/// the module whose mapped range contains the address; a module whose load
/// address is unknown cannot relate a runtime address to its file, so it is
/// skipped.
#[derive(Debug, Default)]
pub struct StandardSymbolFinder;

impl SymbolFinder for StandardSymbolFinder
{
    fn find(&self, prog: &Program, query: &SymbolQuery<'_>) -> Result<Vec<Symbol>>
    {
        let mut results = Vec::new();
        for (module, file) in modules_with_debug(prog) {
            let bias = module.load_bias();
            if let Some(address) = query.address {
                if !module.contains_address(address) {
                    continue;
                }
            }
            let file_query = SymbolQuery {
                name: query.name,
                address: query
                    .address
                    .map(|address| Address::new(address.value().wrapping_sub(bias))),
                one: query.one,
            };
            for mut symbol in file.symbols().query(&file_query) {
                symbol.address = Address::new(symbol.address.value().wrapping_add(bias));
                results.push(symbol);
            }
            if query.one && !results.is_empty() {
                break;
            }
        }
        Ok(results)
    }
}
