use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use addr2line::Context;
use gimli::{
    self, constants, AttributeValue, DebuggingInformationEntry, Dwarf, EndianArcSlice, Reader,
    RunTimeEndian, SectionId, Unit,
};
use ::object::{Object as ObjectFile, ObjectSection, ObjectSegment, ObjectSymbol};
use once_cell::sync::OnceCell;
use tracing::trace;

use crate::error::{Result, ScryError};
use crate::object::{filename_matches, ObjectKind, TypeKind, TypeKindSet};
use crate::symbol::SymbolIndex;
use crate::types::{Address, Architecture, Symbol, SymbolBinding, SymbolKind};

type OwnedReader = EndianArcSlice<RunTimeEndian>;
type OwnedDwarf = Dwarf<OwnedReader>;

/// Parsed debug information for one binary file
///
/// Owns the symbol table and DWARF sections, and lazily builds the DWARF
/// parse and the line-table context on first use. Symbol and type addresses
/// are file virtual addresses; callers apply the owning module's load bias.
pub struct DebugFile
{
    path: PathBuf,
    endian: RunTimeEndian,
    architecture: Architecture,
    first_load_address: u64,
    image_size: u64,
    build_id: Option<Vec<u8>>,
    debug_link: Option<String>,
    debug_sections: HashMap<&'static str, Arc<[u8]>>,
    symbols: SymbolIndex,
    dwarf_cache: OnceCell<OwnedDwarf>,
    context_cache: OnceCell<Context<OwnedReader>>,
    tables_cache: OnceCell<DwarfTables>,
}

impl DebugFile
{
    /// Parse the file at `path`.
    ///
    /// ## Errors
    ///
    /// `Io` if the file cannot be read, `Parse` if it is not a valid object
    /// file.
    pub fn open(path: &Path) -> Result<Self>
    {
        let bytes = fs::read(path)?;
        let data = Arc::<[u8]>::from(bytes);
        let file = ::object::File::parse(&*data)
            .map_err(|err| ScryError::Parse(format!("failed to parse {}: {err}", path.display())))?;

        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        let architecture = match file.architecture() {
            ::object::Architecture::Aarch64 => Architecture::Arm64,
            ::object::Architecture::X86_64 => Architecture::X86_64,
            _ => Architecture::Unknown("unknown"),
        };

        let mut first_load_address = u64::MAX;
        let mut max_addr = 0u64;
        for segment in file.segments() {
            let start = segment.address();
            let end = start.saturating_add(segment.size());
            first_load_address = first_load_address.min(start);
            max_addr = max_addr.max(end);
        }
        if first_load_address == u64::MAX {
            first_load_address = 0;
        }
        let image_size = max_addr.saturating_sub(first_load_address);

        let build_id = file
            .build_id()
            .map_err(|err| ScryError::Parse(format!("failed to read build id: {err}")))?
            .map(<[u8]>::to_vec);
        let debug_link = read_debug_link(&file);

        let mut sections = HashMap::new();
        for (canonical, aliases) in DWARF_SECTIONS {
            let data = load_section_bytes(&file, aliases)?;
            sections.insert(*canonical, data);
        }

        let symbols = collect_symbols(&file);
        trace!(path = %path.display(), symbols = symbols.len(), "parsed debug file");

        Ok(Self {
            path: path.to_owned(),
            endian,
            architecture,
            first_load_address,
            image_size,
            build_id,
            debug_link,
            debug_sections: sections,
            symbols: SymbolIndex::new(symbols),
            dwarf_cache: OnceCell::new(),
            context_cache: OnceCell::new(),
            tables_cache: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Path
    {
        &self.path
    }

    pub fn architecture(&self) -> Architecture
    {
        self.architecture
    }

    /// Lowest load-segment virtual address; the module load bias is the
    /// mapped start minus this.
    pub fn first_load_address(&self) -> u64
    {
        self.first_load_address
    }

    /// Span of the loadable image in bytes.
    pub fn image_size(&self) -> u64
    {
        self.image_size
    }

    /// GNU build id, if the file carries one.
    pub fn build_id(&self) -> Option<&[u8]>
    {
        self.build_id.as_deref()
    }

    /// `.gnu_debuglink` target file name, if present.
    pub fn debug_link(&self) -> Option<&str>
    {
        self.debug_link.as_deref()
    }

    /// The file's symbol table, indexed by name and address.
    pub fn symbols(&self) -> &SymbolIndex
    {
        &self.symbols
    }

    fn dwarf(&self) -> Result<&OwnedDwarf>
    {
        self.dwarf_cache.get_or_try_init(|| {
            Dwarf::load(|section| Ok::<_, gimli::Error>(self.section_reader(section)))
                .map_err(|err| ScryError::Parse(format!("failed to load DWARF: {err}")))
        })
    }

    fn section_reader(&self, id: SectionId) -> OwnedReader
    {
        let data = self
            .debug_sections
            .get(id.name())
            .cloned()
            .unwrap_or_else(|| Arc::<[u8]>::from(Vec::new()));
        EndianArcSlice::new(data, self.endian)
    }

    fn line_context(&self) -> Result<&Context<OwnedReader>>
    {
        self.context_cache.get_or_try_init(|| {
            let dwarf = Dwarf::load(|section| Ok::<_, gimli::Error>(self.section_reader(section)))
                .map_err(|err| ScryError::Parse(format!("failed to load DWARF: {err}")))?;
            Context::from_dwarf(dwarf)
                .map_err(|err| ScryError::Parse(format!("failed to build line context: {err}")))
        })
    }

    /// Source file and line for a file virtual address, from the DWARF line
    /// tables.
    pub fn source_location(&self, file_address: u64) -> Option<(String, u32)>
    {
        let ctx = self.line_context().ok()?;
        let location = ctx.find_location(file_address).ok()??;
        let file = location.file?.to_string();
        let line = location.line?;
        Some((file, line))
    }

    fn tables(&self) -> Result<&DwarfTables>
    {
        self.tables_cache.get_or_try_init(|| {
            let dwarf = self.dwarf()?;
            DwarfTables::build(dwarf)
        })
    }

    /// Look up a named type in this file's DWARF.
    pub fn find_type(
        &self,
        kinds: TypeKindSet,
        name: &str,
        filename: Option<&str>,
    ) -> Result<Option<TypeRecord>>
    {
        let tables = self.tables()?;
        Ok(tables
            .types
            .iter()
            .find(|record| {
                kinds.contains(record.kind)
                    && record.name == name
                    && filename_matches(record.filename.as_deref(), filename)
            })
            .cloned())
    }

    /// Look up an enumeration constant by name.
    pub fn find_constant(&self, name: &str, filename: Option<&str>) -> Result<Option<ConstantRecord>>
    {
        let tables = self.tables()?;
        Ok(tables
            .constants
            .iter()
            .find(|record| {
                record.name == name && filename_matches(record.filename.as_deref(), filename)
            })
            .cloned())
    }

    /// Look up a named function or variable declaration.
    pub fn find_declaration(
        &self,
        name: &str,
        kind: ObjectKind,
        filename: Option<&str>,
    ) -> Result<Option<ObjectRecord>>
    {
        let tables = self.tables()?;
        Ok(tables
            .objects
            .iter()
            .find(|record| {
                record.kind == kind
                    && record.name == name
                    && filename_matches(record.filename.as_deref(), filename)
            })
            .cloned())
    }
}

impl std::fmt::Debug for DebugFile
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("DebugFile")
            .field("path", &self.path)
            .field("architecture", &self.architecture)
            .field("symbols", &self.symbols.len())
            .finish_non_exhaustive()
    }
}

/// A named type found in DWARF, at file granularity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRecord
{
    pub name: String,
    pub kind: TypeKind,
    pub size: Option<u64>,
    /// Compilation-unit source file the type was declared in.
    pub filename: Option<String>,
}

/// An enumeration constant found in DWARF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantRecord
{
    pub name: String,
    pub value: i64,
    /// Name of the enumeration type the constant belongs to, when named.
    pub enum_name: Option<String>,
    pub filename: Option<String>,
}

/// A function or variable declaration found in DWARF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord
{
    pub name: String,
    pub kind: ObjectKind,
    /// Name of the declared type, when resolvable.
    pub type_name: Option<String>,
    /// Entry point or storage address (file virtual address), when recorded.
    pub address: Option<u64>,
    pub filename: Option<String>,
}

struct DwarfTables
{
    types: Vec<TypeRecord>,
    constants: Vec<ConstantRecord>,
    objects: Vec<ObjectRecord>,
}

impl DwarfTables
{
    fn build(dwarf: &OwnedDwarf) -> Result<Self>
    {
        let mut tables = Self {
            types: Vec::new(),
            constants: Vec::new(),
            objects: Vec::new(),
        };

        let mut headers = dwarf.units();
        while let Some(header) = headers
            .next()
            .map_err(|err| map_dwarf_error("reading unit header", err))?
        {
            let unit = dwarf
                .unit(header)
                .map_err(|err| map_dwarf_error("parsing compilation unit", err))?;
            tables.scan_unit(dwarf, &unit)?;
        }

        Ok(tables)
    }

    fn scan_unit(&mut self, dwarf: &OwnedDwarf, unit: &Unit<OwnedReader>) -> Result<()>
    {
        let mut unit_filename = None;
        let mut enum_name: Option<String> = None;
        let mut enum_depth = 0isize;
        let mut depth = 0isize;

        let mut cursor = unit.entries();
        while let Some((delta, entry)) = cursor
            .next_dfs()
            .map_err(|err| map_dwarf_error("traversing DIE tree", err))?
        {
            depth += delta;
            if enum_name.is_some() && depth <= enum_depth {
                enum_name = None;
            }

            if entry.tag() == constants::DW_TAG_compile_unit {
                unit_filename = entry_name(dwarf, unit, entry)?;
                continue;
            }

            match entry.tag() {
                constants::DW_TAG_base_type => {
                    if let Some(name) = entry_name(dwarf, unit, entry)? {
                        self.types.push(TypeRecord {
                            name,
                            kind: base_type_kind(entry)?,
                            size: entry_byte_size(entry)?,
                            filename: unit_filename.clone(),
                        });
                    }
                }
                constants::DW_TAG_structure_type
                | constants::DW_TAG_class_type
                | constants::DW_TAG_union_type
                | constants::DW_TAG_enumeration_type
                | constants::DW_TAG_typedef => {
                    let name = entry_name(dwarf, unit, entry)?;
                    if entry.tag() == constants::DW_TAG_enumeration_type {
                        enum_name = name.clone();
                        enum_depth = depth;
                    }
                    if let Some(name) = name {
                        self.types.push(TypeRecord {
                            name,
                            kind: tag_type_kind(entry.tag()),
                            size: entry_byte_size(entry)?,
                            filename: unit_filename.clone(),
                        });
                    }
                }
                constants::DW_TAG_enumerator => {
                    if let Some(name) = entry_name(dwarf, unit, entry)? {
                        let value = entry
                            .attr(constants::DW_AT_const_value)
                            .map_err(|err| map_dwarf_error("reading DW_AT_const_value", err))?
                            .and_then(|attr| {
                                attr.sdata_value()
                                    .or_else(|| attr.udata_value().map(|value| value as i64))
                            })
                            .unwrap_or(0);
                        self.constants.push(ConstantRecord {
                            name,
                            value,
                            enum_name: enum_name.clone(),
                            filename: unit_filename.clone(),
                        });
                    }
                }
                constants::DW_TAG_subprogram | constants::DW_TAG_variable => {
                    if let Some(name) = entry_name(dwarf, unit, entry)? {
                        let kind = if entry.tag() == constants::DW_TAG_subprogram {
                            ObjectKind::Function
                        } else {
                            ObjectKind::Variable
                        };
                        let type_name = resolve_type_name(dwarf, unit, entry, 0)?;
                        let address = entry
                            .attr(constants::DW_AT_low_pc)
                            .map_err(|err| map_dwarf_error("reading DW_AT_low_pc", err))?
                            .and_then(|attr| match attr.value() {
                                AttributeValue::Addr(addr) => Some(addr),
                                _ => None,
                            });
                        self.objects.push(ObjectRecord {
                            name,
                            kind,
                            type_name,
                            address,
                            filename: unit_filename.clone(),
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn tag_type_kind(tag: constants::DwTag) -> TypeKind
{
    match tag {
        constants::DW_TAG_structure_type => TypeKind::Struct,
        constants::DW_TAG_class_type => TypeKind::Class,
        constants::DW_TAG_union_type => TypeKind::Union,
        constants::DW_TAG_enumeration_type => TypeKind::Enum,
        constants::DW_TAG_typedef => TypeKind::Typedef,
        constants::DW_TAG_pointer_type => TypeKind::Pointer,
        constants::DW_TAG_array_type => TypeKind::Array,
        constants::DW_TAG_subroutine_type => TypeKind::Function,
        _ => TypeKind::Void,
    }
}

fn base_type_kind(entry: &DebuggingInformationEntry<'_, '_, OwnedReader>) -> Result<TypeKind>
{
    let encoding = entry
        .attr(constants::DW_AT_encoding)
        .map_err(|err| map_dwarf_error("reading DW_AT_encoding", err))?
        .and_then(|attr| attr.udata_value());
    Ok(match encoding {
        Some(value) if value == u64::from(constants::DW_ATE_boolean.0) => TypeKind::Bool,
        Some(value) if value == u64::from(constants::DW_ATE_float.0) => TypeKind::Float,
        _ => TypeKind::Int,
    })
}

fn entry_byte_size(entry: &DebuggingInformationEntry<'_, '_, OwnedReader>) -> Result<Option<u64>>
{
    Ok(entry
        .attr(constants::DW_AT_byte_size)
        .map_err(|err| map_dwarf_error("reading DW_AT_byte_size", err))?
        .and_then(|attr| attr.udata_value()))
}

fn entry_name(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
) -> Result<Option<String>>
{
    let Some(attr) = entry
        .attr(constants::DW_AT_name)
        .map_err(|err| map_dwarf_error("reading DW_AT_name", err))?
    else {
        return Ok(None);
    };
    let reader = dwarf
        .attr_string(unit, attr.value())
        .map_err(|err| map_dwarf_error("resolving DWARF string", err))?;
    let owned = match reader.to_string() {
        Ok(cow) => cow.into_owned(),
        Err(_) => reader
            .to_string_lossy()
            .map_err(|err| map_dwarf_error("decoding DWARF string", err))?
            .into_owned(),
    };
    Ok(Some(owned))
}

const MAX_TYPE_REF_DEPTH: usize = 32;

fn resolve_type_name(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
    depth: usize,
) -> Result<Option<String>>
{
    if depth >= MAX_TYPE_REF_DEPTH {
        return Ok(None);
    }
    let Some(attr) = entry
        .attr(constants::DW_AT_type)
        .map_err(|err| map_dwarf_error("reading DW_AT_type", err))?
    else {
        return Ok(None);
    };
    let AttributeValue::UnitRef(offset) = attr.value() else {
        return Ok(None);
    };
    let die = unit
        .entry(offset)
        .map_err(|err| map_dwarf_error("resolving type reference", err))?;
    if let Some(name) = entry_name(dwarf, unit, &die)? {
        return Ok(Some(name));
    }
    resolve_type_name(dwarf, unit, &die, depth + 1)
}

const DWARF_SECTIONS: &[(&str, &[&str])] = &[
    (".debug_abbrev", &[".debug_abbrev", "__debug_abbrev"]),
    (".debug_addr", &[".debug_addr", "__debug_addr"]),
    (".debug_info", &[".debug_info", "__debug_info"]),
    (".debug_line", &[".debug_line", "__debug_line"]),
    (".debug_line_str", &[".debug_line_str", "__debug_line_str"]),
    (".debug_ranges", &[".debug_ranges", "__debug_ranges"]),
    (".debug_rnglists", &[".debug_rnglists", "__debug_rnglists"]),
    (".debug_str", &[".debug_str", "__debug_str"]),
    (".debug_str_offsets", &[".debug_str_offsets", "__debug_str_offsets"]),
    (".debug_types", &[".debug_types", "__debug_types"]),
    (".debug_loc", &[".debug_loc", "__debug_loc"]),
    (".debug_loclists", &[".debug_loclists", "__debug_loclists"]),
    (".debug_frame", &[".debug_frame", "__debug_frame"]),
    (".debug_macro", &[".debug_macro", "__debug_macro"]),
    (".debug_names", &[".debug_names", "__debug_names"]),
    (".debug_cu_index", &[".debug_cu_index"]),
    (".debug_tu_index", &[".debug_tu_index"]),
];

fn load_section_bytes<'data>(file: &::object::File<'data>, names: &[&str]) -> Result<Arc<[u8]>>
{
    for name in names {
        if let Some(section) = file.section_by_name(name) {
            let data = section
                .uncompressed_data()
                .map_err(|err| ScryError::Parse(format!("failed to read {name}: {err}")))?;
            return Ok(match data {
                Cow::Borrowed(bytes) => Arc::<[u8]>::from(bytes.to_vec()),
                Cow::Owned(vec) => vec.into(),
            });
        }
    }

    Ok(Arc::<[u8]>::from(Vec::new()))
}

fn read_debug_link(file: &::object::File<'_>) -> Option<String>
{
    let section = file.section_by_name(".gnu_debuglink")?;
    let data = section.uncompressed_data().ok()?;
    // File name is NUL-terminated; padding and a CRC32 follow.
    let end = data.iter().position(|&byte| byte == 0)?;
    let name = std::str::from_utf8(&data[..end]).ok()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_owned())
    }
}

fn collect_symbols(file: &::object::File<'_>) -> Vec<Symbol>
{
    let mut symbols = Vec::new();
    for sym in file.symbols().chain(file.dynamic_symbols()) {
        if !sym.is_definition() {
            continue;
        }
        let Ok(name) = sym.name() else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let binding = if sym.is_weak() {
            SymbolBinding::Weak
        } else if sym.is_global() {
            SymbolBinding::Global
        } else if sym.is_local() {
            SymbolBinding::Local
        } else {
            SymbolBinding::Unknown
        };
        let kind = match sym.kind() {
            ::object::SymbolKind::Text => SymbolKind::Function,
            ::object::SymbolKind::Data => SymbolKind::Object,
            ::object::SymbolKind::Section => SymbolKind::Section,
            ::object::SymbolKind::File => SymbolKind::File,
            _ => SymbolKind::Unknown,
        };
        symbols.push(Symbol {
            name: name.to_owned(),
            address: Address::new(sym.address()),
            size: sym.size(),
            binding,
            kind,
        });
    }
    symbols
}

fn map_dwarf_error(context: &str, err: gimli::Error) -> ScryError
{
    ScryError::Parse(format!("{context}: {err}"))
}
