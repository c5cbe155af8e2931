//! Tests for debug-info loading: explicit paths, per-module failure
//! recording, and the mandatory main module.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use scry_core::debug_info::{DebugFile, DebugInfoOptions};
use scry_core::error::ScryError;
use scry_core::module::ModuleKind;
use scry_core::program::Program;
use scry_core::types::{Address, Platform};
use tempfile::TempDir;

/// A minimal but valid ELF64 image: just the file header, no program or
/// section headers.
fn minimal_elf() -> Vec<u8>
{
    let mut header = vec![0u8; 64];
    header[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
    header[4] = 2; // ELFCLASS64
    header[5] = 1; // ELFDATA2LSB
    header[6] = 1; // EV_CURRENT
    header[16..18].copy_from_slice(&3u16.to_le_bytes()); // ET_DYN
    header[18..20].copy_from_slice(&62u16.to_le_bytes()); // EM_X86_64
    header[20..24].copy_from_slice(&1u32.to_le_bytes());
    header[52..54].copy_from_slice(&64u16.to_le_bytes()); // e_ehsize
    header[54..56].copy_from_slice(&56u16.to_le_bytes()); // e_phentsize
    header[58..60].copy_from_slice(&64u16.to_le_bytes()); // e_shentsize
    header
}

fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> String
{
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path.to_string_lossy().into_owned()
}

fn no_search_program() -> Program
{
    Program::with_options(Platform::host(), DebugInfoOptions::no_search())
}

#[test]
fn parses_minimal_elf()
{
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "empty.so", &minimal_elf());

    let file = DebugFile::open(Path::new(&path)).unwrap();
    assert_eq!(file.first_load_address(), 0);
    assert_eq!(file.image_size(), 0);
    assert!(file.build_id().is_none());
    assert!(file.debug_link().is_none());
    assert!(file.symbols().is_empty());
}

#[test]
fn rejects_garbage()
{
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "garbage.so", b"this is not an object file");

    let err = DebugFile::open(Path::new(&path)).unwrap_err();
    assert!(matches!(err, ScryError::Parse(_)));
}

#[test]
fn partial_failure_is_recorded_per_module()
{
    let dir = TempDir::new().unwrap();
    let good_path = write_file(&dir, "app", &minimal_elf());
    let bad_path = write_file(&dir, "libbad.so", b"corrupt bytes");

    let mut prog = no_search_program();
    let (main, _) = prog.find_or_create_main_module(&good_path).unwrap();
    let (bad, _) = prog
        .find_or_create_shared_library_module(&bad_path, Address::new(0x1000))
        .unwrap();

    // Default load: the corrupt library must not abort the batch, and the
    // main module's debug info satisfies the implied main requirement.
    prog.load_debug_info(&[], true, false).unwrap();

    assert!(!main.wants_debug_info());
    assert!(main.debug_file().is_some());
    assert!(main.debug_info_error().is_none());

    assert!(bad.wants_debug_info());
    assert!(bad.debug_file().is_none());
    let error = bad.debug_info_error().unwrap();
    assert!(error.contains("libbad.so"), "unexpected error: {error}");
}

#[test]
fn reload_is_idempotent()
{
    let dir = TempDir::new().unwrap();
    let good_path = write_file(&dir, "app", &minimal_elf());

    let mut prog = no_search_program();
    let (main, _) = prog.find_or_create_main_module(&good_path).unwrap();

    prog.load_debug_info(&[], true, false).unwrap();
    let first = main.debug_file().unwrap();

    prog.load_debug_info(&[], true, false).unwrap();
    let second = main.debug_file().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn explicit_path_attaches_to_the_named_module()
{
    let dir = TempDir::new().unwrap();
    let lib_path = write_file(&dir, "libgood.so", &minimal_elf());

    let mut prog = no_search_program();
    let (main, _) = prog.find_or_create_main_module("/usr/bin/nonexistent").unwrap();
    let (lib, _) = prog
        .find_or_create_shared_library_module(&lib_path, Address::new(0x2000))
        .unwrap();

    prog.load_debug_info(&[lib_path.clone().into()], false, false).unwrap();

    assert!(lib.debug_file().is_some());
    assert!(main.debug_file().is_none());
}

#[test]
fn explicit_path_without_a_matching_module_falls_back_to_main()
{
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "detached.debug", &minimal_elf());

    let mut prog = no_search_program();
    let (main, _) = prog.find_or_create_main_module("/usr/bin/nonexistent").unwrap();

    prog.load_debug_info(&[path.into()], false, false).unwrap();
    assert!(main.debug_file().is_some());
}

#[test]
fn explicit_path_on_an_empty_program_creates_an_extra_module()
{
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "standalone.so", &minimal_elf());

    let mut prog = no_search_program();
    prog.load_debug_info(&[path.clone().into()], false, false).unwrap();

    let modules = prog.modules();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].kind(), ModuleKind::Extra);
    assert_eq!(modules[0].name(), path);
    assert!(modules[0].debug_file().is_some());
}

#[test]
fn explicit_missing_path_records_an_error()
{
    let mut prog = no_search_program();
    let (main, _) = prog.find_or_create_main_module("/usr/bin/nonexistent").unwrap();

    // Not a main-required load, so the missing file is only recorded.
    prog.load_debug_info(&["/no/such/file.debug".into()], false, false)
        .unwrap();
    let error = main.debug_info_error().unwrap();
    assert!(error.contains("no such file"), "unexpected error: {error}");
}

#[test]
fn missing_main_debug_info_is_an_error()
{
    let mut prog = no_search_program();
    let (main, _) = prog.find_or_create_main_module("/usr/bin/nonexistent").unwrap();

    let err = prog.load_debug_info(&[], false, true).unwrap_err();
    match err {
        ScryError::MissingDebugInfo(message) => {
            assert!(message.contains("/usr/bin/nonexistent"), "unexpected: {message}");
        }
        other => panic!("expected MissingDebugInfo, got {other}"),
    }
    assert!(main.wants_debug_info());
}

#[test]
fn main_only_load_skips_other_modules()
{
    let dir = TempDir::new().unwrap();
    let main_path = write_file(&dir, "app", &minimal_elf());
    let lib_path = write_file(&dir, "libextra.so", &minimal_elf());

    let mut prog = no_search_program();
    let (main, _) = prog.find_or_create_main_module(&main_path).unwrap();
    let (lib, _) = prog
        .find_or_create_shared_library_module(&lib_path, Address::new(0x3000))
        .unwrap();

    prog.load_debug_info(&[], false, true).unwrap();
    assert!(main.debug_file().is_some());
    // The library was findable but was not requested.
    assert!(lib.debug_file().is_none());
}

/// An ELF relocatable object whose symbol table defines one function.
fn elf_with_symbol(name: &str, value: u64, size: u64) -> Vec<u8>
{
    use object::write::{Object as ElfBuilder, Symbol, SymbolSection};
    use object::{
        Architecture, BinaryFormat, Endianness, SectionKind, SymbolFlags, SymbolKind, SymbolScope,
    };

    let mut builder = ElfBuilder::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    let text = builder.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    builder.append_section_data(text, &vec![0u8; (value + size) as usize], 16);
    builder.add_symbol(Symbol {
        name: name.as_bytes().to_vec(),
        value,
        size,
        kind: SymbolKind::Text,
        scope: SymbolScope::Linkage,
        weak: false,
        section: SymbolSection::Section(text),
        flags: SymbolFlags::None,
    });
    builder.write().unwrap()
}

#[test]
fn symbol_table_answers_name_and_loaded_address_queries()
{
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "libsym.so", &elf_with_symbol("target_fn", 0x40, 0x20));

    let mut prog = no_search_program();
    let (module, _) = prog
        .find_or_create_shared_library_module(&path, Address::new(0))
        .unwrap();
    assert!(module.try_attach_file(Path::new(&path)).unwrap());

    // Name queries search every module with debug info, loaded or not.
    let found = prog.symbol_by_name("target_fn").unwrap();
    assert_eq!(found.address, Address::new(0x40));
    assert_eq!(found.size, 0x20);

    // Once the module is loaded, address queries resolve through the bias.
    module
        .set_address_range(Address::new(0x7000_0000), Address::new(0x7000_1000))
        .unwrap();
    let found = prog.symbol_by_address(Address::new(0x7000_0040)).unwrap();
    assert_eq!(found.name, "target_fn");
    assert_eq!(found.address, Address::new(0x7000_0040));
}

#[test]
fn unloaded_modules_do_not_answer_address_queries()
{
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "libsym.so", &elf_with_symbol("target_fn", 0x40, 0x20));

    let mut prog = no_search_program();
    let (module, _) = prog
        .find_or_create_shared_library_module(&path, Address::new(0))
        .unwrap();
    assert!(module.try_attach_file(Path::new(&path)).unwrap());
    assert!(!module.is_loaded());

    // A runtime address that happens to coincide with a file address must
    // not match while the module's load address is unknown.
    assert!(matches!(
        prog.symbol_by_address(Address::new(0x40)),
        Err(ScryError::NotFound(_))
    ));
}
