//! Integration tests for the program surface: object lookups, symbol
//! queries, threads, memory reads, and stack walking.

use std::sync::Arc;

use scry_core::error::ScryError;
use scry_core::finder::{EnablePosition, ObjectFinder, SymbolFinder};
use scry_core::memory::SegmentReadFn;
use scry_core::object::{
    FindObjectFlags, Object, ObjectKind, ObjectRepr, QualifiedType, TypeInfo, TypeKind,
};
use scry_core::program::Program;
use scry_core::symbol::{SymbolIndex, SymbolQuery};
use scry_core::types::{
    Address, AddressSpace, Architecture, ByteOrder, FrameStatus, Platform, Symbol, SymbolBinding,
    SymbolKind, Thread, ThreadId,
};

fn little_endian_platform() -> Platform
{
    Platform::new(Architecture::X86_64, ByteOrder::Little)
}

fn buffer_read_fn(bytes: Vec<u8>) -> SegmentReadFn
{
    let data = Arc::new(bytes);
    Arc::new(move |buf, _address, offset| {
        let start = offset as usize;
        buf.copy_from_slice(&data[start..start + buf.len()]);
        Ok(())
    })
}

fn symbol(name: &str, address: u64, size: u64) -> Symbol
{
    Symbol {
        name: name.to_owned(),
        address: Address::new(address),
        size,
        binding: SymbolBinding::Global,
        kind: SymbolKind::Function,
    }
}

// ---- object lookups ----

/// An object finder that knows a single named variable.
struct SingleVariableFinder
{
    name: String,
    address: u64,
}

impl ObjectFinder for SingleVariableFinder
{
    fn find(
        &self,
        prog: &Program,
        name: &str,
        _filename: Option<&str>,
        flags: FindObjectFlags,
    ) -> scry_core::error::Result<Option<Object>>
    {
        if name != self.name || !flags.accepts(ObjectKind::Variable) {
            return Ok(None);
        }
        Ok(Some(Object {
            program: prog.id(),
            name: name.to_owned(),
            kind: ObjectKind::Variable,
            type_: QualifiedType::unqualified(TypeInfo {
                program: prog.id(),
                name: "unsigned long".to_owned(),
                kind: TypeKind::Int,
                size: Some(8),
                filename: None,
            }),
            repr: ObjectRepr::Reference(Address::new(self.address)),
        }))
    }
}

struct FailingObjectFinder;

impl ObjectFinder for FailingObjectFinder
{
    fn find(
        &self,
        _prog: &Program,
        _name: &str,
        _filename: Option<&str>,
        _flags: FindObjectFlags,
    ) -> scry_core::error::Result<Option<Object>>
    {
        Err(ScryError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "debug info backing vanished",
        )))
    }
}

#[test]
fn find_object_exhaustion_names_the_query()
{
    let prog = Program::new(little_endian_platform());
    let err = prog
        .find_object("jiffies", None, FindObjectFlags::ANY)
        .unwrap_err();
    match err {
        ScryError::ObjectNotFound { name } => assert_eq!(name, "jiffies"),
        other => panic!("expected ObjectNotFound, got {other}"),
    }
}

#[test]
fn find_object_resolves_through_registered_finder()
{
    let mut prog = Program::new(little_endian_platform());
    prog.register_object_finder(
        "fixture",
        Arc::new(SingleVariableFinder {
            name: "init_task".to_owned(),
            address: 0xffff_8000_0123_4000,
        }),
        EnablePosition::First,
    )
    .unwrap();

    let object = prog
        .find_object("init_task", None, FindObjectFlags::VARIABLE)
        .unwrap();
    assert_eq!(object.name, "init_task");
    assert_eq!(object.kind, ObjectKind::Variable);
    assert_eq!(object.address(), Some(Address::new(0xffff_8000_0123_4000)));
    assert_eq!(object.program, prog.id());

    // The finder only offers variables; a constant-only query declines.
    let err = prog
        .find_object("init_task", None, FindObjectFlags::CONSTANT)
        .unwrap_err();
    assert!(matches!(err, ScryError::ObjectNotFound { .. }));
}

#[test]
fn contains_maps_not_found_to_false()
{
    let mut prog = Program::new(little_endian_platform());
    prog.register_object_finder(
        "fixture",
        Arc::new(SingleVariableFinder {
            name: "modules".to_owned(),
            address: 0x1000,
        }),
        EnablePosition::First,
    )
    .unwrap();

    assert!(prog.contains("modules").unwrap());
    assert!(!prog.contains("no_such_symbol").unwrap());
}

#[test]
fn contains_propagates_hard_failures()
{
    let mut prog = Program::new(little_endian_platform());
    prog.register_object_finder("failing", Arc::new(FailingObjectFinder), EnablePosition::First)
        .unwrap();

    let err = prog.contains("anything").unwrap_err();
    assert!(matches!(err, ScryError::Io(_)));
}

#[test]
fn type_size_rejects_values_from_another_program()
{
    let prog_a = Program::new(little_endian_platform());
    let prog_b = Program::new(little_endian_platform());
    assert_ne!(prog_a.id(), prog_b.id());

    let type_ = QualifiedType::unqualified(TypeInfo {
        program: prog_a.id(),
        name: "struct page".to_owned(),
        kind: TypeKind::Struct,
        size: Some(64),
        filename: None,
    });

    assert_eq!(prog_a.type_size(&type_).unwrap(), 64);
    let err = prog_b.type_size(&type_).unwrap_err();
    assert!(matches!(err, ScryError::InvalidArgument(_)));
}

#[test]
fn type_size_fails_for_incomplete_types()
{
    let prog = Program::new(little_endian_platform());
    let opaque = QualifiedType::unqualified(TypeInfo {
        program: prog.id(),
        name: "struct opaque".to_owned(),
        kind: TypeKind::Struct,
        size: None,
        filename: None,
    });
    assert!(matches!(prog.type_size(&opaque), Err(ScryError::Lookup(_))));
}

// ---- symbols ----

/// A symbol finder that always returns two candidates.
struct AmbiguousSymbolFinder;

impl SymbolFinder for AmbiguousSymbolFinder
{
    fn find(
        &self,
        _prog: &Program,
        _query: &SymbolQuery<'_>,
    ) -> scry_core::error::Result<Vec<Symbol>>
    {
        Ok(vec![symbol("dup", 0x1000, 8), symbol("dup", 0x2000, 8)])
    }
}

#[test]
fn multiple_symbols_when_one_requested_is_an_error()
{
    let mut prog = Program::new(little_endian_platform());
    prog.register_symbol_finder("ambiguous", Arc::new(AmbiguousSymbolFinder), EnablePosition::First)
        .unwrap();
    prog.set_enabled_symbol_finders(&["ambiguous"]).unwrap();

    let err = prog.symbol_by_name("dup").unwrap_err();
    assert!(matches!(err, ScryError::InvalidArgument(_)));

    // The unconstrained query is fine with both results.
    let all = prog.symbols(None, None).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn symbol_index_as_sole_finder_serves_queries()
{
    let mut prog = Program::new(little_endian_platform());
    let index = SymbolIndex::new(vec![
        symbol("read_pages", 0x1000, 0x80),
        symbol("write_pages", 0x1080, 0x40),
        symbol("sync_pages", 0x10c0, 0x40),
    ]);
    prog.register_symbol_finder("index", Arc::new(index), EnablePosition::First)
        .unwrap();
    prog.set_enabled_symbol_finders(&["index"]).unwrap();

    let found = prog.symbol_by_name("write_pages").unwrap();
    assert_eq!(found.address, Address::new(0x1080));

    let found = prog.symbol_by_address(Address::new(0x1044)).unwrap();
    assert_eq!(found.name, "read_pages");

    // An address one past the end of a symbol belongs to the next one.
    let found = prog.symbol_by_address(Address::new(0x1080)).unwrap();
    assert_eq!(found.name, "write_pages");

    assert!(matches!(
        prog.symbol_by_name("missing"),
        Err(ScryError::NotFound(_))
    ));
    assert!(matches!(
        prog.symbol_by_address(Address::new(0x9999)),
        Err(ScryError::NotFound(_))
    ));

    assert_eq!(prog.symbols(None, None).unwrap().len(), 3);
    assert_eq!(prog.symbols(Some("sync_pages"), None).unwrap().len(), 1);
}

#[test]
fn enclosing_symbol_is_found_across_nearer_entries()
{
    let mut prog = Program::new(little_endian_platform());
    let index = SymbolIndex::new(vec![
        symbol("outer", 0x1000, 0x1000),
        symbol("inner", 0x1800, 0x10),
    ]);
    prog.register_symbol_finder("index", Arc::new(index), EnablePosition::First)
        .unwrap();
    prog.set_enabled_symbol_finders(&["index"]).unwrap();

    // Past the end of the small nested symbol but still inside the
    // enclosing one.
    let found = prog.symbol_by_address(Address::new(0x1900)).unwrap();
    assert_eq!(found.name, "outer");

    // Inside both: every containing symbol is reported, innermost first.
    let both = prog.symbols(None, Some(Address::new(0x1808))).unwrap();
    let names: Vec<&str> = both.iter().map(|sym| sym.name.as_str()).collect();
    assert_eq!(names, vec!["inner", "outer"]);
}

// ---- memory through the program surface ----

#[test]
fn typed_reads_follow_platform_byte_order()
{
    let mut prog = Program::new(little_endian_platform());
    prog.add_memory_segment(
        Address::new(0x1000),
        8,
        AddressSpace::Virtual,
        buffer_read_fn(vec![0xef, 0xbe, 0xad, 0xde, 0x01, 0x00, 0x00, 0x00]),
    );

    assert_eq!(prog.read_u8(Address::new(0x1000)).unwrap(), 0xef);
    assert_eq!(prog.read_u16(Address::new(0x1000)).unwrap(), 0xbeef);
    assert_eq!(prog.read_u32(Address::new(0x1000)).unwrap(), 0xdead_beef);
    assert_eq!(prog.read_u64(Address::new(0x1000)).unwrap(), 0x0000_0001_dead_beef);
    // read_word is 8 bytes on a 64-bit platform.
    assert_eq!(
        prog.read_word(Address::new(0x1000)).unwrap(),
        prog.read_u64(Address::new(0x1000)).unwrap()
    );

    assert!(matches!(
        prog.read_u32(Address::new(0x2000)),
        Err(ScryError::Unmapped { .. })
    ));
}

// ---- threads ----

#[test]
fn thread_bookkeeping()
{
    let mut prog = Program::new(little_endian_platform());
    assert!(prog.threads().is_empty());
    assert!(matches!(prog.main_thread(), Err(ScryError::Lookup(_))));

    prog.add_thread(Thread::with_id(ThreadId(30)));
    prog.add_thread(Thread::with_id(ThreadId(10)));
    prog.add_thread(Thread {
        tid: ThreadId(20),
        pc: Some(Address::new(0x1000)),
        sp: None,
        fp: None,
        crashed: true,
    });

    let threads = prog.threads();
    let tids: Vec<u64> = threads.iter().map(|thread| thread.tid.raw()).collect();
    assert_eq!(tids, vec![10, 20, 30]);

    assert_eq!(prog.thread(ThreadId(20)).unwrap().pc, Some(Address::new(0x1000)));
    assert!(matches!(prog.thread(ThreadId(99)), Err(ScryError::Lookup(_))));

    // Without a live PID, the lowest id is the main thread.
    assert_eq!(prog.main_thread().unwrap().tid, ThreadId(10));

    // Not live, so the crashed thread is reportable.
    assert_eq!(prog.crashed_thread().unwrap().tid, ThreadId(20));
}

#[test]
fn crashed_thread_requires_a_dump()
{
    let mut prog = Program::new(little_endian_platform());
    prog.add_thread(Thread::with_id(ThreadId(1)));
    // No thread marked crashed.
    assert!(matches!(prog.crashed_thread(), Err(ScryError::Lookup(_))));
}

// ---- stack traces ----

fn frame_chain_program() -> Program
{
    let mut prog = Program::new(little_endian_platform());

    // Two frame records at 0x7000 and 0x7020, each [saved fp, return
    // address]. The second record's saved fp of zero terminates the walk.
    let mut stack = vec![0u8; 0x30];
    stack[0x00..0x08].copy_from_slice(&0x7020u64.to_le_bytes());
    stack[0x08..0x10].copy_from_slice(&0x1100u64.to_le_bytes());
    stack[0x20..0x28].copy_from_slice(&0u64.to_le_bytes());
    stack[0x28..0x30].copy_from_slice(&0x1200u64.to_le_bytes());
    prog.add_memory_segment(
        Address::new(0x7000),
        0x30,
        AddressSpace::Virtual,
        buffer_read_fn(stack),
    );

    let index = SymbolIndex::new(vec![
        symbol("leaf_fn", 0x1000, 0x100),
        symbol("middle_fn", 0x1100, 0x100),
        symbol("outer_fn", 0x1200, 0x100),
    ]);
    prog.register_symbol_finder("index", Arc::new(index), EnablePosition::First)
        .unwrap();
    prog.set_enabled_symbol_finders(&["index"]).unwrap();

    prog.add_thread(Thread {
        tid: ThreadId(42),
        pc: Some(Address::new(0x1000)),
        sp: Some(Address::new(0x6ff0)),
        fp: Some(Address::new(0x7000)),
        crashed: false,
    });
    prog
}

#[test]
fn stack_walk_follows_frame_records()
{
    let prog = frame_chain_program();
    let trace = prog.stack_trace(ThreadId(42)).unwrap();

    assert_eq!(trace.thread, Some(ThreadId(42)));
    assert_eq!(trace.len(), 3);

    let pcs: Vec<u64> = trace.frames.iter().map(|frame| frame.pc.value()).collect();
    assert_eq!(pcs, vec![0x1000, 0x1100, 0x1200]);

    assert_eq!(trace.frames[0].status, FrameStatus::Captured);
    assert_eq!(trace.frames[1].status, FrameStatus::FramePointer);
    assert_eq!(trace.frames[2].status, FrameStatus::FramePointer);

    let names: Vec<&str> = trace
        .frames
        .iter()
        .map(|frame| frame.symbol.as_ref().map_or("?", |symbol| symbol.name.as_str()))
        .collect();
    assert_eq!(names, vec!["leaf_fn", "middle_fn", "outer_fn"]);

    let rendered = trace.to_string();
    assert!(rendered.contains("leaf_fn"));
    assert!(rendered.contains("outer_fn"));
}

#[test]
fn stack_walk_without_registers_is_empty()
{
    let mut prog = Program::new(little_endian_platform());
    prog.add_thread(Thread::with_id(ThreadId(7)));

    let trace = prog.stack_trace(ThreadId(7)).unwrap();
    assert!(trace.is_empty());
    assert_eq!(trace.thread, Some(ThreadId(7)));

    assert!(matches!(prog.stack_trace(ThreadId(8)), Err(ScryError::Lookup(_))));
}

#[test]
fn stack_walk_stops_at_unmapped_frame_pointer()
{
    let mut prog = Program::new(little_endian_platform());
    // No memory mapped at all; only the captured frame survives.
    prog.add_thread(Thread {
        tid: ThreadId(1),
        pc: Some(Address::new(0x1000)),
        sp: None,
        fp: Some(Address::new(0x7000)),
        crashed: false,
    });
    let trace = prog.stack_trace(ThreadId(1)).unwrap();
    assert_eq!(trace.len(), 1);
    assert_eq!(trace.frames[0].status, FrameStatus::Captured);
}

#[test]
fn trace_from_pcs_symbolizes_each_frame()
{
    let prog = frame_chain_program();
    let trace =
        prog.stack_trace_from_pcs(&[Address::new(0x1280), Address::new(0x1040)]);

    assert_eq!(trace.thread, None);
    assert_eq!(trace.len(), 2);
    assert!(trace.frames.iter().all(|frame| frame.status == FrameStatus::PcOnly));
    assert_eq!(
        trace.frames[0].symbol.as_ref().map(|symbol| symbol.name.as_str()),
        Some("outer_fn")
    );
    assert_eq!(
        trace.frames[1].symbol.as_ref().map(|symbol| symbol.name.as_str()),
        Some("leaf_fn")
    );
}

// ---- live attach ----

#[cfg(target_os = "linux")]
#[test]
fn live_attach_models_this_process()
{
    use scry_core::module::ModuleKind;
    use scry_core::types::ProcessId;

    let prog = Program::from_pid(ProcessId::from(std::process::id())).unwrap();
    assert!(prog.flags().is_live);
    assert!(!prog.threads().is_empty());

    let main = prog.main_module().unwrap();
    assert_eq!(main.kind(), ModuleKind::Main);
    assert!(main.is_loaded());

    // The kernel maps a vDSO into every process; it gets its own module.
    let vdso = prog.module_by_name("[vdso]").unwrap();
    assert_eq!(vdso.kind(), ModuleKind::Vdso);
    assert!(vdso.is_loaded());
}
