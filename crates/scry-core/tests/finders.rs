//! Tests for the finder chain protocol: registration, enable/disable,
//! priority order, and error propagation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use scry_core::error::ScryError;
use scry_core::finder::{EnablePosition, TypeFinder};
use scry_core::object::{filename_matches, QualifiedType, TypeInfo, TypeKind, TypeKindSet};
use scry_core::program::Program;
use scry_core::types::Platform;

/// A type finder that counts its invocations and either declines, resolves
/// every query, or fails.
struct ScriptedFinder
{
    calls: AtomicUsize,
    outcome: Outcome,
}

enum Outcome
{
    Decline,
    Resolve,
    Fail,
}

impl ScriptedFinder
{
    fn new(outcome: Outcome) -> Arc<Self>
    {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcome,
        })
    }

    fn calls(&self) -> usize
    {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TypeFinder for ScriptedFinder
{
    fn find(
        &self,
        prog: &Program,
        _kinds: TypeKindSet,
        name: &str,
        _filename: Option<&str>,
    ) -> scry_core::error::Result<Option<QualifiedType>>
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Outcome::Decline => Ok(None),
            Outcome::Resolve => Ok(Some(QualifiedType::unqualified(TypeInfo {
                program: prog.id(),
                name: name.to_owned(),
                kind: TypeKind::Struct,
                size: Some(16),
                filename: None,
            }))),
            Outcome::Fail => Err(ScryError::Lookup("scripted failure".to_owned())),
        }
    }
}

#[test]
fn standard_finder_is_registered_and_enabled()
{
    let prog = Program::new(Platform::host());
    assert_eq!(prog.registered_type_finders(), vec!["standard"]);
    assert_eq!(prog.enabled_type_finders(), vec!["standard"]);
    assert_eq!(prog.registered_object_finders(), vec!["standard"]);
    assert_eq!(prog.registered_symbol_finders(), vec!["standard"]);
    assert_eq!(prog.registered_debug_info_finders(), vec!["standard"]);
}

#[test]
fn duplicate_name_is_rejected()
{
    let mut prog = Program::new(Platform::host());
    let err = prog
        .register_type_finder(
            "standard",
            ScriptedFinder::new(Outcome::Decline),
            EnablePosition::First,
        )
        .unwrap_err();
    assert!(matches!(err, ScryError::InvalidArgument(_)));
    // The failed registration must not disturb the chain.
    assert_eq!(prog.registered_type_finders(), vec!["standard"]);
    assert_eq!(prog.enabled_type_finders(), vec!["standard"]);
}

#[test]
fn enable_positions_order_the_chain()
{
    let mut prog = Program::new(Platform::host());
    prog.register_type_finder("a", ScriptedFinder::new(Outcome::Decline), EnablePosition::First)
        .unwrap();
    prog.register_type_finder(
        "b",
        ScriptedFinder::new(Outcome::Decline),
        EnablePosition::DontEnable,
    )
    .unwrap();
    prog.register_type_finder("c", ScriptedFinder::new(Outcome::Decline), EnablePosition::At(1))
        .unwrap();
    // Past-the-end index appends.
    prog.register_type_finder("d", ScriptedFinder::new(Outcome::Decline), EnablePosition::At(99))
        .unwrap();

    assert_eq!(prog.registered_type_finders(), vec!["standard", "a", "b", "c", "d"]);
    assert_eq!(prog.enabled_type_finders(), vec!["a", "c", "standard", "d"]);
}

#[test]
fn set_enabled_replaces_order_atomically()
{
    let mut prog = Program::new(Platform::host());
    prog.register_type_finder("a", ScriptedFinder::new(Outcome::Decline), EnablePosition::First)
        .unwrap();
    prog.register_type_finder(
        "b",
        ScriptedFinder::new(Outcome::Decline),
        EnablePosition::DontEnable,
    )
    .unwrap();

    prog.set_enabled_type_finders(&["b", "standard"]).unwrap();
    assert_eq!(prog.enabled_type_finders(), vec!["b", "standard"]);

    // Unknown names fail and leave the previous order in place.
    let err = prog.set_enabled_type_finders(&["b", "nonexistent"]).unwrap_err();
    assert!(matches!(err, ScryError::InvalidArgument(_)));
    assert_eq!(prog.enabled_type_finders(), vec!["b", "standard"]);

    // Listing a finder twice is also rejected.
    let err = prog.set_enabled_type_finders(&["b", "b"]).unwrap_err();
    assert!(matches!(err, ScryError::InvalidArgument(_)));
    assert_eq!(prog.enabled_type_finders(), vec!["b", "standard"]);

    prog.set_enabled_type_finders::<&str>(&[]).unwrap();
    assert!(prog.enabled_type_finders().is_empty());
}

#[test]
fn chain_stops_at_first_match()
{
    let mut prog = Program::new(Platform::host());
    let first = ScriptedFinder::new(Outcome::Decline);
    let second = ScriptedFinder::new(Outcome::Resolve);
    let third = ScriptedFinder::new(Outcome::Resolve);
    prog.register_type_finder("first", Arc::clone(&first) as _, EnablePosition::DontEnable)
        .unwrap();
    prog.register_type_finder("second", Arc::clone(&second) as _, EnablePosition::DontEnable)
        .unwrap();
    prog.register_type_finder("third", Arc::clone(&third) as _, EnablePosition::DontEnable)
        .unwrap();
    prog.set_enabled_type_finders(&["first", "second", "third"])
        .unwrap();

    let found = prog.find_type("task_struct", None).unwrap();
    assert_eq!(found.info.name, "task_struct");
    assert_eq!(found.info.kind, TypeKind::Struct);

    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 1);
    assert_eq!(third.calls(), 0);
}

#[test]
fn disabled_finders_are_never_consulted()
{
    let mut prog = Program::new(Platform::host());
    let enabled = ScriptedFinder::new(Outcome::Decline);
    let disabled = ScriptedFinder::new(Outcome::Resolve);
    prog.register_type_finder("enabled", Arc::clone(&enabled) as _, EnablePosition::DontEnable)
        .unwrap();
    prog.register_type_finder(
        "disabled",
        Arc::clone(&disabled) as _,
        EnablePosition::DontEnable,
    )
    .unwrap();
    prog.set_enabled_type_finders(&["enabled"]).unwrap();

    let err = prog.find_type("anything", None).unwrap_err();
    assert!(matches!(err, ScryError::NotFound(_)));
    assert_eq!(enabled.calls(), 1);
    assert_eq!(disabled.calls(), 0);
}

#[test]
fn finder_error_aborts_the_chain()
{
    let mut prog = Program::new(Platform::host());
    let failing = ScriptedFinder::new(Outcome::Fail);
    let fallback = ScriptedFinder::new(Outcome::Resolve);
    prog.register_type_finder("failing", Arc::clone(&failing) as _, EnablePosition::DontEnable)
        .unwrap();
    prog.register_type_finder(
        "fallback",
        Arc::clone(&fallback) as _,
        EnablePosition::DontEnable,
    )
    .unwrap();
    prog.set_enabled_type_finders(&["failing", "fallback"]).unwrap();

    let err = prog.find_type("anything", None).unwrap_err();
    assert!(matches!(err, ScryError::Lookup(_)));
    assert_eq!(fallback.calls(), 0);
}

/// A type finder backed by a fixed table of (name, declaring file, size)
/// records, resolving queries the way a debug-info finder would.
struct FileScopedFinder
{
    records: Vec<(&'static str, &'static str, u64)>,
}

impl TypeFinder for FileScopedFinder
{
    fn find(
        &self,
        prog: &Program,
        _kinds: TypeKindSet,
        name: &str,
        filename: Option<&str>,
    ) -> scry_core::error::Result<Option<QualifiedType>>
    {
        for (record_name, record_file, size) in &self.records {
            if *record_name == name && filename_matches(Some(record_file), filename) {
                return Ok(Some(QualifiedType::unqualified(TypeInfo {
                    program: prog.id(),
                    name: name.to_owned(),
                    kind: TypeKind::Typedef,
                    size: Some(*size),
                    filename: Some((*record_file).to_owned()),
                })));
            }
        }
        Ok(None)
    }
}

#[test]
fn filename_selects_between_same_named_types()
{
    let mut prog = Program::new(Platform::host());
    let finder = Arc::new(FileScopedFinder {
        records: vec![
            ("value_t", "src/alpha/defs.c", 4),
            ("value_t", "src/beta/defs.c", 8),
        ],
    });
    prog.register_type_finder("tables", finder, EnablePosition::First)
        .unwrap();
    prog.set_enabled_type_finders(&["tables"]).unwrap();

    // Without a filename the first declaration wins.
    let found = prog.find_type("value_t", None).unwrap();
    assert_eq!(found.info.size, Some(4));

    // A filename narrows the lookup to the matching declaring file, by
    // whole trailing path components.
    let found = prog.find_type("value_t", Some("beta/defs.c")).unwrap();
    assert_eq!(found.info.size, Some(8));
    assert_eq!(found.info.filename.as_deref(), Some("src/beta/defs.c"));

    let found = prog.find_type("value_t", Some("alpha/defs.c")).unwrap();
    assert_eq!(found.info.size, Some(4));

    // A filename matching no declaration exhausts the chain.
    let err = prog.find_type("value_t", Some("gamma/defs.c")).unwrap_err();
    assert!(matches!(err, ScryError::NotFound(_)));
}

#[test]
fn exhausted_chain_reports_not_found()
{
    let mut prog = Program::new(Platform::host());
    prog.register_type_finder("a", ScriptedFinder::new(Outcome::Decline), EnablePosition::First)
        .unwrap();

    let err = prog.find_type("no_such_type", None).unwrap_err();
    match err {
        ScryError::NotFound(message) => assert!(message.contains("no_such_type")),
        other => panic!("expected NotFound, got {other}"),
    }
}
