//! # Live Process Backing
//!
//! Attaches a [`Program`] to a running process through procfs: memory
//! segments come from `/proc/<pid>/maps` backed by reads of
//! `/proc/<pid>/mem`, modules from the mapped file names, and threads from
//! `/proc/<pid>/task`.
//!
//! [`Program`]: crate::program::Program

use std::fs;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{Result, ScryError};
use crate::memory::{MemorySegment, SegmentReadFn};
use crate::types::{Address, AddressSpace, ProcessId, Thread, ThreadId};

/// Name the kernel gives the vDSO mapping in `/proc/<pid>/maps`.
pub(crate) const VDSO_NAME: &str = "[vdso]";

/// One line of `/proc/<pid>/maps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MapsEntry
{
    pub start: u64,
    pub end: u64,
    pub readable: bool,
    pub path: Option<PathBuf>,
}

/// Parse one maps line, e.g.
/// `55d0a1c00000-55d0a1c21000 r-xp 00000000 fd:01 393232 /usr/bin/cat`.
pub(crate) fn parse_maps_line(line: &str) -> Option<MapsEntry>
{
    let mut fields = line.split_whitespace();
    let range = fields.next()?;
    let perms = fields.next()?;
    // offset, dev, inode
    let _ = fields.next()?;
    let _ = fields.next()?;
    let _ = fields.next()?;
    let path = fields.next().map(PathBuf::from);

    let (start, end) = range.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    if end <= start {
        return None;
    }

    Some(MapsEntry {
        start,
        end,
        readable: perms.starts_with('r'),
        path,
    })
}

/// Read and parse `/proc/<pid>/maps`.
pub(crate) fn read_maps(pid: ProcessId) -> Result<Vec<MapsEntry>>
{
    let content = fs::read_to_string(format!("/proc/{}/maps", u32::from(pid)))?;
    let entries: Vec<MapsEntry> = content.lines().filter_map(parse_maps_line).collect();
    trace!(pid = u32::from(pid), mappings = entries.len(), "parsed process maps");
    Ok(entries)
}

/// Path of the process's main executable, from `/proc/<pid>/exe`.
pub(crate) fn executable_path(pid: ProcessId) -> Result<PathBuf>
{
    let link = fs::read_link(format!("/proc/{}/exe", u32::from(pid)))?;
    Ok(link)
}

/// Memory segments for every readable mapping, backed by
/// `/proc/<pid>/mem`.
pub(crate) fn memory_segments(pid: ProcessId) -> Result<Vec<MemorySegment>>
{
    let mem = Arc::new(fs::File::open(format!("/proc/{}/mem", u32::from(pid)))?);
    let entries = read_maps(pid)?;
    let mut segments = Vec::new();
    for entry in entries {
        if !entry.readable {
            continue;
        }
        let mem = Arc::clone(&mem);
        let read_fn: SegmentReadFn = Arc::new(move |buf, address, _offset| {
            mem.read_exact_at(buf, address.value()).map_err(|err| {
                if err.kind() == std::io::ErrorKind::UnexpectedEof {
                    ScryError::Unmapped {
                        address: address.value(),
                        space: AddressSpace::Virtual,
                    }
                } else {
                    ScryError::Io(err)
                }
            })
        });
        segments.push(MemorySegment::new(
            Address::new(entry.start),
            entry.end - entry.start,
            AddressSpace::Virtual,
            read_fn,
        ));
    }
    debug!(pid = u32::from(pid), segments = segments.len(), "mapped live process memory");
    Ok(segments)
}

/// Threads of the process, from `/proc/<pid>/task`.
///
/// Live threads come with no register snapshot; they can be enumerated but
/// unwinding them requires injecting registers via `Program::add_thread`.
pub(crate) fn threads(pid: ProcessId) -> Result<Vec<Thread>>
{
    let mut found = Vec::new();
    for entry in fs::read_dir(format!("/proc/{}/task", u32::from(pid)))? {
        let entry = entry?;
        if let Some(tid) = entry.file_name().to_str().and_then(|name| name.parse::<u64>().ok()) {
            found.push(Thread::with_id(ThreadId(tid)));
        }
    }
    found.sort_by_key(|thread| thread.tid);
    Ok(found)
}

/// File-backed mappings grouped into per-file address ranges, for module
/// creation. Returns `(path, lowest start, highest end)` per distinct file.
pub(crate) fn file_mappings(entries: &[MapsEntry]) -> Vec<(PathBuf, u64, u64)>
{
    let mut files: Vec<(PathBuf, u64, u64)> = Vec::new();
    for entry in entries {
        let Some(path) = &entry.path else {
            continue;
        };
        // Pseudo-paths like [heap] and [stack] are not files. The vDSO is
        // the exception: the kernel maps it into every process and its
        // memory reads like any other region.
        let name = path.to_string_lossy();
        if name.starts_with('[') && name != VDSO_NAME {
            continue;
        }
        match files.iter_mut().find(|(existing, _, _)| existing == path) {
            Some((_, start, end)) => {
                *start = (*start).min(entry.start);
                *end = (*end).max(entry.end);
            }
            None => files.push((path.clone(), entry.start, entry.end)),
        }
    }
    files
}
