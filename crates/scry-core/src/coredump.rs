//! # Core Dump Backing
//!
//! Attaches a [`Program`] to an ELF core dump (or `/proc/kcore` for the
//! live kernel): each loadable segment becomes a memory segment backed by
//! positioned reads of the dump file, so even very large dumps are never
//! read into memory wholesale.
//!
//! [`Program`]: crate::program::Program

use std::fs;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;

use ::object::read::ReadCache;
use ::object::{Object as ObjectFile, ObjectSegment};
use tracing::debug;

use crate::error::{Result, ScryError};
use crate::memory::{MemorySegment, SegmentReadFn};
use crate::types::{Address, AddressSpace, Architecture, ByteOrder, Platform};

/// Segments and platform extracted from a core dump's program headers.
pub(crate) struct CoreLayout
{
    pub platform: Platform,
    pub segments: Vec<MemorySegment>,
}

/// Parse `path` as an ELF core file and build file-backed memory segments.
///
/// A segment whose in-memory size exceeds its file size is zero-filled past
/// the file-backed prefix, matching how the kernel truncates all-zero pages
/// when writing dumps.
pub(crate) fn load_core(path: &Path, space: AddressSpace) -> Result<CoreLayout>
{
    let parse_handle = fs::File::open(path)?;
    let cache = ReadCache::new(parse_handle);
    let parsed = ::object::File::parse(&cache)
        .map_err(|err| ScryError::Parse(format!("failed to parse {}: {err}", path.display())))?;

    let architecture = match parsed.architecture() {
        ::object::Architecture::Aarch64 => Architecture::Arm64,
        ::object::Architecture::X86_64 => Architecture::X86_64,
        _ => Architecture::Unknown("unknown"),
    };
    let byte_order = if parsed.is_little_endian() {
        ByteOrder::Little
    } else {
        ByteOrder::Big
    };
    let platform = Platform::new(architecture, byte_order);

    // Separate handle for the read closures; the parse handle stays owned
    // by the now-dropped cache.
    let data_handle = Arc::new(fs::File::open(path)?);
    let mut segments = Vec::new();
    for segment in parsed.segments() {
        let mem_size = segment.size();
        if mem_size == 0 {
            continue;
        }
        let address = segment.address();
        let (file_offset, file_size) = segment.file_range();

        let file = Arc::clone(&data_handle);
        let read_fn: SegmentReadFn = Arc::new(move |buf, _address, offset| {
            let backed = file_size.saturating_sub(offset);
            let split = usize::try_from(backed.min(buf.len() as u64)).unwrap_or(buf.len());
            let (prefix, tail) = buf.split_at_mut(split);
            if !prefix.is_empty() {
                file.read_exact_at(prefix, file_offset + offset)?;
            }
            tail.fill(0);
            Ok(())
        });
        segments.push(MemorySegment::new(
            Address::new(address),
            mem_size,
            space,
            read_fn,
        ));
    }

    debug!(
        path = %path.display(),
        segments = segments.len(),
        architecture = ?platform.architecture(),
        "loaded core dump layout"
    );
    Ok(CoreLayout { platform, segments })
}
