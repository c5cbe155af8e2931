//! # Memory Reader
//!
//! Resolves virtual or physical address ranges to bytes by consulting
//! registered memory segments.
//!
//! A segment is a contiguous address range plus a byte-producing callback.
//! The callback may be backed by anything: a live-process `/proc/<pid>/mem`
//! read, a slice of a core-dump file, or an in-memory buffer injected by a
//! test. The reader itself performs no I/O; failures from the callback
//! (backing process gone, file truncated) propagate verbatim.
//!
//! A read is satisfied by exactly one segment whose range contains the whole
//! request. Partial coverage is treated the same as no coverage and fails
//! with [`ScryError::Unmapped`]. When segments overlap, the most recently
//! registered one wins, so a later registration can shadow an earlier one
//! without ambiguity.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::{Result, ScryError};
use crate::types::{Address, AddressSpace, ByteOrder};

/// Callback producing the bytes of one segment.
///
/// Arguments: destination buffer (read exactly `buf.len()` bytes), the
/// absolute target address being read, and the offset of that address from
/// the segment's start.
pub type SegmentReadFn = Arc<dyn Fn(&mut [u8], Address, u64) -> Result<()>>;

/// A contiguous address range backed by a byte-producing callback.
#[derive(Clone)]
pub struct MemorySegment
{
    address: Address,
    size: u64,
    space: AddressSpace,
    read_fn: SegmentReadFn,
}

impl MemorySegment
{
    /// Create a segment covering `[address, address + size)` in `space`.
    pub fn new(address: Address, size: u64, space: AddressSpace, read_fn: SegmentReadFn) -> Self
    {
        Self {
            address,
            size,
            space,
            read_fn,
        }
    }

    /// First address covered by the segment.
    pub fn address(&self) -> Address
    {
        self.address
    }

    /// Length of the segment in bytes.
    pub fn size(&self) -> u64
    {
        self.size
    }

    /// Address space the segment is registered in.
    pub fn space(&self) -> AddressSpace
    {
        self.space
    }

    /// Whether the segment covers the whole range `[address, address + size)`.
    fn covers(&self, address: Address, size: u64) -> bool
    {
        let start = self.address.value();
        let Some(end) = start.checked_add(self.size) else {
            return false;
        };
        let req_start = address.value();
        let Some(req_end) = req_start.checked_add(size) else {
            return false;
        };
        req_start >= start && req_end <= end
    }
}

impl fmt::Debug for MemorySegment
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("MemorySegment")
            .field("address", &self.address)
            .field("size", &self.size)
            .field("space", &self.space)
            .finish_non_exhaustive()
    }
}

/// Registry of memory segments plus the read entry points.
#[derive(Default)]
pub struct MemoryReader
{
    segments: Vec<MemorySegment>,
}

impl MemoryReader
{
    /// Create an empty reader with no segments.
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Register a segment.
    ///
    /// Later registrations shadow earlier, overlapping ones.
    pub fn add_segment(&mut self, segment: MemorySegment)
    {
        trace!(
            address = %segment.address(),
            size = segment.size(),
            space = %segment.space(),
            "registering memory segment"
        );
        self.segments.push(segment);
    }

    /// Number of registered segments (all address spaces).
    pub fn segment_count(&self) -> usize
    {
        self.segments.len()
    }

    /// Read `size` bytes at `address` from the given address space.
    ///
    /// ## Errors
    ///
    /// - `Unmapped`: no single segment covers the full range
    /// - Any error the owning segment's callback produces
    pub fn read(&self, address: Address, size: u64, space: AddressSpace) -> Result<Vec<u8>>
    {
        let segment = self
            .segments
            .iter()
            .rev()
            .find(|segment| segment.space == space && segment.covers(address, size))
            .ok_or(ScryError::Unmapped {
                address: address.value(),
                space,
            })?;

        let mut buf = vec![0u8; usize::try_from(size).map_err(|_| {
            ScryError::InvalidArgument(format!("read size {size} exceeds addressable memory"))
        })?];
        let offset = address.value() - segment.address.value();
        (segment.read_fn)(&mut buf, address, offset)?;
        Ok(buf)
    }

    /// Read a fixed-width little- or big-endian unsigned integer.
    ///
    /// `width` must be 1, 2, 4, or 8 bytes.
    pub fn read_uint(
        &self,
        address: Address,
        width: u8,
        space: AddressSpace,
        byte_order: ByteOrder,
    ) -> Result<u64>
    {
        debug_assert!(matches!(width, 1 | 2 | 4 | 8));
        let bytes = self.read(address, u64::from(width), space)?;
        let mut value = 0u64;
        match byte_order {
            ByteOrder::Little => {
                for &byte in bytes.iter().rev() {
                    value = (value << 8) | u64::from(byte);
                }
            }
            ByteOrder::Big => {
                for &byte in &bytes {
                    value = (value << 8) | u64::from(byte);
                }
            }
        }
        Ok(value)
    }
}

impl fmt::Debug for MemoryReader
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("MemoryReader")
            .field("segments", &self.segments.len())
            .finish()
    }
}

/// Convenience constructor for a segment backed by an owned byte buffer.
///
/// Used by tests and by synthetic targets; reads copy out of the buffer.
pub fn buffer_segment(address: Address, bytes: Vec<u8>, space: AddressSpace) -> MemorySegment
{
    let size = bytes.len() as u64;
    let data = Arc::new(bytes);
    MemorySegment::new(
        address,
        size,
        space,
        Arc::new(move |buf, _address, offset| {
            let start = offset as usize;
            buf.copy_from_slice(&data[start..start + buf.len()]);
            Ok(())
        }),
    )
}
