//! Process and thread types.

use super::Address;

/// Process identifier (PID)
///
/// A PID is a unique number assigned to each running process by the operating
/// system. Using a newtype pattern (`struct ProcessId(u32)`) instead of a raw
/// `u32` provides:
/// - **Type safety**: Prevents accidentally passing a random number where a PID is expected
/// - **Self-documenting code**: Makes it clear what the value represents
///
/// ## Example
///
/// ```rust
/// use scry_core::types::ProcessId;
///
/// let pid = ProcessId::from(12345);
/// assert_eq!(u32::from(pid), 12345);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

/// Thread identifier
///
/// Uniquely identifies a thread within the inspected target. For live Linux
/// processes this is the kernel TID; for core dumps it is the TID recorded in
/// the dump's thread notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

impl ThreadId
{
    /// Get the raw `u64` representation of the thread identifier.
    pub fn raw(&self) -> u64
    {
        self.0
    }
}

impl From<u64> for ThreadId
{
    fn from(tid: u64) -> Self
    {
        ThreadId(tid)
    }
}

/// One thread of the inspected target
///
/// Carries the minimal register snapshot the core needs for stack walking:
/// program counter, stack pointer, and frame pointer. Targets that cannot
/// provide registers (e.g. a live process that was enumerated but not
/// stopped) leave them as `None`; such threads can be listed but not
/// unwound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thread
{
    /// Thread identifier.
    pub tid: ThreadId,
    /// Program counter at the time of capture.
    pub pc: Option<Address>,
    /// Stack pointer at the time of capture.
    pub sp: Option<Address>,
    /// Frame pointer at the time of capture.
    pub fp: Option<Address>,
    /// Whether this thread caused the target to crash (core dumps only).
    pub crashed: bool,
}

impl Thread
{
    /// A thread known only by id, with no register snapshot.
    pub fn with_id(tid: ThreadId) -> Self
    {
        Self {
            tid,
            pc: None,
            sp: None,
            fp: None,
            crashed: false,
        }
    }
}
