//! Stack frame types.

use std::fmt;

use super::symbols::Symbol;
use super::{Address, ThreadId};

/// Indicates how reliable a frame's unwind data is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus
{
    /// Registers came straight from the thread's captured state.
    Captured,
    /// Reconstructed by following saved frame pointers (may be inaccurate
    /// for frames compiled without a frame pointer).
    FramePointer,
    /// Built from a caller-provided program counter with no register state.
    PcOnly,
}

/// One logical frame in a stack trace.
#[derive(Debug, Clone)]
pub struct StackFrame
{
    /// Ordered index within the trace (0 = innermost).
    pub index: usize,
    /// Program counter corresponding to this frame.
    pub pc: Address,
    /// Stack pointer snapshot, if reconstruction produced one.
    pub sp: Option<Address>,
    /// Frame pointer snapshot, if reconstruction produced one.
    pub fp: Option<Address>,
    /// Best-effort symbol covering `pc`.
    pub symbol: Option<Symbol>,
    /// Best-effort source location (`file:line`) for `pc`.
    pub source: Option<(String, u32)>,
    /// Reliability indicator.
    pub status: FrameStatus,
}

impl fmt::Display for StackFrame
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "#{:<3} {}", self.index, self.pc)?;
        if let Some(symbol) = &self.symbol {
            write!(f, " {}", symbol.display_name())?;
        }
        if let Some((file, line)) = &self.source {
            write!(f, " at {file}:{line}")?;
        }
        Ok(())
    }
}

/// A walked stack for one thread
///
/// Produced by [`Program::stack_trace`] and
/// [`Program::stack_trace_from_pcs`]. Frames are ordered innermost first.
///
/// [`Program::stack_trace`]: crate::program::Program::stack_trace
/// [`Program::stack_trace_from_pcs`]: crate::program::Program::stack_trace_from_pcs
#[derive(Debug, Clone)]
pub struct StackTrace
{
    /// Thread the trace belongs to, when walked from a thread.
    pub thread: Option<ThreadId>,
    /// Frames, innermost first.
    pub frames: Vec<StackFrame>,
}

impl StackTrace
{
    /// Number of frames in the trace.
    pub fn len(&self) -> usize
    {
        self.frames.len()
    }

    /// Returns `true` if the trace contains no frames.
    pub fn is_empty(&self) -> bool
    {
        self.frames.is_empty()
    }
}

impl fmt::Display for StackTrace
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        for frame in &self.frames {
            writeln!(f, "{frame}")?;
        }
        Ok(())
    }
}
