//! # Stack Traces
//!
//! Frame-pointer stack walking and frame symbolization.
//!
//! The walk assumes the conventional frame record layout shared by x86-64
//! and AArch64 frame-pointer builds: the frame pointer addresses a pair of
//! machine words holding the saved caller frame pointer and the return
//! address. Frames compiled without a frame pointer are invisible to this
//! walk; the trace simply ends where the chain breaks.

use tracing::trace;

use crate::error::{Result, ScryError};
use crate::program::Program;
use crate::types::{Address, FrameStatus, StackFrame, StackTrace, Thread};

/// Hard cap on walked frames, against corrupted or cyclic chains.
const MAX_FRAMES: usize = 128;

/// Walk a thread's stack from its captured registers.
///
/// A thread without a captured program counter yields an empty trace. The
/// walk stops cleanly at the first unmapped read, zero return address, or
/// non-increasing frame pointer.
pub(crate) fn unwind(prog: &Program, thread: &Thread) -> Result<StackTrace>
{
    let mut frames = Vec::new();
    let Some(pc) = thread.pc else {
        return Ok(StackTrace {
            thread: Some(thread.tid),
            frames,
        });
    };

    frames.push(make_frame(prog, 0, pc, thread.sp, thread.fp, FrameStatus::Captured));

    let word = u64::from(prog.platform().word_size());
    let mut fp = thread.fp;
    while let Some(frame_pointer) = fp {
        if frames.len() >= MAX_FRAMES || frame_pointer == Address::ZERO {
            break;
        }

        // Frame record: [saved caller fp, return address].
        let saved_fp = match prog.read_word(frame_pointer) {
            Ok(value) => value,
            Err(ScryError::Unmapped { .. }) => break,
            Err(err) => return Err(err),
        };
        let return_address = match frame_pointer
            .checked_add(word)
            .map(|slot| prog.read_word(slot))
        {
            Some(Ok(value)) => value,
            Some(Err(ScryError::Unmapped { .. })) | None => break,
            Some(Err(err)) => return Err(err),
        };
        if return_address == 0 {
            break;
        }

        let next_fp = if saved_fp > frame_pointer.value() {
            Some(Address::new(saved_fp))
        } else {
            None
        };
        frames.push(make_frame(
            prog,
            frames.len(),
            Address::new(return_address),
            None,
            next_fp,
            FrameStatus::FramePointer,
        ));
        fp = next_fp;
    }

    trace!(tid = thread.tid.raw(), frames = frames.len(), "walked stack");
    Ok(StackTrace {
        thread: Some(thread.tid),
        frames,
    })
}

/// Build a trace from caller-provided program counters, symbolizing each.
pub(crate) fn trace_from_pcs(prog: &Program, pcs: &[Address]) -> StackTrace
{
    let frames = pcs
        .iter()
        .enumerate()
        .map(|(index, &pc)| make_frame(prog, index, pc, None, None, FrameStatus::PcOnly))
        .collect();
    StackTrace {
        thread: None,
        frames,
    }
}

fn make_frame(
    prog: &Program,
    index: usize,
    pc: Address,
    sp: Option<Address>,
    fp: Option<Address>,
    status: FrameStatus,
) -> StackFrame
{
    StackFrame {
        index,
        pc,
        sp,
        fp,
        symbol: prog.frame_symbol(pc),
        source: prog.frame_source(pc),
        status,
    }
}
