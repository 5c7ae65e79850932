// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::maps::MemoryMaps;
use super::{write_frame, UnwindProvider};
use crate::registers::Registers;
use crate::report::ReportSink;
use crate::shared::constants::DD_CRASHD_MAX_FRAMES;
use crate::shared::message::CrashMessage;
use crate::tracer::Tracer;
use nix::unistd::Pid;

const WORD_SIZE: u64 = std::mem::size_of::<u64>() as u64;

/// Follows the saved frame-pointer chain. On both x86_64 and aarch64 a frame record is
/// `[fp] = caller fp`, `[fp + 8] = return address`.
pub(crate) struct FramePointerUnwinder;

impl UnwindProvider for FramePointerUnwinder {
    fn unwind(&self, tracer: &dyn Tracer, sink: &mut ReportSink, message: &CrashMessage) {
        let maps = MemoryMaps::read_or_empty(message.pid);
        let registers = Registers::from_context(&message.context);
        let (frames, error) = walk(tracer, Pid::from_raw(message.tid), registers);
        for (index, pc) in frames.into_iter().enumerate() {
            write_frame(sink, &maps, index, pc);
        }
        if let Some((addr, e)) = error {
            tracing::warn!(tid = message.tid, addr, error = %e, "Frame pointer walk stopped");
        }
    }
}

/// Returns the program counters of the walked frames, innermost first, and the read failure
/// that ended the walk, if any.
pub(crate) fn walk(
    tracer: &dyn Tracer,
    tid: Pid,
    registers: Registers,
) -> (Vec<u64>, Option<(u64, nix::Error)>) {
    let mut frames = vec![registers.pc];
    let mut fp = registers.fp;
    while frames.len() < DD_CRASHD_MAX_FRAMES {
        if fp == 0 || fp % WORD_SIZE != 0 {
            break;
        }
        let next_fp = match tracer.read_word(tid, fp) {
            Ok(v) => v,
            Err(e) => return (frames, Some((fp, e))),
        };
        let return_address = match tracer.read_word(tid, fp + WORD_SIZE) {
            Ok(v) => v,
            Err(e) => return (frames, Some((fp + WORD_SIZE, e))),
        };
        if return_address == 0 {
            break;
        }
        frames.push(return_address);
        // Callers live at higher addresses; anything else is a corrupt or looping chain.
        if next_fp <= fp {
            break;
        }
        fp = next_fp;
    }
    (frames, None)
}
