// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::maps::MemoryMaps;
use super::{write_frame, UnwindProvider};
use crate::registers::Registers;
use crate::report::ReportSink;
use crate::shared::constants::{DD_CRASHD_MAX_FRAMES, DD_CRASHD_STACK_SCAN_WORDS};
use crate::shared::message::CrashMessage;
use crate::tracer::Tracer;
use nix::unistd::Pid;

const WORD_SIZE: u64 = std::mem::size_of::<u64>() as u64;

/// Reports the crashing pc, then every word above the stack pointer that points into an
/// executable mapping.
pub(crate) struct StackScanUnwinder;

impl UnwindProvider for StackScanUnwinder {
    fn unwind(&self, tracer: &dyn Tracer, sink: &mut ReportSink, message: &CrashMessage) {
        let maps = MemoryMaps::read_or_empty(message.pid);
        let registers = Registers::from_context(&message.context);
        let frames = scan(tracer, Pid::from_raw(message.tid), registers, &maps);
        for (index, pc) in frames.into_iter().enumerate() {
            write_frame(sink, &maps, index, pc);
        }
    }
}

pub(crate) fn scan(
    tracer: &dyn Tracer,
    tid: Pid,
    registers: Registers,
    maps: &MemoryMaps,
) -> Vec<u64> {
    let mut frames = vec![registers.pc];
    for i in 0..DD_CRASHD_STACK_SCAN_WORDS as u64 {
        if frames.len() >= DD_CRASHD_MAX_FRAMES {
            break;
        }
        let addr = registers.sp.saturating_add(i * WORD_SIZE);
        match tracer.read_word(tid, addr) {
            Ok(word) if maps.is_executable(word) => frames.push(word),
            Ok(_) => {}
            // Reached the top of the stack mapping.
            Err(e) => {
                tracing::debug!(tid = tid.as_raw(), addr, error = %e, "Stack scan stopped");
                break;
            }
        }
    }
    frames
}
