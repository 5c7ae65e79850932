// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Stack unwinding engines. One engine is selected when the daemon starts and used for every
//! crash it captures.

#[cfg(feature = "unwinder-frame-pointer")]
mod frame_pointer;
mod maps;
#[cfg(feature = "unwinder-stack-scan")]
mod stack_scan;

use crate::report::ReportSink;
use crate::shared::message::CrashMessage;
use crate::tracer::Tracer;
use maps::MemoryMaps;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Walks the stack of a stopped, attached thread and writes its frames into the report.
///
/// Engines log their own failures and stop writing; the capture pipeline does not inspect them.
pub trait UnwindProvider: Send + Sync {
    fn unwind(&self, tracer: &dyn Tracer, sink: &mut ReportSink, message: &CrashMessage);
}

/// The closed set of unwinding engines. Which ones are usable depends on the cargo features
/// this crate was built with, see [`Unwinder::provider`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unwinder {
    /// Follows the chain of saved frame pointers. Exact, but stops at the first frame compiled
    /// without frame pointers.
    FramePointer,
    /// Reports every stack word that points into executable code. Works without frame pointers
    /// at the cost of false positives.
    StackScan,
}

impl Unwinder {
    /// The engine implementing this unwinder, or `None` when it is not compiled in.
    pub fn provider(self) -> Option<&'static dyn UnwindProvider> {
        match self {
            #[cfg(feature = "unwinder-frame-pointer")]
            Unwinder::FramePointer => Some(&frame_pointer::FramePointerUnwinder),
            #[cfg(feature = "unwinder-stack-scan")]
            Unwinder::StackScan => Some(&stack_scan::StackScanUnwinder),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    pub fn is_supported(self) -> bool {
        self.provider().is_some()
    }
}

impl FromStr for Unwinder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frame_pointer" => Ok(Unwinder::FramePointer),
            "stack_scan" => Ok(Unwinder::StackScan),
            _ => anyhow::bail!("unknown unwinder {s:?}, expected frame_pointer or stack_scan"),
        }
    }
}

/// Writes one frame line, relative to the start of its mapping when the mapping is known.
pub(crate) fn write_frame(sink: &mut ReportSink, maps: &MemoryMaps, index: usize, pc: u64) {
    let line = match maps.find(pc) {
        Some(map) => format!(
            "    #{index:02} pc {:016x}  {}",
            map.relative_pc(pc),
            map.name()
        ),
        None => format!("    #{index:02} pc {pc:016x}  <unknown>"),
    };
    sink.write_line(&line);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str() {
        assert_eq!(
            "frame_pointer".parse::<Unwinder>().unwrap(),
            Unwinder::FramePointer
        );
        assert_eq!("stack_scan".parse::<Unwinder>().unwrap(), Unwinder::StackScan);
        assert!("libunwind".parse::<Unwinder>().is_err());
    }

    #[test]
    fn compiled_in_engines_are_supported() {
        assert_eq!(
            Unwinder::FramePointer.is_supported(),
            cfg!(feature = "unwinder-frame-pointer")
        );
        assert_eq!(
            Unwinder::StackScan.is_supported(),
            cfg!(feature = "unwinder-stack-scan")
        );
    }
}
