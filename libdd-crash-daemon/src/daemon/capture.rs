// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Capture of one crash: attach, wait for stop, dump, unwind, detach.
//!
//! ```text
//!  Attach ──fail──────────────────────────────────────────► Done (nothing to detach)
//!    │ok
//!  WaitForStop ──fail──────────────────────┐
//!    │ok                                   ▼
//!  Dump (header, unwind, trailer, close) ─► Detach ───────► Done
//! ```
//!
//! Every state after a successful attach holds an [`AttachedThread`], and leaving the machine
//! drops it, so the target is never left stopped under a vanished tracer.

use super::context::DaemonContext;
use crate::report::ReportSink;
use crate::shared::message::CrashMessage;
use crate::tracer::AttachedThread;
use nix::unistd::Pid;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CaptureOutcome {
    /// The thread could not be attached; no report was produced.
    AttachFailed(nix::Error),
    /// The thread was attached but never reported a stop; no report was produced.
    WaitFailed(nix::Error),
    /// The stack was dumped. `report` is the written file, if one was configured and created.
    Dumped { report: Option<PathBuf> },
}

enum CaptureState<'a> {
    Attach,
    WaitForStop(AttachedThread<'a>),
    Dump(AttachedThread<'a>),
    Detach(AttachedThread<'a>, CaptureOutcome),
    Done(CaptureOutcome),
}

pub(crate) fn capture(ctx: &DaemonContext, message: &CrashMessage) -> CaptureOutcome {
    let tid = Pid::from_raw(message.tid);
    let mut state = CaptureState::Attach;
    loop {
        state = match state {
            CaptureState::Attach => match AttachedThread::attach(ctx.tracer.as_ref(), tid) {
                Ok(target) => {
                    tracing::info!(tid = message.tid, "Ptrace attach successful");
                    CaptureState::WaitForStop(target)
                }
                Err(e) => {
                    tracing::info!(tid = message.tid, error = %e, "Ptrace attach failed");
                    CaptureState::Done(CaptureOutcome::AttachFailed(e))
                }
            },
            CaptureState::WaitForStop(target) => match target.wait_for_stop() {
                Ok(()) => CaptureState::Dump(target),
                Err(e) => {
                    tracing::info!(tid = message.tid, error = %e, "Waiting for the crashed thread to stop failed");
                    CaptureState::Detach(target, CaptureOutcome::WaitFailed(e))
                }
            },
            CaptureState::Dump(target) => {
                let report = dump(ctx, &target, message);
                CaptureState::Detach(target, CaptureOutcome::Dumped { report })
            }
            CaptureState::Detach(target, outcome) => {
                drop(target);
                CaptureState::Done(outcome)
            }
            CaptureState::Done(outcome) => return outcome,
        }
    }
}

/// Writes the report of a stopped thread and fires the crash callback when a file was written.
fn dump(
    ctx: &DaemonContext,
    target: &AttachedThread<'_>,
    message: &CrashMessage,
) -> Option<PathBuf> {
    let mut sink = ReportSink::create(ctx.report_path.as_deref());
    sink.write_header(message);
    ctx.provider.unwind(target.tracer(), &mut sink, message);
    sink.write_trailer();
    if !sink.close() {
        return None;
    }
    let report = ctx.report_path.clone()?;
    tracing::info!(tid = message.tid, report = %report.display(), "Crash report written");
    if let Some(callbacks) = &ctx.callbacks {
        callbacks.hooks().on_crash(&report);
    }
    Some(report)
}
