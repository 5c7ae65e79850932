// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::capture::{capture, CaptureOutcome};
use super::context::DaemonContext;
use super::interruptor::Readiness;
use crate::shared::constants::DD_CRASHD_ACK_BYTE;
use crate::shared::message::{MessageBuffer, CRASH_MESSAGE_SIZE};
use nix::errno::Errno;
use nix::sys::socket::{recv, send, MsgFlags};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SessionOutcome {
    /// A full message was received, captured and acknowledged.
    Captured(CaptureOutcome),
    /// A stop was requested before the message was complete.
    Interrupted,
    /// The client went away before sending a full message.
    Disconnected { received: usize },
    /// Waiting on or reading from the connection failed.
    Failed(Errno),
}

/// Serves one accepted connection: reads one crash message, captures the crash and writes the
/// acknowledgement byte. The connection is closed when this returns.
pub(crate) fn handle_client(ctx: &DaemonContext, conn: OwnedFd) -> SessionOutcome {
    let mut buffer = MessageBuffer::new();
    let message = loop {
        if let Some(message) = buffer.message() {
            break message;
        }
        match ctx.interrupt.wait_readable(conn.as_fd()) {
            Ok(Readiness::Ready) => {}
            Ok(Readiness::Interrupted) => {
                tracing::debug!(received = buffer.filled(), "Client session interrupted");
                return SessionOutcome::Interrupted;
            }
            Err(e) => {
                tracing::error!(error = %e, "Waiting on the client connection failed");
                return SessionOutcome::Failed(e);
            }
        }
        match recv(conn.as_raw_fd(), buffer.unfilled_mut(), MsgFlags::empty()) {
            Ok(0) => {
                tracing::warn!(
                    received = buffer.filled(),
                    expected = CRASH_MESSAGE_SIZE,
                    "Client disconnected before sending a complete crash message"
                );
                return SessionOutcome::Disconnected {
                    received: buffer.filled(),
                };
            }
            Ok(n) => buffer.advance(n),
            Err(Errno::EINTR) | Err(Errno::EAGAIN) => {}
            Err(e) => {
                tracing::error!(error = %e, "Reading the crash message failed");
                return SessionOutcome::Failed(e);
            }
        }
    };

    tracing::info!(
        pid = message.pid,
        tid = message.tid,
        signo = message.signo,
        "Received crash message"
    );
    let outcome = capture(ctx, &message);

    if let Err(e) = send(
        conn.as_raw_fd(),
        &[DD_CRASHD_ACK_BYTE],
        MsgFlags::MSG_NOSIGNAL,
    ) {
        tracing::warn!(tid = message.tid, error = %e, "Could not acknowledge crash message");
    }
    SessionOutcome::Captured(outcome)
}
