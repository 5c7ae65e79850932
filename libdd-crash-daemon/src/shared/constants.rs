// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Backlog of the listening socket. Crashes are processed one at a time, a deeper queue would
/// only hide that behind kernel buffering.
pub const DD_CRASHD_SOCKET_BACKLOG: i32 = 1;

/// Byte written back to the client once the capture of its crash has concluded.
pub const DD_CRASHD_ACK_BYTE: u8 = 0;

/// Byte written into the interruption pipe to wake the daemon thread.
pub const DD_CRASHD_INTERRUPT_BYTE: u8 = 0;

/// Upper bound on the number of frames an unwinder emits for one crash.
pub const DD_CRASHD_MAX_FRAMES: usize = 64;

/// Number of stack words inspected by the stack-scanning unwinder.
pub const DD_CRASHD_STACK_SCAN_WORDS: usize = 2048;

/// First line of every crash report.
pub const DD_CRASHD_REPORT_BANNER: &str =
    "*** *** *** *** *** *** *** *** *** *** *** *** *** *** *** ***";

/// Record terminating every crash report.
pub const DD_CRASHD_REPORT_TRAILER: &str = " ";
