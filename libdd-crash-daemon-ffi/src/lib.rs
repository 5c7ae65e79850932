// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg(target_os = "linux")]
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! C bindings for the crash daemon.

mod callbacks;
mod result;

pub use callbacks::*;
pub use result::*;

use libdd_crash_daemon::{DaemonConfig, Unwinder};
use std::ffi::{c_char, c_void, CStr, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

pub const DDOG_CRASHD_UNWINDER_FRAME_POINTER: u32 = 0;
pub const DDOG_CRASHD_UNWINDER_STACK_SCAN: u32 = 1;

fn unwinder_from_raw(unwinder: u32) -> Option<Unwinder> {
    match unwinder {
        DDOG_CRASHD_UNWINDER_FRAME_POINTER => Some(Unwinder::FramePointer),
        DDOG_CRASHD_UNWINDER_STACK_SCAN => Some(Unwinder::StackScan),
        _ => None,
    }
}

#[no_mangle]
#[must_use]
/// Starts the crash daemon on a background thread and returns once its socket is listening.
///
/// `socket_name` names an abstract unix socket, or a filesystem path when it starts with `.` or
/// `/`. `unwinder` is one of the `DDOG_CRASHD_UNWINDER_*` constants. `report_path` may be null
/// or empty, in which case crashes are captured but no report is kept. `arg` is passed to every
/// callback; any callback may be null.
///
/// # Preconditions
///   No daemon is running.
/// # Safety
///   `socket_name` and `report_path`, when non-null, must point to NUL-terminated strings.
///   The callbacks are invoked on the daemon thread and must be safe to call from there with
///   `arg`; they must not call `ddog_crashd_stop`.
/// # Atomicity
///   Concurrent calls are serialized; at most one succeeds until `ddog_crashd_stop` is called.
pub unsafe extern "C" fn ddog_crashd_start(
    socket_name: *const c_char,
    unwinder: u32,
    report_path: *const c_char,
    on_start: Option<StartCallback>,
    on_crash: Option<CrashCallback>,
    on_stop: Option<StopCallback>,
    arg: *mut c_void,
) -> CrashDaemonResult {
    if libdd_crash_daemon::is_running() {
        return CrashDaemonResult::AlreadyInitialized;
    }
    if socket_name.is_null() {
        return CrashDaemonResult::SocketName;
    }
    let socket_name = CStr::from_ptr(socket_name);
    if socket_name.is_empty() {
        return CrashDaemonResult::SocketName;
    }
    let Ok(socket_name) = socket_name.to_str() else {
        return CrashDaemonResult::InvalidArgument;
    };
    let Some(unwinder) = unwinder_from_raw(unwinder) else {
        tracing::error!(unwinder, "Unknown crash daemon unwinder");
        return CrashDaemonResult::NotSupported;
    };
    let report_path = (!report_path.is_null())
        .then(|| PathBuf::from(OsStr::from_bytes(CStr::from_ptr(report_path).to_bytes())));

    let config = DaemonConfig::new(socket_name, unwinder, report_path);
    let callbacks = FfiCallbacks {
        on_start,
        on_crash,
        on_stop,
        arg,
    };
    match libdd_crash_daemon::start(config, Some(callbacks.into_callbacks())) {
        Ok(()) => CrashDaemonResult::Ok,
        Err(e) => {
            tracing::error!(error = %e, "Could not start the crash daemon");
            (&e).into()
        }
    }
}

#[no_mangle]
/// Stops the crash daemon and waits for its thread to exit. Returns false when no daemon was
/// running.
///
/// # Preconditions
///   None
/// # Safety
///   Must not be called from a daemon callback.
/// # Atomicity
///   Safe to call concurrently; only one call returns true per started daemon.
pub extern "C" fn ddog_crashd_stop() -> bool {
    libdd_crash_daemon::stop()
}

#[no_mangle]
/// Returns the `arg` given to `ddog_crashd_start`, or null when no daemon is running.
///
/// # Preconditions
///   None
/// # Safety
///   None
pub extern "C" fn ddog_crashd_get_callback_arg() -> *mut c_void {
    libdd_crash_daemon::callback_argument::<FfiCallbacks>()
        .map_or(std::ptr::null_mut(), |callbacks| callbacks.arg)
}
