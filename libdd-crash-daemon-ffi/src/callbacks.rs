// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use libdd_crash_daemon::{Callbacks, DaemonCallbacks};
use std::ffi::{c_char, c_void, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::Arc;

pub type StartCallback = unsafe extern "C" fn(arg: *mut c_void);
/// `report_path` is only valid for the duration of the call.
pub type CrashCallback = unsafe extern "C" fn(report_path: *const c_char, arg: *mut c_void);
pub type StopCallback = unsafe extern "C" fn(arg: *mut c_void);

pub(crate) struct FfiCallbacks {
    pub on_start: Option<StartCallback>,
    pub on_crash: Option<CrashCallback>,
    pub on_stop: Option<StopCallback>,
    pub arg: *mut c_void,
}

impl FfiCallbacks {
    pub fn into_callbacks(self) -> Callbacks {
        Callbacks::new(Arc::new(self))
    }
}

// The caller of ddog_crashd_start vouches that `arg` may be used from the daemon thread.
unsafe impl Send for FfiCallbacks {}
unsafe impl Sync for FfiCallbacks {}

impl DaemonCallbacks for FfiCallbacks {
    fn on_start(&self) {
        if let Some(on_start) = self.on_start {
            unsafe { on_start(self.arg) }
        }
    }

    fn on_crash(&self, report_path: &Path) {
        let Some(on_crash) = self.on_crash else {
            return;
        };
        match CString::new(report_path.as_os_str().as_bytes()) {
            Ok(path) => unsafe { on_crash(path.as_ptr(), self.arg) },
            Err(e) => tracing::warn!(error = %e, "Crash report path is not representable in C"),
        }
    }

    fn on_stop(&self) {
        if let Some(on_stop) = self.on_stop {
            unsafe { on_stop(self.arg) }
        }
    }
}
