// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use libdd_crash_daemon::DaemonError;

/// Outcome of `ddog_crashd_start`. Discriminants are stable.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CrashDaemonResult {
    Ok = 0,
    AlreadyInitialized = 1,
    SocketName = 2,
    NotSupported = 3,
    Pipe = 4,
    Thread = 5,
    Listen = 6,
    /// A string argument was not valid UTF-8.
    InvalidArgument = 7,
}

impl From<&DaemonError> for CrashDaemonResult {
    fn from(value: &DaemonError) -> Self {
        match value {
            DaemonError::AlreadyInitialized => Self::AlreadyInitialized,
            DaemonError::SocketName => Self::SocketName,
            DaemonError::NotSupported(_) => Self::NotSupported,
            DaemonError::Pipe(_) => Self::Pipe,
            DaemonError::Thread(_) => Self::Thread,
            DaemonError::Listen(_) => Self::Listen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants() {
        assert_eq!(CrashDaemonResult::Ok as u32, 0);
        assert_eq!(
            CrashDaemonResult::from(&DaemonError::SocketName),
            CrashDaemonResult::SocketName
        );
        assert_eq!(
            CrashDaemonResult::from(&DaemonError::Listen("bind failed".into())),
            CrashDaemonResult::Listen
        );
    }
}
