// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::unwinders::Unwinder;

/// Outcomes of [`crate::start`] that prevent the daemon from running.
///
/// Each precondition violation has its own variant so hosts can tell them apart. When any of
/// these is returned, no daemon state is left behind and `start` may be retried.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("the crash daemon is already running")]
    AlreadyInitialized,
    #[error("the crash daemon socket name must not be empty")]
    SocketName,
    #[error("unwinder {0:?} is not compiled into this build")]
    NotSupported(Unwinder),
    #[error("could not create the interruption pipe: {0}")]
    Pipe(#[source] nix::Error),
    #[error("could not spawn the crash daemon thread: {0}")]
    Thread(#[source] std::io::Error),
    #[error("could not listen on the crash daemon socket: {0}")]
    Listen(#[source] Box<dyn std::error::Error + Send + Sync>),
}
