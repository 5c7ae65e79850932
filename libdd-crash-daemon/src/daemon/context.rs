// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::interruptor::InterruptListener;
use super::Callbacks;
use crate::tracer::Tracer;
use crate::unwinders::UnwindProvider;
use nix::sys::socket::UnixAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the daemon thread needs. Built by `start`, then moved into the daemon thread,
/// which is its only user.
pub(crate) struct DaemonContext {
    pub address: UnixAddr,
    pub provider: &'static dyn UnwindProvider,
    pub report_path: Option<PathBuf>,
    pub tracer: Arc<dyn Tracer>,
    pub callbacks: Option<Callbacks>,
    pub interrupt: InterruptListener,
}
