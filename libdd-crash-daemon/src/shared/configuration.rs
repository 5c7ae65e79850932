// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::unwinders::Unwinder;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DD_CRASHD_SOCKET_ENV: &str = "DD_CRASH_DAEMON_SOCKET";
pub const DD_CRASHD_UNWINDER_ENV: &str = "DD_CRASH_DAEMON_UNWINDER";
pub const DD_CRASHD_REPORT_PATH_ENV: &str = "DD_CRASH_DAEMON_REPORT_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Name the listening socket is bound to, see [`crate::resolve_socket_address`].
    pub socket_name: String,
    pub unwinder: Unwinder,
    /// File the report of each captured crash is written to. Each crash truncates it.
    /// `None` means reports are produced into a null sink and discarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn new(
        socket_name: impl Into<String>,
        unwinder: Unwinder,
        report_path: Option<PathBuf>,
    ) -> Self {
        // An empty path is the same as no path.
        let report_path = report_path.filter(|p| !p.as_os_str().is_empty());
        Self {
            socket_name: socket_name.into(),
            unwinder,
            report_path,
        }
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.report_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("could not read daemon config {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("could not parse daemon config {}", path.display()))?;
        Ok(Self::new(config.socket_name, config.unwinder, config.report_path))
    }

    /// Reads the configuration from `DD_CRASH_DAEMON_*` environment variables. The unwinder
    /// defaults to [`Unwinder::FramePointer`] when unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let socket_name = std::env::var(DD_CRASHD_SOCKET_ENV)
            .with_context(|| format!("{DD_CRASHD_SOCKET_ENV} is not set"))?;
        let unwinder = match std::env::var(DD_CRASHD_UNWINDER_ENV) {
            Ok(s) => s.parse()?,
            Err(_) => Unwinder::FramePointer,
        };
        let report_path = std::env::var_os(DD_CRASHD_REPORT_PATH_ENV).map(PathBuf::from);
        Ok(Self::new(socket_name, unwinder, report_path))
    }
}
