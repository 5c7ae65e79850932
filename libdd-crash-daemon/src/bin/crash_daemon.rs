// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Standalone crash daemon.
//!
//! Usage: `crash-daemon [config.json]`. Without a config file the `DD_CRASH_DAEMON_SOCKET`,
//! `DD_CRASH_DAEMON_UNWINDER` and `DD_CRASH_DAEMON_REPORT_PATH` variables are used. Runs until
//! SIGINT or SIGTERM.

#[cfg(not(target_os = "linux"))]
fn main() {}

#[cfg(target_os = "linux")]
fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use libdd_crash_daemon::{Callbacks, DaemonCallbacks, DaemonConfig};
    use nix::sys::signal::{SigSet, Signal};
    use std::path::Path;
    use std::sync::Arc;
    use tracing::info;
    use tracing_subscriber::EnvFilter;

    struct LoggingCallbacks;

    impl DaemonCallbacks for LoggingCallbacks {
        fn on_start(&self) {
            info!("Crash daemon ready");
        }

        fn on_crash(&self, report_path: &Path) {
            info!(report = %report_path.display(), "Crash captured");
        }

        fn on_stop(&self) {
            info!("Crash daemon done");
        }
    }

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = match std::env::args_os().nth(1) {
        Some(path) => DaemonConfig::from_json_file(path)?,
        None => DaemonConfig::from_env()?,
    };

    // Blocked before the daemon thread exists so that it inherits the mask.
    let mut signals = SigSet::empty();
    signals.add(Signal::SIGINT);
    signals.add(Signal::SIGTERM);
    signals
        .thread_block()
        .context("could not block termination signals")?;

    libdd_crash_daemon::start(config, Some(Callbacks::new(Arc::new(LoggingCallbacks))))?;
    let signal = signals.wait().context("waiting for a termination signal failed")?;
    info!(?signal, "Shutting down");
    libdd_crash_daemon::stop();
    Ok(())
}
