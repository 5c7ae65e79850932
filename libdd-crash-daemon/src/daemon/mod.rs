// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle of the single daemon instance of the process.

mod accept_loop;
mod capture;
mod context;
mod interruptor;
mod session;

use crate::error::DaemonError;
use crate::shared::address::resolve_socket_address;
use crate::shared::configuration::DaemonConfig;
use crate::tracer::{PtraceTracer, Tracer};
use crate::unwinders::{UnwindProvider, Unwinder};
use context::DaemonContext;
use interruptor::{interrupt_pipe, Interruptor};
use std::any::Any;
use std::path::Path;
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Hooks invoked by the daemon thread. Every hook has an empty default.
///
/// Hooks run on the daemon thread and must not call [`stop`].
pub trait DaemonCallbacks: Send + Sync + 'static {
    /// The socket is listening. Fires once, possibly after [`start`] has returned.
    fn on_start(&self) {}
    /// A crash report was written to `report_path`. Does not fire when no report path is
    /// configured or the file could not be created.
    fn on_crash(&self, _report_path: &Path) {}
    /// The accept loop has exited. Fires before [`stop`] returns.
    fn on_stop(&self) {}
}

/// The hooks of one daemon instance together with the argument shared by all of them, which is
/// the hooks object itself.
#[derive(Clone)]
pub struct Callbacks {
    hooks: Arc<dyn DaemonCallbacks>,
    argument: Arc<dyn Any + Send + Sync>,
}

impl Callbacks {
    pub fn new<T: DaemonCallbacks>(hooks: Arc<T>) -> Self {
        Self {
            hooks: hooks.clone(),
            argument: hooks,
        }
    }

    /// The hooks object, if it is a `T`.
    pub fn argument<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.argument.clone().downcast::<T>().ok()
    }

    pub(crate) fn hooks(&self) -> &dyn DaemonCallbacks {
        self.hooks.as_ref()
    }
}

struct Daemon {
    interruptor: Interruptor,
    /// Taken by the `stop` call that is joining the thread.
    thread: Option<JoinHandle<()>>,
    callbacks: Option<Callbacks>,
}

static DAEMON: Mutex<Option<Daemon>> = Mutex::new(None);

fn lock_daemon() -> MutexGuard<'static, Option<Daemon>> {
    DAEMON.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Starts the crash daemon on a background thread.
///
/// Returns once the socket is listening. On error nothing is left running and `start` may be
/// called again.
///
/// # Atomicity
/// Concurrent calls are serialized; at most one succeeds until [`stop`] is called.
pub fn start(config: DaemonConfig, callbacks: Option<Callbacks>) -> Result<(), DaemonError> {
    start_with_tracer(config, callbacks, Arc::new(PtraceTracer))
}

pub(crate) fn start_with_tracer(
    config: DaemonConfig,
    callbacks: Option<Callbacks>,
    tracer: Arc<dyn Tracer>,
) -> Result<(), DaemonError> {
    start_with(config, callbacks, tracer, Unwinder::provider)
}

/// Engines compiled into a build, looked up by selector.
type ProviderLookup = fn(Unwinder) -> Option<&'static dyn UnwindProvider>;

fn start_with(
    config: DaemonConfig,
    callbacks: Option<Callbacks>,
    tracer: Arc<dyn Tracer>,
    providers: ProviderLookup,
) -> Result<(), DaemonError> {
    let mut daemon = lock_daemon();
    if daemon.is_some() {
        return Err(DaemonError::AlreadyInitialized);
    }
    if config.socket_name.is_empty() {
        return Err(DaemonError::SocketName);
    }
    let address = resolve_socket_address(&config.socket_name).map_err(|e| {
        tracing::error!(error = ?e, "Invalid crash daemon socket name");
        DaemonError::SocketName
    })?;
    let provider =
        providers(config.unwinder).ok_or(DaemonError::NotSupported(config.unwinder))?;
    let (interruptor, interrupt) = interrupt_pipe().map_err(DaemonError::Pipe)?;

    let ctx = DaemonContext {
        address,
        provider,
        report_path: config.report_path().map(Path::to_path_buf),
        tracer,
        callbacks: callbacks.clone(),
        interrupt,
    };
    let (ready_tx, ready_rx) = mpsc::sync_channel(1);
    let thread = thread::Builder::new()
        .name("dd-crash-daemon".to_string())
        .spawn(move || accept_loop::run(ctx, ready_tx))
        .map_err(DaemonError::Thread)?;

    let setup = match ready_rx.recv() {
        Ok(setup) => setup,
        Err(_) => Err(anyhow::anyhow!(
            "the crash daemon thread exited before listening"
        )),
    };
    if let Err(e) = setup {
        if thread.join().is_err() {
            tracing::error!("The crash daemon thread panicked");
        }
        return Err(DaemonError::Listen(e.into()));
    }

    *daemon = Some(Daemon {
        interruptor,
        thread: Some(thread),
        callbacks,
    });
    tracing::info!(
        socket_name = %config.socket_name,
        unwinder = ?config.unwinder,
        report_path = ?config.report_path(),
        "Crash daemon started"
    );
    Ok(())
}

/// Stops the crash daemon and waits for its thread to exit. A crash being captured is finished
/// first.
///
/// Returns `false` when no daemon is running.
///
/// # Atomicity
/// The daemon lock is released while joining, so hooks may call [`callback_argument`].
pub fn stop() -> bool {
    let thread = {
        let mut daemon = lock_daemon();
        let Some(running) = daemon.as_mut() else {
            return false;
        };
        // Another stop is already joining.
        let Some(thread) = running.thread.take() else {
            return false;
        };
        if let Err(e) = running.interruptor.interrupt() {
            tracing::error!(error = %e, "Could not interrupt the crash daemon thread");
            running.thread = Some(thread);
            return false;
        }
        thread
    };

    if thread.join().is_err() {
        tracing::error!("The crash daemon thread panicked");
    }
    lock_daemon().take();
    tracing::info!("Crash daemon stopped");
    true
}

/// The argument given to [`start`] through [`Callbacks`], if a daemon exists and the argument is
/// a `T`.
pub fn callback_argument<T: Any + Send + Sync>() -> Option<Arc<T>> {
    lock_daemon().as_ref()?.callbacks.as_ref()?.argument::<T>()
}

/// Whether a daemon has been started and is not being stopped.
pub fn is_running() -> bool {
    lock_daemon()
        .as_ref()
        .is_some_and(|daemon| daemon.thread.is_some())
}
