// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg(target_os = "linux")]
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! This crate implements an out-of-process crash capture daemon.
//!
//! Walking the stack of a crashing thread from inside its own signal handler is fragile: the
//! handler runs in a context where allocation, locking and most library calls are not
//! async-signal-safe. Instead, the signal handler of the crashing process only serializes a small
//! fixed-size [`CrashMessage`] (pid, tid, signal, fault address and the `ucontext_t` snapshot) and
//! sends it over a local socket to this daemon, then blocks waiting for an acknowledgement.
//!
//! The daemon runs on one background thread of a host process:
//! 1. The accept loop listens on a unix socket (abstract namespace unless the name is a path)
//!    with a backlog of one, and waits on the listener and on a self-pipe used for cancellation.
//! 2. Each connection is handled synchronously: the message is read (tolerating short reads),
//!    the capture pipeline runs, and a single `0x00` byte is written back.
//! 3. The capture pipeline attaches to the crashed thread with `ptrace`, waits for it to stop,
//!    writes the report header, runs the configured [`Unwinder`], writes a trailer and detaches.
//!
//! Crashes are processed strictly one at a time. [`start`] and [`stop`] own the single daemon
//! instance of the process.
//!
//! ```no_run
//! use libdd_crash_daemon::{start, stop, DaemonConfig, Unwinder};
//!
//! let config = DaemonConfig::new(
//!     "my-app-crash-socket",
//!     Unwinder::FramePointer,
//!     Some("/data/crash/last.txt".into()),
//! );
//! start(config, None)?;
//! // ...
//! stop();
//! # Ok::<(), libdd_crash_daemon::DaemonError>(())
//! ```

mod client;
mod daemon;
mod error;
mod registers;
mod report;
mod shared;
mod sig_info;
mod tracer;
mod unwinders;

pub use client::send_crash_message;
pub use daemon::{callback_argument, is_running, start, stop, Callbacks, DaemonCallbacks};
pub use error::DaemonError;
pub use registers::Registers;
pub use report::ReportSink;
pub use shared::address::resolve_socket_address;
pub use shared::configuration::DaemonConfig;
pub use shared::message::CrashMessage;
pub use tracer::{PtraceTracer, Tracer};
pub use unwinders::{UnwindProvider, Unwinder};
