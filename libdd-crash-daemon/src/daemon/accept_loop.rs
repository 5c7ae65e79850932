// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::context::DaemonContext;
use super::interruptor::Readiness;
use super::session::handle_client;
use crate::shared::constants::DD_CRASHD_SOCKET_BACKLOG;
use anyhow::Context;
use nix::errno::Errno;
use nix::sys::socket::{
    accept4, bind, listen, setsockopt, socket, sockopt, AddressFamily, Backlog, SockFlag,
    SockType, UnixAddr,
};
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};
use std::sync::mpsc::SyncSender;

/// Creates the listening socket. A socket file left at a path address by an earlier run is
/// removed first.
pub(crate) fn bind_listener(address: &UnixAddr) -> anyhow::Result<OwnedFd> {
    if let Some(path) = address.path() {
        if std::fs::symlink_metadata(path).is_ok() {
            std::fs::remove_file(path)
                .with_context(|| format!("could not delete previous socket at {path:?}"))?;
        }
    }
    let listener = socket(
        AddressFamily::Unix,
        SockType::Stream,
        SockFlag::SOCK_NONBLOCK | SockFlag::SOCK_CLOEXEC,
        None,
    )
    .context("Could not create the unix socket")?;
    setsockopt(&listener, sockopt::ReuseAddr, &true).context("Could not set SO_REUSEADDR")?;
    bind(listener.as_raw_fd(), address)
        .with_context(|| format!("Could not bind the unix socket to {address}"))?;
    listen(&listener, Backlog::new(DD_CRASHD_SOCKET_BACKLOG)?)
        .context("Could not listen on the unix socket")?;
    Ok(listener)
}

/// Body of the daemon thread.
///
/// The outcome of the listener setup is sent on `ready` before anything else happens, so
/// `start` can report it. `on_start` fires only after a successful setup, `on_stop` once the
/// accept loop has exited.
pub(crate) fn run(ctx: DaemonContext, ready: SyncSender<anyhow::Result<()>>) {
    let listener = match bind_listener(&ctx.address) {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = ?e, "Crash daemon could not listen");
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    tracing::info!(address = %ctx.address, "Crash daemon listening");

    if let Some(callbacks) = &ctx.callbacks {
        callbacks.hooks().on_start();
    }
    accept_connections(&ctx, &listener);
    drop(listener);
    if let Some(callbacks) = &ctx.callbacks {
        callbacks.hooks().on_stop();
    }
    tracing::info!("Crash daemon thread exiting");
}

/// Serves connections one at a time until a stop is requested or waiting fails.
fn accept_connections(ctx: &DaemonContext, listener: &OwnedFd) {
    loop {
        match ctx.interrupt.wait_readable(listener.as_fd()) {
            Ok(Readiness::Ready) => {}
            Ok(Readiness::Interrupted) => {
                tracing::debug!("Crash daemon stop requested");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "Waiting for crash connections failed");
                return;
            }
        }
        let conn = match accept4(listener.as_raw_fd(), SockFlag::SOCK_CLOEXEC) {
            // Safety: accept4 just returned this descriptor and nothing else owns it.
            Ok(fd) => unsafe { OwnedFd::from_raw_fd(fd) },
            Err(Errno::EAGAIN) | Err(Errno::EINTR) | Err(Errno::ECONNABORTED) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "Accepting a crash connection failed");
                continue;
            }
        };
        let outcome = handle_client(ctx, conn);
        tracing::debug!(?outcome, "Crash connection closed");
    }
}
