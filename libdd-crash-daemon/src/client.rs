// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::shared::address::resolve_socket_address;
use crate::shared::constants::DD_CRASHD_ACK_BYTE;
use crate::shared::message::CrashMessage;
use anyhow::Context;
use nix::sys::socket::{connect, socket, AddressFamily, SockFlag, SockType};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;

/// Reports a crash to the daemon listening on `socket_name` and blocks until the daemon has
/// finished capturing it.
///
/// This allocates, so it is meant for helper processes and tests rather than signal handlers.
/// A signal handler writes [`CrashMessage::as_bytes`] to an already connected socket instead.
pub fn send_crash_message(socket_name: &str, message: &CrashMessage) -> anyhow::Result<()> {
    let mut stream = connect_to_daemon(socket_name)?;
    stream
        .write_all(message.as_bytes())
        .context("Could not send the crash message")?;
    let mut ack = [0u8; 1];
    stream
        .read_exact(&mut ack)
        .context("The crash daemon closed the connection without acknowledging")?;
    anyhow::ensure!(
        ack[0] == DD_CRASHD_ACK_BYTE,
        "Unexpected acknowledgement byte {:#04x}",
        ack[0]
    );
    Ok(())
}

pub(crate) fn connect_to_daemon(socket_name: &str) -> anyhow::Result<UnixStream> {
    let address = resolve_socket_address(socket_name)?;
    let fd = socket(
        AddressFamily::Unix,
        SockType::Stream,
        SockFlag::SOCK_CLOEXEC,
        None,
    )
    .context("Could not create the unix socket")?;
    connect(fd.as_raw_fd(), &address)
        .with_context(|| format!("Could not connect to the crash daemon at {address}"))?;
    Ok(UnixStream::from(fd))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nobody_listening() {
        let name = format!("dd-crashd-nobody-{}", std::process::id());
        let err = send_crash_message(&name, &CrashMessage::new(1, 1, 11, 1, 0)).unwrap_err();
        assert!(err.to_string().contains("Could not connect"));
    }
}
