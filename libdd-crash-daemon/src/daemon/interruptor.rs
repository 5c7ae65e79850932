// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Self-pipe used to interrupt the blocking waits of the daemon thread.
//!
//! The pipe is never drained: once the interrupt byte is written every later wait reports
//! [`Readiness::Interrupted`], so the daemon thread unwinds through each enclosing loop.

use crate::shared::constants::DD_CRASHD_INTERRUPT_BYTE;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::unistd::{pipe2, write};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::sync::Arc;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// The watched descriptor can be read (or has hung up).
    Ready,
    /// A stop was requested.
    Interrupted,
}

/// Write end of the pipe, owned by the thread controlling the daemon.
///
/// It also holds the read end: a daemon thread that already exited must not turn a later
/// interrupt into `EPIPE`.
pub(crate) struct Interruptor {
    write: OwnedFd,
    _read: Arc<OwnedFd>,
}

/// Read end of the pipe, owned by the daemon thread.
pub(crate) struct InterruptListener {
    read: Arc<OwnedFd>,
}

/// Creates the pipe with both ends non-blocking and close-on-exec.
pub(crate) fn interrupt_pipe() -> nix::Result<(Interruptor, InterruptListener)> {
    let (read, write) = pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC)?;
    let read = Arc::new(read);
    Ok((
        Interruptor {
            write,
            _read: read.clone(),
        },
        InterruptListener { read },
    ))
}

impl Interruptor {
    pub fn interrupt(&self) -> nix::Result<()> {
        match write(&self.write, &[DD_CRASHD_INTERRUPT_BYTE]) {
            // A full pipe already holds an interrupt.
            Ok(_) | Err(Errno::EAGAIN) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl InterruptListener {
    /// Blocks until `fd` is readable or an interrupt arrives. An interrupt wins when both are
    /// ready. There is no timeout.
    pub fn wait_readable(&self, fd: BorrowedFd<'_>) -> nix::Result<Readiness> {
        loop {
            let mut fds = [
                PollFd::new(fd, PollFlags::POLLIN),
                PollFd::new(self.read.as_fd(), PollFlags::POLLIN),
            ];
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e),
            }
            if fds[1].revents().is_some_and(|r| !r.is_empty()) {
                return Ok(Readiness::Interrupted);
            }
            if fds[0].revents().is_some_and(|r| !r.is_empty()) {
                return Ok(Readiness::Ready);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    #[test]
    fn ready_when_data_arrives() {
        let (_interruptor, listener) = interrupt_pipe().unwrap();
        let (mut a, b) = UnixStream::pair().unwrap();
        a.write_all(b"x").unwrap();
        assert_eq!(listener.wait_readable(b.as_fd()).unwrap(), Readiness::Ready);
    }

    #[test]
    fn ready_on_hangup() {
        let (_interruptor, listener) = interrupt_pipe().unwrap();
        let (a, b) = UnixStream::pair().unwrap();
        drop(a);
        assert_eq!(listener.wait_readable(b.as_fd()).unwrap(), Readiness::Ready);
    }

    #[test]
    fn interrupt_wakes_blocked_wait() {
        let (interruptor, listener) = interrupt_pipe().unwrap();
        let (_a, b) = UnixStream::pair().unwrap();
        let waiter = std::thread::spawn(move || listener.wait_readable(b.as_fd()).unwrap());
        std::thread::sleep(Duration::from_millis(50));
        interruptor.interrupt().unwrap();
        assert_eq!(waiter.join().unwrap(), Readiness::Interrupted);
    }

    #[test]
    fn interrupt_is_sticky_and_wins() {
        let (interruptor, listener) = interrupt_pipe().unwrap();
        let (mut a, b) = UnixStream::pair().unwrap();
        a.write_all(b"x").unwrap();
        interruptor.interrupt().unwrap();
        interruptor.interrupt().unwrap();
        for _ in 0..3 {
            assert_eq!(
                listener.wait_readable(b.as_fd()).unwrap(),
                Readiness::Interrupted
            );
        }
    }

    #[test]
    fn interrupt_after_listener_is_gone() {
        let (interruptor, listener) = interrupt_pipe().unwrap();
        drop(listener);
        interruptor.interrupt().unwrap();
    }

    #[test]
    fn both_ends_are_non_blocking() {
        let (interruptor, listener) = interrupt_pipe().unwrap();
        for fd in [interruptor.write.as_fd(), listener.read.as_fd()] {
            let flags = nix::fcntl::fcntl(
                std::os::fd::AsRawFd::as_raw_fd(&fd),
                nix::fcntl::FcntlArg::F_GETFL,
            )
            .unwrap();
            assert!(OFlag::from_bits_truncate(flags).contains(OFlag::O_NONBLOCK));
        }
    }
}
