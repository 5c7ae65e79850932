// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::mem;

/// Size in bytes of a [`CrashMessage`] on the wire. There is no framing: both ends know it.
pub const CRASH_MESSAGE_SIZE: usize = mem::size_of::<CrashMessage>();

/// Identification of a crashed thread, sent by the crashing process to the daemon.
///
/// The record travels byte-for-byte over the socket, so its layout is `#[repr(C)]` and must be
/// identical on both ends (same architecture, same libc). It only holds plain integers and a
/// `ucontext_t`, for which every bit pattern is a valid value.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CrashMessage {
    pub pid: libc::pid_t,
    pub tid: libc::pid_t,
    pub signo: libc::c_int,
    pub si_code: libc::c_int,
    pub fault_addr: usize,
    /// Register state of the crashed thread at the time the signal was delivered.
    pub context: libc::ucontext_t,
}

impl CrashMessage {
    /// A message with an all-zero register snapshot.
    pub fn new(
        pid: libc::pid_t,
        tid: libc::pid_t,
        signo: libc::c_int,
        si_code: libc::c_int,
        fault_addr: usize,
    ) -> Self {
        Self {
            pid,
            tid,
            signo,
            si_code,
            fault_addr,
            // Safety: ucontext_t is plain data, all zeroes is a valid value.
            context: unsafe { mem::zeroed() },
        }
    }

    /// Builds the message describing the calling thread from the arguments of an `SA_SIGINFO`
    /// signal handler. Only async-signal-safe calls are made.
    ///
    /// # Safety
    /// `siginfo` and `ucontext` must be the pointers the kernel passed to the signal handler.
    pub unsafe fn from_signal(
        siginfo: *const libc::siginfo_t,
        ucontext: *const libc::c_void,
    ) -> Self {
        let mut message = Self::new(libc::getpid(), libc::gettid(), 0, 0, 0);
        if let Some(siginfo) = siginfo.as_ref() {
            message.signo = siginfo.si_signo;
            message.si_code = siginfo.si_code;
            message.fault_addr = siginfo.si_addr() as usize;
        }
        if let Some(context) = (ucontext as *const libc::ucontext_t).as_ref() {
            message.context = *context;
        }
        message
    }

    /// Decodes a message from exactly [`CRASH_MESSAGE_SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8; CRASH_MESSAGE_SIZE]) -> Self {
        // Safety: the buffer has the size of the struct and every bit pattern is a valid
        // CrashMessage. read_unaligned because the buffer has the alignment of u8.
        unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const CrashMessage) }
    }

    /// The wire representation of this message.
    pub fn as_bytes(&self) -> &[u8] {
        // Safety: the slice covers exactly this struct and lives as long as the borrow.
        unsafe {
            std::slice::from_raw_parts(self as *const Self as *const u8, CRASH_MESSAGE_SIZE)
        }
    }
}

impl fmt::Debug for CrashMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrashMessage")
            .field("pid", &self.pid)
            .field("tid", &self.tid)
            .field("signo", &self.signo)
            .field("si_code", &self.si_code)
            .field("fault_addr", &format_args!("{:#x}", self.fault_addr))
            .finish_non_exhaustive()
    }
}

/// Accumulates the bytes of one [`CrashMessage`] across partial reads.
pub(crate) struct MessageBuffer {
    bytes: [u8; CRASH_MESSAGE_SIZE],
    filled: usize,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self {
            bytes: [0; CRASH_MESSAGE_SIZE],
            filled: 0,
        }
    }

    /// The part of the buffer still waiting for data.
    pub fn unfilled_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[self.filled..]
    }

    pub fn advance(&mut self, n: usize) {
        self.filled = (self.filled + n).min(CRASH_MESSAGE_SIZE);
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn is_complete(&self) -> bool {
        self.filled == CRASH_MESSAGE_SIZE
    }

    /// Returns the decoded message once every byte has been received.
    pub fn message(&self) -> Option<CrashMessage> {
        self.is_complete()
            .then(|| CrashMessage::from_bytes(&self.bytes))
    }
}
