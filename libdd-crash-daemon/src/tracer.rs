// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use nix::sys::ptrace;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

/// The process-tracing primitive used to suspend and inspect a crashed thread.
pub trait Tracer: Send + Sync {
    /// Starts tracing `tid`. The thread is asked to stop but may not have stopped yet.
    fn attach(&self, tid: Pid) -> nix::Result<()>;
    /// Blocks until the attached thread reports a stop.
    fn wait_for_stop(&self, tid: Pid) -> nix::Result<()>;
    /// Stops tracing `tid` and lets it resume.
    fn detach(&self, tid: Pid) -> nix::Result<()>;
    /// Reads one machine word from the address space of the attached thread.
    fn read_word(&self, tid: Pid, addr: u64) -> nix::Result<u64>;
}

/// [`Tracer`] backed by `ptrace(2)`.
#[derive(Debug, Default, Copy, Clone)]
pub struct PtraceTracer;

impl Tracer for PtraceTracer {
    fn attach(&self, tid: Pid) -> nix::Result<()> {
        ptrace::attach(tid)
    }

    fn wait_for_stop(&self, tid: Pid) -> nix::Result<()> {
        // __WALL: the crashed thread is usually not the leader of its thread group.
        loop {
            match waitpid(tid, Some(WaitPidFlag::__WALL | WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Stopped(..)) | Ok(WaitStatus::PtraceEvent(..)) => return Ok(()),
                Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => {
                    return Err(nix::Error::ESRCH)
                }
                Ok(_) => continue,
                Err(nix::Error::EINTR) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn detach(&self, tid: Pid) -> nix::Result<()> {
        ptrace::detach(tid, None)
    }

    fn read_word(&self, tid: Pid, addr: u64) -> nix::Result<u64> {
        ptrace::read(tid, addr as ptrace::AddressType).map(|word| word as u64)
    }
}

/// A thread this daemon is attached to. Dropping it detaches, so every path out of the capture
/// pipeline after a successful attach releases the target.
pub(crate) struct AttachedThread<'a> {
    tracer: &'a dyn Tracer,
    tid: Pid,
}

impl<'a> AttachedThread<'a> {
    pub fn attach(tracer: &'a dyn Tracer, tid: Pid) -> nix::Result<Self> {
        tracer.attach(tid)?;
        Ok(Self { tracer, tid })
    }

    pub fn wait_for_stop(&self) -> nix::Result<()> {
        self.tracer.wait_for_stop(self.tid)
    }

    pub fn tracer(&self) -> &'a dyn Tracer {
        self.tracer
    }
}

impl Drop for AttachedThread<'_> {
    fn drop(&mut self) {
        match self.tracer.detach(self.tid) {
            Ok(()) => tracing::debug!(tid = self.tid.as_raw(), "Detached from crashed thread"),
            Err(e) => {
                tracing::warn!(tid = self.tid.as_raw(), error = %e, "Ptrace detach failed")
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TraceOp {
        Attach(i32),
        Wait(i32),
        Detach(i32),
    }

    /// Records the tracing operations issued against it and serves reads from a fake memory.
    #[derive(Default)]
    pub struct RecordingTracer {
        pub ops: Mutex<Vec<TraceOp>>,
        pub memory: HashMap<u64, u64>,
        pub fail_attach: bool,
        pub fail_wait: bool,
        /// How long each wait for a stop takes.
        pub wait_delay: Duration,
    }

    impl RecordingTracer {
        pub fn with_memory(memory: impl IntoIterator<Item = (u64, u64)>) -> Self {
            Self {
                memory: memory.into_iter().collect(),
                ..Default::default()
            }
        }

        pub fn ops(&self) -> Vec<TraceOp> {
            self.ops.lock().unwrap().clone()
        }
    }

    impl Tracer for RecordingTracer {
        fn attach(&self, tid: Pid) -> nix::Result<()> {
            self.ops.lock().unwrap().push(TraceOp::Attach(tid.as_raw()));
            if self.fail_attach {
                Err(nix::Error::ESRCH)
            } else {
                Ok(())
            }
        }

        fn wait_for_stop(&self, tid: Pid) -> nix::Result<()> {
            self.ops.lock().unwrap().push(TraceOp::Wait(tid.as_raw()));
            std::thread::sleep(self.wait_delay);
            if self.fail_wait {
                Err(nix::Error::ECHILD)
            } else {
                Ok(())
            }
        }

        fn detach(&self, tid: Pid) -> nix::Result<()> {
            self.ops.lock().unwrap().push(TraceOp::Detach(tid.as_raw()));
            Ok(())
        }

        fn read_word(&self, _tid: Pid, addr: u64) -> nix::Result<u64> {
            self.memory.get(&addr).copied().ok_or(nix::Error::EIO)
        }
    }
}
