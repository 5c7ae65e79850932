// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg(target_os = "linux")]

use libdd_crash_daemon::{
    send_crash_message, start, stop, Callbacks, CrashMessage, DaemonCallbacks, DaemonConfig,
    PtraceTracer, Tracer, Unwinder,
};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use serial_test::serial;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Reports {
    written: Mutex<Vec<PathBuf>>,
}

impl Reports {
    fn wait_for_report(&self) -> Vec<PathBuf> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let written = self.written.lock().unwrap().clone();
            if !written.is_empty() {
                return written;
            }
            assert!(Instant::now() < deadline, "no crash report was written");
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

/// Stops the daemon when dropped, so a failed assertion does not leave it running for the next
/// test.
struct RunningDaemon;

impl RunningDaemon {
    fn start(config: DaemonConfig, reports: &Arc<Reports>) -> Self {
        start(config, Some(Callbacks::new(reports.clone()))).unwrap();
        RunningDaemon
    }
}

impl Drop for RunningDaemon {
    fn drop(&mut self) {
        stop();
    }
}

/// Kills and reaps the forked target when dropped.
struct ForkedChild(Pid);

impl Drop for ForkedChild {
    fn drop(&mut self) {
        let _ = kill(self.0, Signal::SIGKILL);
        let _ = waitpid(self.0, None);
    }
}

impl DaemonCallbacks for Reports {
    fn on_crash(&self, report_path: &Path) {
        self.written.lock().unwrap().push(report_path.to_path_buf());
    }
}

/// Whether this process may trace its children. Containers often forbid it.
fn ptrace_permitted() -> bool {
    match unsafe { fork() } {
        Ok(ForkResult::Child) => loop {
            unsafe { libc::pause() };
        },
        Ok(ForkResult::Parent { child }) => {
            let tracer = PtraceTracer;
            let permitted = tracer.attach(child).is_ok() && tracer.wait_for_stop(child).is_ok();
            let _ = kill(child, Signal::SIGKILL);
            let _ = waitpid(child, None);
            permitted
        }
        Err(_) => false,
    }
}

static CRASH_FD: AtomicI32 = AtomicI32::new(-1);

/// Crash handler of the forked target: reports over the inherited connection, waits for the
/// acknowledgement and exits with 0 if it was received.
extern "C" fn report_crash(
    _signo: libc::c_int,
    info: *mut libc::siginfo_t,
    ucontext: *mut libc::c_void,
) {
    let fd = CRASH_FD.load(Ordering::SeqCst);
    let message = unsafe { CrashMessage::from_signal(info, ucontext) };
    let bytes = message.as_bytes();
    let mut written = 0;
    while written < bytes.len() {
        let n = unsafe {
            libc::write(
                fd,
                bytes[written..].as_ptr().cast(),
                bytes.len() - written,
            )
        };
        if n <= 0 {
            unsafe { libc::_exit(2) };
        }
        written += n as usize;
    }
    let mut ack = 0xffu8;
    let n = unsafe { libc::read(fd, (&mut ack as *mut u8).cast(), 1) };
    unsafe { libc::_exit(if n == 1 && ack == 0 { 0 } else { 3 }) };
}

fn crash_forked_child(unwinder: Unwinder) {
    if !ptrace_permitted() {
        eprintln!("skipping: ptrace is not permitted here");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("crashd.sock");
    let report = dir.path().join("crash.txt");
    let reports = Arc::new(Reports::default());
    let config = DaemonConfig::new(
        socket.to_str().unwrap(),
        unwinder,
        Some(report.clone()),
    );
    let daemon = RunningDaemon::start(config, &reports);

    // Connected before forking: the child only makes async-signal-safe calls.
    let stream = UnixStream::connect(&socket).unwrap();
    CRASH_FD.store(stream.as_raw_fd(), Ordering::SeqCst);

    let child = match unsafe { fork() }.unwrap() {
        ForkResult::Child => unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = report_crash as usize;
            action.sa_flags = libc::SA_SIGINFO;
            libc::sigaction(libc::SIGABRT, &action, std::ptr::null_mut());
            libc::raise(libc::SIGABRT);
            libc::_exit(4);
        },
        ForkResult::Parent { child } => child,
    };
    drop(stream);
    let target = ForkedChild(child);

    // The daemon thread is the tracer and must be the only one collecting the child's stops,
    // so the child is reaped only after the daemon has finished with it.
    assert_eq!(reports.wait_for_report(), vec![report.clone()]);
    drop(daemon);
    assert_eq!(waitpid(child, None).unwrap(), WaitStatus::Exited(child, 0));
    std::mem::forget(target);

    let contents = std::fs::read_to_string(&report).unwrap();
    assert!(contents.contains(&format!("pid: {child}, tid: {child}")));
    assert!(contents.contains("signal 6 (SIGABRT), code -6 (SI_TKILL)"));
    let first_frame = contents
        .lines()
        .find(|line| line.starts_with("    #00 pc "))
        .unwrap();
    assert!(!first_frame.ends_with("<unknown>"), "{first_frame}");
}

#[test]
#[serial]
#[cfg_attr(miri, ignore)]
#[cfg(feature = "unwinder-frame-pointer")]
fn frame_pointer_capture_of_forked_child() {
    crash_forked_child(Unwinder::FramePointer);
}

#[test]
#[serial]
#[cfg_attr(miri, ignore)]
#[cfg(feature = "unwinder-stack-scan")]
fn stack_scan_capture_of_forked_child() {
    crash_forked_child(Unwinder::StackScan);
}

#[test]
#[serial]
#[cfg_attr(miri, ignore)]
#[cfg(feature = "unwinder-frame-pointer")]
fn vanished_thread_is_acknowledged_without_report() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("crash.txt");
    let reports = Arc::new(Reports::default());
    let socket_name = format!("dd-crashd-it-{}", std::process::id());
    let config = DaemonConfig::new(
        socket_name.clone(),
        Unwinder::FramePointer,
        Some(report.clone()),
    );
    let daemon = RunningDaemon::start(config, &reports);

    // Pid max is at most 2^22 on Linux.
    let tid = i32::MAX;
    send_crash_message(&socket_name, &CrashMessage::new(tid, tid, libc::SIGSEGV, 1, 0)).unwrap();
    drop(daemon);

    assert!(!report.exists());
    assert!(reports.written.lock().unwrap().is_empty());
}
