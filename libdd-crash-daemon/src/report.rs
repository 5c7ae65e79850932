// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::registers::dump_registers;
use crate::shared::constants::{DD_CRASHD_REPORT_BANNER, DD_CRASHD_REPORT_TRAILER};
use crate::shared::message::CrashMessage;
use crate::sig_info::{code_name, signal_name};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Line oriented writer of one crash report.
///
/// A sink may be absent (no report path configured, or the file could not be created); every
/// write to an absent sink is a no-op, so the capture pipeline never has to branch on it.
pub struct ReportSink {
    out: Option<BufWriter<File>>,
}

impl ReportSink {
    /// Creates (or truncates) the report file at `path`. Failures are logged and yield an
    /// absent sink.
    pub fn create(path: Option<&Path>) -> Self {
        let out = path.and_then(|path| {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)
                .inspect_err(|e| {
                    tracing::error!(path = %path.display(), error = %e, "Could not create crash report")
                })
                .ok()
        });
        Self {
            out: out.map(BufWriter::new),
        }
    }

    /// A sink that discards everything.
    pub fn null() -> Self {
        Self { out: None }
    }

    pub fn is_open(&self) -> bool {
        self.out.is_some()
    }

    pub fn write_line(&mut self, line: &str) {
        if let Some(out) = self.out.as_mut() {
            if let Err(e) = writeln!(out, "{line}") {
                tracing::warn!(error = %e, "Could not write to crash report");
            }
        }
    }

    /// Writes the identification of the crash: process, thread, signal and register snapshot.
    pub fn write_header(&mut self, message: &CrashMessage) {
        if !self.is_open() {
            return;
        }
        self.write_line(DD_CRASHD_REPORT_BANNER);
        let thread_name = read_proc_string(&format!(
            "/proc/{}/task/{}/comm",
            message.pid, message.tid
        ));
        let cmdline = read_proc_string(&format!("/proc/{}/cmdline", message.pid));
        self.write_line(&format!(
            "pid: {}, tid: {}, name: {}  >>> {} <<<",
            message.pid,
            message.tid,
            thread_name.as_deref().unwrap_or("<unknown>"),
            cmdline.as_deref().unwrap_or("<unknown>"),
        ));
        self.write_line(&format!(
            "signal {} ({}), code {} ({}), fault addr {:#018x}",
            message.signo,
            signal_name(message.signo),
            message.si_code,
            code_name(message.signo, message.si_code),
            message.fault_addr,
        ));
        for line in dump_registers(&message.context) {
            self.write_line(&line);
        }
        self.write_line("");
        self.write_line("backtrace:");
    }

    pub fn write_trailer(&mut self) {
        self.write_line(DD_CRASHD_REPORT_TRAILER);
    }

    /// Flushes and closes the report. Returns whether a report file was written.
    pub fn close(self) -> bool {
        match self.out {
            Some(mut out) => match out.flush() {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(error = %e, "Could not flush crash report");
                    false
                }
            },
            None => false,
        }
    }
}

/// Reads a small procfs text file, turning NUL separators into spaces.
fn read_proc_string(path: &str) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let s = String::from_utf8_lossy(&bytes)
        .replace('\0', " ")
        .trim()
        .to_string();
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_absorbs_writes() {
        let mut sink = ReportSink::create(None);
        assert!(!sink.is_open());
        sink.write_header(&CrashMessage::new(1, 1, libc::SIGSEGV, 1, 0));
        sink.write_line("#00 pc 0000000000001000");
        sink.write_trailer();
        assert!(!sink.close());
        assert!(!ReportSink::null().close());
    }

    #[test]
    fn unwritable_path_yields_absent_sink() {
        let sink = ReportSink::create(Some(Path::new("/nonexistent-dir/report.txt")));
        assert!(!sink.is_open());
    }

    #[test]
    fn header_and_trailer() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.txt");
        let pid = std::process::id() as libc::pid_t;
        let message = CrashMessage::new(pid, pid, libc::SIGSEGV, 1, 0xdead_beef);

        let mut sink = ReportSink::create(Some(&path));
        assert!(sink.is_open());
        sink.write_header(&message);
        sink.write_line("    #00 pc 0000000000001000  /lib/libfoo.so");
        sink.write_trailer();
        assert!(sink.close());

        let report = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], DD_CRASHD_REPORT_BANNER);
        assert!(lines[1].starts_with(&format!("pid: {pid}, tid: {pid}, name: ")));
        assert_eq!(
            lines[2],
            "signal 11 (SIGSEGV), code 1 (SEGV_MAPERR), fault addr 0x00000000deadbeef"
        );
        assert!(report.contains("backtrace:\n    #00 pc 0000000000001000  /lib/libfoo.so\n"));
        assert_eq!(lines.last(), Some(&DD_CRASHD_REPORT_TRAILER));
        Ok(())
    }

    #[test]
    fn create_truncates_previous_report() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "an older, much longer crash report\n")?;

        let mut sink = ReportSink::create(Some(&path));
        sink.write_line("new");
        assert!(sink.close());
        assert_eq!(std::fs::read_to_string(&path)?, "new\n");
        Ok(())
    }
}
