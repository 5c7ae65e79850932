// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Human readable names for the signal fields of a crash message.

// These are defined in siginfo.h. libc does not export them in a usable form.
// (this only copies the most common, actionable values)
mod siginfo_code {
    pub const SI_USER: i32 = 0;
    pub const SI_KERNEL: i32 = 0x80;
    pub const SI_QUEUE: i32 = -1;
    pub const SI_TIMER: i32 = -2;
    pub const SI_TKILL: i32 = -6;

    pub mod ill {
        pub const ILLOPC: i32 = 1;
        pub const ILLOPN: i32 = 2;
        pub const ILLADR: i32 = 3;
        pub const ILLTRP: i32 = 4;
        pub const PRVOPC: i32 = 5;
        pub const PRVREG: i32 = 6;
        pub const COPROC: i32 = 7;
        pub const BADSTK: i32 = 8;
    }

    pub mod fpe {
        pub const INTDIV: i32 = 1;
        pub const INTOVF: i32 = 2;
        pub const FLTDIV: i32 = 3;
        pub const FLTOVF: i32 = 4;
        pub const FLTUND: i32 = 5;
        pub const FLTRES: i32 = 6;
        pub const FLTINV: i32 = 7;
        pub const FLTSUB: i32 = 8;
    }

    pub mod segv {
        pub const MAPERR: i32 = 1;
        pub const ACCERR: i32 = 2;
    }

    pub mod bus {
        pub const ADRALN: i32 = 1;
        pub const ADRERR: i32 = 2;
        pub const OBJERR: i32 = 3;
    }

    pub mod trap {
        pub const BRKPT: i32 = 1;
        pub const TRACE: i32 = 2;
    }

    pub mod sys {
        pub const SECCOMP: i32 = 1;
    }
}

pub fn signal_name(signo: libc::c_int) -> &'static str {
    match signo {
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGBUS => "SIGBUS",
        libc::SIGILL => "SIGILL",
        libc::SIGABRT => "SIGABRT",
        libc::SIGFPE => "SIGFPE",
        libc::SIGTRAP => "SIGTRAP",
        libc::SIGSYS => "SIGSYS",
        libc::SIGSTKFLT => "SIGSTKFLT",
        libc::SIGKILL => "SIGKILL",
        libc::SIGTERM => "SIGTERM",
        libc::SIGQUIT => "SIGQUIT",
        _ => "UNKNOWN",
    }
}

pub fn code_name(signo: libc::c_int, code: libc::c_int) -> &'static str {
    use siginfo_code::*;

    // Codes sent by userspace (kill, tgkill, sigqueue) or by the kernel mean the same thing
    // for every signal.
    match code {
        SI_USER => return "SI_USER",
        SI_KERNEL => return "SI_KERNEL",
        SI_QUEUE => return "SI_QUEUE",
        SI_TIMER => return "SI_TIMER",
        SI_TKILL => return "SI_TKILL",
        _ => {}
    }

    match signo {
        libc::SIGILL => match code {
            ill::ILLOPC => "ILL_ILLOPC",
            ill::ILLOPN => "ILL_ILLOPN",
            ill::ILLADR => "ILL_ILLADR",
            ill::ILLTRP => "ILL_ILLTRP",
            ill::PRVOPC => "ILL_PRVOPC",
            ill::PRVREG => "ILL_PRVREG",
            ill::COPROC => "ILL_COPROC",
            ill::BADSTK => "ILL_BADSTK",
            _ => "UNKNOWN_SIGILL",
        },
        libc::SIGFPE => match code {
            fpe::INTDIV => "FPE_INTDIV",
            fpe::INTOVF => "FPE_INTOVF",
            fpe::FLTDIV => "FPE_FLTDIV",
            fpe::FLTOVF => "FPE_FLTOVF",
            fpe::FLTUND => "FPE_FLTUND",
            fpe::FLTRES => "FPE_FLTRES",
            fpe::FLTINV => "FPE_FLTINV",
            fpe::FLTSUB => "FPE_FLTSUB",
            _ => "UNKNOWN_SIGFPE",
        },
        libc::SIGSEGV => match code {
            segv::MAPERR => "SEGV_MAPERR",
            segv::ACCERR => "SEGV_ACCERR",
            _ => "UNKNOWN_SIGSEGV",
        },
        libc::SIGBUS => match code {
            bus::ADRALN => "BUS_ADRALN",
            bus::ADRERR => "BUS_ADRERR",
            bus::OBJERR => "BUS_OBJERR",
            _ => "UNKNOWN_SIGBUS",
        },
        libc::SIGTRAP => match code {
            trap::BRKPT => "TRAP_BRKPT",
            trap::TRACE => "TRAP_TRACE",
            _ => "UNKNOWN_SIGTRAP",
        },
        libc::SIGSYS => match code {
            sys::SECCOMP => "SYS_SECCOMP",
            _ => "UNKNOWN_SIGSYS",
        },
        _ => "UNKNOWN_GENERAL",
    }
}
