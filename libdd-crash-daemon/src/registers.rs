// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decoding of the `ucontext_t` snapshot carried by a crash message.

/// The registers needed to start walking a stack.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Registers {
    pub pc: u64,
    pub sp: u64,
    pub fp: u64,
}

#[cfg(target_arch = "x86_64")]
mod arch {
    use super::Registers;

    const REG_RBP: usize = libc::REG_RBP as usize;
    const REG_RSP: usize = libc::REG_RSP as usize;
    const REG_RIP: usize = libc::REG_RIP as usize;

    pub(super) const NAMED_REGISTERS: &[(&str, usize)] = &[
        ("rax", libc::REG_RAX as usize),
        ("rbx", libc::REG_RBX as usize),
        ("rcx", libc::REG_RCX as usize),
        ("rdx", libc::REG_RDX as usize),
        ("rsi", libc::REG_RSI as usize),
        ("rdi", libc::REG_RDI as usize),
        ("r8", libc::REG_R8 as usize),
        ("r9", libc::REG_R9 as usize),
        ("r10", libc::REG_R10 as usize),
        ("r11", libc::REG_R11 as usize),
        ("r12", libc::REG_R12 as usize),
        ("r13", libc::REG_R13 as usize),
        ("r14", libc::REG_R14 as usize),
        ("r15", libc::REG_R15 as usize),
        ("rbp", REG_RBP),
        ("rsp", REG_RSP),
        ("rip", REG_RIP),
        ("eflags", libc::REG_EFL as usize),
    ];

    pub(super) fn register(context: &libc::ucontext_t, index: usize) -> u64 {
        context.uc_mcontext.gregs[index] as u64
    }

    pub(super) fn registers(context: &libc::ucontext_t) -> Registers {
        Registers {
            pc: register(context, REG_RIP),
            sp: register(context, REG_RSP),
            fp: register(context, REG_RBP),
        }
    }
}

#[cfg(target_arch = "aarch64")]
mod arch {
    use super::Registers;

    const REG_SP: usize = 31;
    const REG_PC: usize = 32;
    const REG_PSTATE: usize = 33;

    pub(super) const NAMED_REGISTERS: &[(&str, usize)] = &[
        ("x0", 0),
        ("x1", 1),
        ("x2", 2),
        ("x3", 3),
        ("x4", 4),
        ("x5", 5),
        ("x6", 6),
        ("x7", 7),
        ("x8", 8),
        ("x9", 9),
        ("x10", 10),
        ("x11", 11),
        ("x12", 12),
        ("x13", 13),
        ("x14", 14),
        ("x15", 15),
        ("x16", 16),
        ("x17", 17),
        ("x18", 18),
        ("x19", 19),
        ("x20", 20),
        ("x21", 21),
        ("x22", 22),
        ("x23", 23),
        ("x24", 24),
        ("x25", 25),
        ("x26", 26),
        ("x27", 27),
        ("x28", 28),
        ("x29", 29),
        ("x30", 30),
        ("sp", REG_SP),
        ("pc", REG_PC),
        ("pstate", REG_PSTATE),
    ];

    pub(super) fn register(context: &libc::ucontext_t, index: usize) -> u64 {
        let mcontext = &context.uc_mcontext;
        match index {
            REG_SP => mcontext.sp,
            REG_PC => mcontext.pc,
            REG_PSTATE => mcontext.pstate,
            i => mcontext.regs[i],
        }
    }

    pub(super) fn registers(context: &libc::ucontext_t) -> Registers {
        Registers {
            pc: context.uc_mcontext.pc,
            sp: context.uc_mcontext.sp,
            fp: context.uc_mcontext.regs[29],
        }
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
mod arch {
    use super::Registers;

    pub(super) const NAMED_REGISTERS: &[(&str, usize)] = &[];

    pub(super) fn register(_context: &libc::ucontext_t, _index: usize) -> u64 {
        0
    }

    pub(super) fn registers(_context: &libc::ucontext_t) -> Registers {
        Registers::default()
    }
}

impl Registers {
    pub fn from_context(context: &libc::ucontext_t) -> Self {
        arch::registers(context)
    }
}

/// Renders every general purpose register of the snapshot, four per line.
pub(crate) fn dump_registers(context: &libc::ucontext_t) -> Vec<String> {
    arch::NAMED_REGISTERS
        .chunks(4)
        .map(|row| {
            let cells: Vec<String> = row
                .iter()
                .map(|(name, index)| {
                    format!("{name:>6} {:016x}", arch::register(context, *index))
                })
                .collect();
            format!("  {}", cells.join(" "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_context() {
        let context: libc::ucontext_t = unsafe { std::mem::zeroed() };
        assert_eq!(Registers::from_context(&context), Registers::default());
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn x86_64_registers() {
        let mut context: libc::ucontext_t = unsafe { std::mem::zeroed() };
        context.uc_mcontext.gregs[libc::REG_RIP as usize] = 0x4000_1000;
        context.uc_mcontext.gregs[libc::REG_RSP as usize] = 0x7ffd_0000;
        context.uc_mcontext.gregs[libc::REG_RBP as usize] = 0x7ffd_0040;
        context.uc_mcontext.gregs[libc::REG_RAX as usize] = 0x2a;
        assert_eq!(
            Registers::from_context(&context),
            Registers {
                pc: 0x4000_1000,
                sp: 0x7ffd_0000,
                fp: 0x7ffd_0040,
            }
        );
        let lines = dump_registers(&context);
        assert!(lines.iter().any(|l| l.contains("rip 0000000040001000")));
        assert!(lines.iter().any(|l| l.contains("rsp 000000007ffd0000")));
        assert!(lines.iter().any(|l| l.contains("rax 000000000000002a")));
    }

    #[cfg(target_arch = "aarch64")]
    #[test]
    fn aarch64_registers() {
        let mut context: libc::ucontext_t = unsafe { std::mem::zeroed() };
        context.uc_mcontext.pc = 0x4000_1000;
        context.uc_mcontext.sp = 0x7ffd_0000;
        context.uc_mcontext.regs[29] = 0x7ffd_0040;
        assert_eq!(
            Registers::from_context(&context),
            Registers {
                pc: 0x4000_1000,
                sp: 0x7ffd_0000,
                fp: 0x7ffd_0040,
            }
        );
        let lines = dump_registers(&context);
        assert!(lines.iter().any(|l| l.contains("pc 0000000040001000")));
    }

    #[test]
    fn dump_has_four_registers_per_line() {
        let context: libc::ucontext_t = unsafe { std::mem::zeroed() };
        let lines = dump_registers(&context);
        for line in &lines {
            assert!(line.split_whitespace().count() <= 8);
        }
    }
}
