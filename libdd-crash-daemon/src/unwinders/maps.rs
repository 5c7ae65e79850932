// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;

/// One line of `/proc/<pid>/maps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MapEntry {
    pub start: u64,
    pub end: u64,
    pub offset: u64,
    pub executable: bool,
    pub path: Option<String>,
}

impl MapEntry {
    pub fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.end
    }

    /// `pc` as an offset into the mapped file, which is what symbolizers expect.
    pub fn relative_pc(&self, pc: u64) -> u64 {
        pc - self.start + self.offset
    }

    pub fn name(&self) -> &str {
        self.path.as_deref().unwrap_or("<anonymous>")
    }

    fn parse(line: &str) -> Option<Self> {
        // 7f2c4e000000-7f2c4e022000 r-xp 00000000 08:01 1234   /usr/lib/libc.so.6
        let mut fields = line.split_whitespace();
        let (start, end) = fields.next()?.split_once('-')?;
        let perms = fields.next()?;
        let offset = fields.next()?;
        let _dev = fields.next()?;
        let _inode = fields.next()?;
        let path = fields.collect::<Vec<_>>().join(" ");
        Some(Self {
            start: u64::from_str_radix(start, 16).ok()?,
            end: u64::from_str_radix(end, 16).ok()?,
            offset: u64::from_str_radix(offset, 16).ok()?,
            executable: perms.as_bytes().get(2) == Some(&b'x'),
            path: (!path.is_empty()).then_some(path),
        })
    }
}

/// The memory mappings of a process, sorted by address.
#[derive(Debug, Default, Clone)]
pub(crate) struct MemoryMaps {
    entries: Vec<MapEntry>,
}

impl MemoryMaps {
    pub fn read(pid: libc::pid_t) -> io::Result<Self> {
        let contents = std::fs::read_to_string(format!("/proc/{pid}/maps"))?;
        Ok(Self::parse(&contents))
    }

    /// Like [`MemoryMaps::read`], but an unreadable maps file yields an empty set.
    pub fn read_or_empty(pid: libc::pid_t) -> Self {
        Self::read(pid).unwrap_or_else(|e| {
            tracing::debug!(pid, error = %e, "Could not read memory maps");
            Self::default()
        })
    }

    pub fn parse(contents: &str) -> Self {
        let mut entries: Vec<MapEntry> = contents.lines().filter_map(MapEntry::parse).collect();
        entries.sort_by_key(|e| e.start);
        Self { entries }
    }

    pub fn find(&self, addr: u64) -> Option<&MapEntry> {
        let idx = self.entries.partition_point(|e| e.start <= addr);
        let entry = self.entries.get(idx.checked_sub(1)?)?;
        entry.contains(addr).then_some(entry)
    }

    pub fn is_executable(&self, addr: u64) -> bool {
        self.find(addr).is_some_and(|e| e.executable)
    }
}
