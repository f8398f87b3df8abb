// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::Arch;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_addr: u64,
    pub data: Vec<u8>,
}

impl Segment {
    /// One past the last byte, or `None` if that does not fit in a `u64`.
    pub fn end_addr(&self) -> Option<u64> {
        self.start_addr.checked_add(self.data.len() as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramImage {
    pub entry_point: u64,
    pub segments: Vec<Segment>,
    pub arch: Arch,
}

impl ProgramImage {
    pub fn new(entry_point: u64, arch: Arch) -> Self {
        Self {
            entry_point,
            segments: Vec::new(),
            arch,
        }
    }

    pub fn add_segment(&mut self, start_addr: u64, data: Vec<u8>) {
        self.segments.push(Segment { start_addr, data });
    }

    /// Lowest start address and highest end address over all segments.
    ///
    /// `None` for an empty image or when a segment end overflows.
    pub fn span(&self) -> Option<(u64, u64)> {
        let start = self.segments.iter().map(|s| s.start_addr).min()?;
        let mut end = start;
        for segment in &self.segments {
            end = end.max(segment.end_addr()?);
        }
        Some((start, end))
    }
}

/// Flat byte-addressed storage (the SoC's block RAM).
pub struct LinearMemory {
    pub data: Vec<u8>,
    pub base_addr: u64,
}

impl LinearMemory {
    pub fn new(size: usize, base_addr: u64) -> Self {
        Self {
            data: vec![0; size],
            base_addr,
        }
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base_addr && addr < self.base_addr + self.data.len() as u64
    }

    pub fn read_u8(&self, addr: u64) -> Option<u8> {
        if self.contains(addr) {
            Some(self.data[(addr - self.base_addr) as usize])
        } else {
            None
        }
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> bool {
        if self.contains(addr) {
            self.data[(addr - self.base_addr) as usize] = value;
            true
        } else {
            false
        }
    }

    /// Copies a segment in if it fits entirely; partial loads are refused.
    pub fn load_from_segment(&mut self, segment: &Segment) -> bool {
        let mem_end = self.base_addr.saturating_add(self.data.len() as u64);

        let fits = segment.end_addr().is_some_and(|end| end <= mem_end);
        if segment.start_addr >= self.base_addr && fits {
            let offset = (segment.start_addr - self.base_addr) as usize;
            self.data[offset..offset + segment.data.len()].copy_from_slice(&segment.data);
            return true;
        }
        false
    }
}
