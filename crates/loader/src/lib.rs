// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, Context, Result};
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use rvecho_core::memory::ProgramImage;
use rvecho_core::Arch;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub mod coe;

pub use coe::{write_coe, CoeError, CoeWidth};

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

pub fn load_elf(path: &Path) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read ELF file: {:?}", path))?;
    load_elf_bytes(&buffer)
}

pub fn load_elf_bytes(buffer: &[u8]) -> Result<ProgramImage> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;

    info!("ELF Entry Point: {:#x}", elf.entry);

    let arch = match elf.header.e_machine {
        goblin::elf::header::EM_RISCV => Arch::RiscV,
        _ => {
            warn!("Unknown ELF machine type: {}", elf.header.e_machine);
            Arch::Unknown
        }
    };

    let mut program_image = ProgramImage::new(elf.entry, arch);

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD {
            continue;
        }
        // Load address, which is what ends up in the BRAM init file.
        let start_addr = ph.p_paddr;
        let size = ph.p_filesz as usize;
        let offset = ph.p_offset as usize;

        if size == 0 {
            continue;
        }

        debug!(
            "Found Loadable Segment: Addr={:#x}, Size={} bytes, Offset={:#x}",
            start_addr, size, offset
        );

        let end = offset
            .checked_add(size)
            .filter(|end| *end <= buffer.len())
            .ok_or_else(|| anyhow!("Segment out of bounds in ELF file"))?;

        program_image.add_segment(start_addr, buffer[offset..end].to_vec());
    }

    if program_image.segments.is_empty() {
        warn!("No loadable segments found in ELF file");
    }

    Ok(program_image)
}

/// Raw image as produced by `objcopy -O binary`: one segment at `base`,
/// entered at its first byte.
pub fn load_binary(bytes: &[u8], base: u64) -> ProgramImage {
    let mut image = ProgramImage::new(base, Arch::RiscV);
    image.add_segment(base, bytes.to_vec());
    image
}

/// Loads `path` as ELF when it carries the ELF magic, as a flat binary otherwise.
pub fn load_image(path: &Path, base: u64) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read firmware: {:?}", path))?;
    if buffer.starts_with(ELF_MAGIC) {
        load_elf_bytes(&buffer).with_context(|| format!("Invalid ELF firmware: {:?}", path))
    } else {
        info!(
            "Loading {:?} as flat binary at {:#x} ({} bytes)",
            path,
            base,
            buffer.len()
        );
        Ok(load_binary(&buffer, base))
    }
}

/// Concatenates all segments into one contiguous buffer starting at the
/// lowest segment address. Gaps are zero filled; overlaps resolve in favour
/// of the later segment.
///
/// Images spanning more than `max_len` bytes are refused before anything is
/// allocated.
pub fn flatten(image: &ProgramImage, max_len: u64) -> Result<Vec<u8>> {
    if image.segments.is_empty() {
        return Ok(Vec::new());
    }
    let (start, end) = image
        .span()
        .ok_or_else(|| anyhow!("Segment end address overflows the address space"))?;

    let len = end - start;
    if len > max_len {
        anyhow::bail!(
            "Image spans {:#x}..{:#x} ({} bytes), larger than the {} byte limit",
            start,
            end,
            len,
            max_len
        );
    }

    let mut out = vec![0u8; len as usize];
    for segment in &image.segments {
        let at = (segment.start_addr - start) as usize;
        out[at..at + segment.data.len()].copy_from_slice(&segment.data);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_zero_fills_gaps() {
        let mut image = ProgramImage::new(0, Arch::RiscV);
        image.add_segment(0x10, vec![0xAA, 0xBB]);
        image.add_segment(0x08, vec![0x01]);

        let flat = flatten(&image, 0x4000).unwrap();
        assert_eq!(flat.len(), 0x0A);
        assert_eq!(flat[0], 0x01);
        assert!(flat[1..8].iter().all(|b| *b == 0));
        assert_eq!(&flat[8..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_flatten_empty_image() {
        let image = ProgramImage::new(0, Arch::RiscV);
        assert!(flatten(&image, 0x4000).unwrap().is_empty());
    }

    #[test]
    fn test_flatten_refuses_wide_span() {
        let mut image = ProgramImage::new(0, Arch::RiscV);
        image.add_segment(0x0, vec![0x13, 0, 0, 0]);
        image.add_segment(0x8000_0000, vec![0x01]);

        let err = flatten(&image, 0x4000).unwrap_err();
        assert!(err.to_string().contains("larger than the 16384 byte limit"));

        let exact = load_binary(&[0u8; 0x4000], 0);
        assert_eq!(flatten(&exact, 0x4000).unwrap().len(), 0x4000);
    }

    #[test]
    fn test_flatten_rejects_overflowing_segment() {
        let mut image = ProgramImage::new(0, Arch::RiscV);
        image.add_segment(u64::MAX - 1, vec![0; 4]);
        let err = flatten(&image, u64::MAX).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_load_binary_enters_at_base() {
        let image = load_binary(&[0x13, 0, 0, 0], 0x100);
        assert_eq!(image.entry_point, 0x100);
        assert_eq!(image.segments.len(), 1);
        assert_eq!(image.segments[0].start_addr, 0x100);
    }

    #[test]
    fn test_garbage_is_not_elf() {
        assert!(load_elf_bytes(b"\x7fELF but not really").is_err());
    }
}
