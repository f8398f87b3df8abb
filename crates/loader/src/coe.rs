// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Xilinx memory initialisation (`.coe`) output for the block RAM.

use std::io::Write;

#[derive(Debug, thiserror::Error)]
pub enum CoeError {
    #[error("Firmware image is empty; nothing to initialise")]
    EmptyImage,
    #[error("Unsupported COE entry width: {0} bits (expected 8 or 32)")]
    UnsupportedWidth(u32),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Entry width of the generated vector, matching the BRAM port width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoeWidth {
    #[default]
    Bits8,
    /// Little-endian words; a trailing partial word is zero padded.
    Bits32,
}

impl CoeWidth {
    pub fn bits(self) -> u32 {
        match self {
            CoeWidth::Bits8 => 8,
            CoeWidth::Bits32 => 32,
        }
    }
}

impl TryFrom<u32> for CoeWidth {
    type Error = CoeError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(CoeWidth::Bits8),
            32 => Ok(CoeWidth::Bits32),
            other => Err(CoeError::UnsupportedWidth(other)),
        }
    }
}

fn entries(data: &[u8], width: CoeWidth) -> Vec<String> {
    match width {
        CoeWidth::Bits8 => data.iter().map(|b| format!("{:02x}", b)).collect(),
        CoeWidth::Bits32 => data
            .chunks(4)
            .map(|chunk| {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                format!("{:08x}", u32::from_le_bytes(word))
            })
            .collect(),
    }
}

/// Writes `data` as a radix-16 `.coe` file, one entry per line.
///
/// Returns the number of entries written.
pub fn write_coe<W: Write>(out: &mut W, data: &[u8], width: CoeWidth) -> Result<usize, CoeError> {
    if data.is_empty() {
        return Err(CoeError::EmptyImage);
    }

    let entries = entries(data, width);
    out.write_all(b"memory_initialization_radix=16;\n")?;
    out.write_all(b"memory_initialization_vector=\n")?;

    let last = entries.len() - 1;
    for (i, entry) in entries.iter().enumerate() {
        let terminator = if i == last { ';' } else { ',' };
        writeln!(out, "{}{}", entry, terminator)?;
    }
    out.flush()?;

    Ok(entries.len())
}
