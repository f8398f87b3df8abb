// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::memory::LinearMemory;
use crate::peripherals::uart::{self, SoftUart};
use crate::{Bus, Peripheral, SimResult, SimulationError};
use anyhow::Context;
use rvecho_config::{parse_size, BoardConfig};
use std::sync::{Arc, Mutex};

pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.base + self.size
    }
}

/// Block RAM plus the memory-mapped peripherals of the SoC.
pub struct SystemBus {
    pub ram: LinearMemory,
    pub peripherals: Vec<PeripheralEntry>,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    /// The Project 6 layout: 16 KiB RAM at 0, UART at `0x8000_0000`.
    pub fn new() -> Self {
        Self {
            ram: LinearMemory::new(16 * 1024, 0x0),
            peripherals: vec![PeripheralEntry {
                name: "uart0".to_string(),
                base: 0x8000_0000,
                size: uart::WINDOW_SIZE,
                dev: Box::new(SoftUart::new()),
            }],
        }
    }

    pub fn from_config(board: &BoardConfig) -> anyhow::Result<Self> {
        let ram_size = parse_size(&board.memory.size)
            .with_context(|| format!("Invalid memory size for board '{}'", board.name))?;

        let uart = SoftUart::new().with_tx_busy_cycles(board.uart.tx_busy_cycles);
        tracing::debug!(
            "Board '{}': RAM {:#x}+{:#x}, UART at {:#x}",
            board.name,
            board.memory.base,
            ram_size,
            board.uart.base_address
        );

        Ok(Self {
            ram: LinearMemory::new(ram_size as usize, board.memory.base),
            peripherals: vec![PeripheralEntry {
                name: "uart0".to_string(),
                base: board.uart.base_address,
                size: uart::WINDOW_SIZE,
                dev: Box::new(uart),
            }],
        })
    }

    /// Attach a UART TX capture sink to the UART on this bus.
    ///
    /// When `echo_stdout` is false, UART writes will no longer be printed to stdout.
    pub fn attach_uart_tx_sink(&mut self, sink: Arc<Mutex<Vec<u8>>>, echo_stdout: bool) {
        if let Some(uart) = self.uart_mut() {
            uart.set_sink(Some(sink), echo_stdout);
        }
    }

    pub fn uart(&self) -> Option<&SoftUart> {
        self.peripherals
            .iter()
            .find_map(|p| p.dev.as_any()?.downcast_ref::<SoftUart>())
    }

    pub fn uart_mut(&mut self) -> Option<&mut SoftUart> {
        self.peripherals
            .iter_mut()
            .find_map(|p| p.dev.as_any_mut()?.downcast_mut::<SoftUart>())
    }
}

impl Bus for SystemBus {
    fn read_u8(&mut self, addr: u64) -> SimResult<u8> {
        if let Some(val) = self.ram.read_u8(addr) {
            return Ok(val);
        }
        match self.peripherals.iter_mut().find(|p| p.contains(addr)) {
            Some(p) => p.dev.read(addr - p.base),
            None => Err(SimulationError::MemoryViolation(addr)),
        }
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        if self.ram.write_u8(addr, value) {
            return Ok(());
        }
        match self.peripherals.iter_mut().find(|p| p.contains(addr)) {
            Some(p) => p.dev.write(addr - p.base, value),
            None => Err(SimulationError::MemoryViolation(addr)),
        }
    }

    fn tick_peripherals(&mut self) {
        for p in &mut self.peripherals {
            p.dev.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map_routes_ram_and_uart() {
        let mut bus = SystemBus::new();
        bus.write_u32(0x100, 0xDEAD_BEEF).unwrap();
        assert_eq!(bus.read_u32(0x100).unwrap(), 0xDEAD_BEEF);

        // Status word: TX_READY only.
        assert_eq!(bus.read_u32(0x8000_0004).unwrap(), 0x2);

        let sink = Arc::new(Mutex::new(Vec::new()));
        bus.attach_uart_tx_sink(sink.clone(), false);
        bus.write_u32(0x8000_0000, b'R' as u32).unwrap();
        assert_eq!(*sink.lock().unwrap(), b"R".to_vec());
    }

    #[test]
    fn test_unmapped_access_is_violation() {
        let mut bus = SystemBus::new();
        assert!(matches!(
            bus.read_u8(0x4000),
            Err(SimulationError::MemoryViolation(0x4000))
        ));
        assert!(matches!(
            bus.write_u8(0x8000_0008, 0),
            Err(SimulationError::MemoryViolation(0x8000_0008))
        ));
    }

    #[test]
    fn test_from_config_applies_layout() {
        let mut board = BoardConfig::default();
        board.memory.base = 0x1000_0000;
        board.memory.size = "4 KiB".to_string();
        board.uart.base_address = 0x2000_0000;
        board.uart.tx_busy_cycles = 3;

        let mut bus = SystemBus::from_config(&board).unwrap();
        assert_eq!(bus.ram.data.len(), 4096);
        assert!(bus.read_u8(0x1000_0FFF).is_ok());
        assert!(bus.read_u8(0x0).is_err());

        bus.write_u8(0x2000_0000, b'!').unwrap();
        // Transmitter now busy for three ticks.
        assert_eq!(bus.read_u8(0x2000_0004).unwrap(), 0x0);
        for _ in 0..3 {
            bus.tick_peripherals();
        }
        assert_eq!(bus.read_u8(0x2000_0004).unwrap(), 0x2);
    }

    #[test]
    fn test_data_read_consumes_rx() {
        let mut bus = SystemBus::new();
        bus.uart_mut().unwrap().push_rx(b"A");
        assert_eq!(bus.uart().unwrap().rx_pending(), 1);
        assert_eq!(bus.read_u8(0x8000_0000).unwrap(), b'A');
        assert_eq!(bus.uart().unwrap().rx_pending(), 0);
    }
}
