// RvEcho - Soft-Core UART Echo Firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Scripted stand-in for the UART register block.

use crate::regs::{Status, UartRegisters};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    StatusRead(Status),
    DataRead(u8),
    DataWrite(u8),
}

/// Replays queued status values, then falls back to live flags derived from
/// the receive queue. Every register access is appended to `log`.
#[derive(Debug, Default)]
pub struct ScriptedUart {
    status_script: VecDeque<Status>,
    rx: VecDeque<u8>,
    tx_ready: bool,
    poll_budget: Option<usize>,
    pub log: Vec<Access>,
}

impl ScriptedUart {
    pub fn new() -> Self {
        Self {
            tx_ready: true,
            ..Default::default()
        }
    }

    pub fn always_ready() -> Self {
        Self::new()
    }

    pub fn queue_status(&mut self, status: Status) {
        self.status_script.push_back(status);
    }

    pub fn queue_rx(&mut self, byte: u8) {
        self.rx.push_back(byte);
    }

    pub fn queue_rx_bytes(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Panic once more than `polls` status reads have been made. Lets tests
    /// drive the never-returning loop and inspect the log afterwards.
    pub fn with_poll_budget(mut self, polls: usize) -> Self {
        self.poll_budget = Some(polls);
        self
    }

    pub fn status_reads(&self) -> usize {
        self.log
            .iter()
            .filter(|a| matches!(a, Access::StatusRead(_)))
            .count()
    }

    pub fn data_reads(&self) -> usize {
        self.log
            .iter()
            .filter(|a| matches!(a, Access::DataRead(_)))
            .count()
    }

    pub fn data_writes(&self) -> Vec<u8> {
        self.log
            .iter()
            .filter_map(|a| match a {
                Access::DataWrite(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    fn live_status(&self) -> Status {
        let mut status = Status::empty();
        if !self.rx.is_empty() {
            status |= Status::RX_VALID;
        }
        if self.tx_ready {
            status |= Status::TX_READY;
        }
        status
    }
}

impl UartRegisters for ScriptedUart {
    fn read_status(&mut self) -> Status {
        if let Some(budget) = self.poll_budget {
            if self.status_reads() >= budget {
                panic!("poll budget of {} status reads exhausted", budget);
            }
        }
        let status = self
            .status_script
            .pop_front()
            .unwrap_or_else(|| self.live_status());
        self.log.push(Access::StatusRead(status));
        status
    }

    fn read_data(&mut self) -> u8 {
        let byte = self.rx.pop_front().unwrap_or(0);
        self.log.push(Access::DataRead(byte));
        byte
    }

    fn write_data(&mut self, byte: u8) {
        self.log.push(Access::DataWrite(byte));
    }
}
