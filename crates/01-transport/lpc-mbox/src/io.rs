//! Byte access to the mailbox window over the LPC IO space.

use std::sync::Arc;

use crate::regs::{Reg, MBOX_DATA_REGS};

/// LPC bus as seen by the mailbox.
///
/// Byte reads and writes are assumed to always complete; `ok()` only reports
/// whether the bus currently looks healthy.
pub trait LpcIo: Send + Sync {
    fn inb(&self, port: u32) -> u8;
    fn outb(&self, port: u32, value: u8);
    /// Whether an LPC bus exists on this machine at all.
    fn present(&self) -> bool;
    /// Whether the bus is usable right now.
    fn ok(&self) -> bool {
        self.present()
    }
}

/// The mailbox registers at a fixed IO base.
#[derive(Clone)]
pub struct RegisterWindow {
    io: Arc<dyn LpcIo>,
    base: u32,
}

impl RegisterWindow {
    pub fn new(io: Arc<dyn LpcIo>, base: u32) -> Self {
        Self { io, base }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn read(&self, reg: Reg) -> u8 {
        self.io.inb(self.base + u32::from(reg.offset()))
    }

    pub fn write(&self, reg: Reg, value: u8) {
        self.io.outb(self.base + u32::from(reg.offset()), value);
    }

    pub fn read_data(&self, index: usize) -> u8 {
        debug_assert!(index < MBOX_DATA_REGS);
        self.io.inb(self.base + index as u32)
    }

    pub fn write_data(&self, index: usize, value: u8) {
        debug_assert!(index < MBOX_DATA_REGS);
        self.io.outb(self.base + index as u32, value);
    }

    pub fn bus_ok(&self) -> bool {
        self.io.ok()
    }
}
