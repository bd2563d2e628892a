use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use lpc_mbox::regs::{Ctrl, Reg, Status};
use lpc_mbox::LpcIo;
use parking_lot::Mutex;

const IO_SPACE: usize = 0x1_0000;

/// LPC IO space holding one mailbox window.
///
/// Host writes to the window follow the hardware conventions the driver
/// relies on: `HOST_CTRL.INT_STATUS` and `STATUS_1.ATTN` are write-one-to-clear
/// and `HOST_CTRL.INT_SEND` pings the peer instead of latching.
pub struct SimLpc {
    mem: Mutex<Vec<u8>>,
    base: u32,
    present: AtomicBool,
    ok: AtomicBool,
    pings: AtomicU32,
    writes: Mutex<Vec<(u32, u8)>>,
}

impl SimLpc {
    /// Creates an IO space with the mailbox window at `base`.
    pub fn new(base: u32) -> Self {
        assert!(
            (base as usize) + lpc_mbox::regs::MBOX_WINDOW_LEN <= IO_SPACE,
            "mailbox window must fit in IO space"
        );
        Self {
            mem: Mutex::new(vec![0; IO_SPACE]),
            base,
            present: AtomicBool::new(true),
            ok: AtomicBool::new(true),
            pings: AtomicU32::new(0),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Base of the mailbox window.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Makes the whole bus disappear.
    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::Relaxed);
    }

    /// Marks the bus as unhealthy without removing it.
    pub fn set_ok(&self, ok: bool) {
        self.ok.store(ok, Ordering::Relaxed);
    }

    /// Reads a window register without side effects.
    pub fn peek(&self, reg: Reg) -> u8 {
        self.mem.lock()[self.port(reg) as usize]
    }

    /// Sets a window register from the peer side, bypassing host semantics.
    pub fn poke(&self, reg: Reg, value: u8) {
        self.mem.lock()[self.port(reg) as usize] = value;
    }

    /// Sets bits from the peer side.
    pub fn set_bits(&self, reg: Reg, bits: u8) {
        self.mem.lock()[self.port(reg) as usize] |= bits;
    }

    /// Copies the data block as the peer sees it.
    pub fn peek_data(&self) -> lpc_mbox::RegisterBlock {
        let mem = self.mem.lock();
        let start = self.base as usize;
        let mut block = [0u8; lpc_mbox::MBOX_DATA_REGS];
        block.copy_from_slice(&mem[start..start + lpc_mbox::MBOX_DATA_REGS]);
        block
    }

    /// Overwrites the data block from the peer side.
    pub fn poke_data(&self, block: &lpc_mbox::RegisterBlock) {
        let mut mem = self.mem.lock();
        let start = self.base as usize;
        mem[start..start + block.len()].copy_from_slice(block);
    }

    /// Consumes one pending host ping, if any.
    pub fn take_ping(&self) -> bool {
        self.pings
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Pings not yet consumed by the peer.
    pub fn pending_pings(&self) -> u32 {
        self.pings.load(Ordering::Acquire)
    }

    /// Every host write so far, as `(port, value)`.
    pub fn writes(&self) -> Vec<(u32, u8)> {
        self.writes.lock().clone()
    }

    /// Host writes that landed on `reg`.
    pub fn writes_to(&self, reg: Reg) -> Vec<u8> {
        let port = self.port(reg);
        self.writes
            .lock()
            .iter()
            .filter(|(p, _)| *p == port)
            .map(|&(_, v)| v)
            .collect()
    }

    fn port(&self, reg: Reg) -> u32 {
        self.base + u32::from(reg.offset())
    }
}

impl LpcIo for SimLpc {
    fn inb(&self, port: u32) -> u8 {
        self.mem.lock()[port as usize]
    }

    fn outb(&self, port: u32, value: u8) {
        self.writes.lock().push((port, value));

        let mut mem = self.mem.lock();
        let cell = &mut mem[port as usize];
        if port == self.port(Reg::HostCtrl) {
            let w1c = Ctrl::INT_STATUS.bits();
            if value & Ctrl::INT_SEND.bits() != 0 {
                self.pings.fetch_add(1, Ordering::AcqRel);
            }
            let latched = value & !(w1c | Ctrl::INT_SEND.bits());
            *cell = latched | (*cell & w1c & !value);
        } else if port == self.port(Reg::Status1) {
            let w1c = Status::ATTN.bits();
            *cell = (value & !w1c) | (*cell & w1c & !value);
        } else {
            *cell = value;
        }
    }

    fn present(&self) -> bool {
        self.present.load(Ordering::Relaxed)
    }

    fn ok(&self) -> bool {
        self.present() && self.ok.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bits_are_write_one_to_clear() {
        let lpc = SimLpc::new(0x1000);
        lpc.poke(Reg::HostCtrl, 0x80);
        lpc.outb(0x1013, 0x00);
        assert_eq!(lpc.peek(Reg::HostCtrl), 0x80, "writing zero leaves it set");
        lpc.outb(0x1013, 0x80);
        assert_eq!(lpc.peek(Reg::HostCtrl), 0x00);

        lpc.poke(Reg::Status1, 0x80);
        lpc.outb(0x1011, 0x80);
        assert_eq!(lpc.peek(Reg::Status1), 0x00);
    }

    #[test]
    fn send_bit_pings_without_latching() {
        let lpc = SimLpc::new(0x1000);
        lpc.outb(0x1013, 0x01);
        assert_eq!(lpc.peek(Reg::HostCtrl), 0x00);
        assert!(lpc.take_ping());
        assert!(!lpc.take_ping());
    }

    #[test]
    fn data_block_is_shared_with_the_host() {
        let lpc = SimLpc::new(0x1000);
        let block: lpc_mbox::RegisterBlock = core::array::from_fn(|i| i as u8 * 3);
        lpc.poke_data(&block);
        assert_eq!(lpc.peek_data(), block);
        assert_eq!(lpc.inb(0x1000 + 4), 12);
        assert_eq!(lpc.peek(Reg::Flag), 0, "flag register untouched");
    }

    #[test]
    fn writes_are_logged_per_register() {
        let lpc = SimLpc::new(0x1000);
        lpc.outb(0x1016, 0x00);
        lpc.outb(0x1017, 0x80);
        assert_eq!(lpc.writes_to(Reg::HostIntEn1), vec![0x80]);
        assert_eq!(lpc.writes().len(), 2);
    }
}
