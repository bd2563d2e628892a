//! Register map of the LPC mailbox window.
//!
//! Offsets are relative to the IO base discovered at init time:
//!
//! ```text
//! 0x00..=0x0E  data registers (one message, MBOX_DATA_REGS bytes)
//! 0x0F         flag register (peer action bits, read on attention)
//! 0x10         status 0
//! 0x11         status 1      bit 7 = attention pending (W1C)
//! 0x12         BMC control
//! 0x13         host control  bit 7 = int status (W1C), bit 1 = int mask, bit 0 = send
//! 0x14..=0x17  BMC/host interrupt enables for status 0/1
//! ```

use bitflags::bitflags;

/// Number of data registers carrying one message.
pub const MBOX_DATA_REGS: usize = 15;

/// Width of the whole register window.
pub const MBOX_WINDOW_LEN: usize = 0x18;

/// Named registers above the data block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reg {
    Flag,
    Status0,
    Status1,
    BmcCtrl,
    HostCtrl,
    BmcIntEn0,
    BmcIntEn1,
    HostIntEn0,
    HostIntEn1,
}

impl Reg {
    pub const fn offset(self) -> u8 {
        match self {
            Reg::Flag => 0x0f,
            Reg::Status0 => 0x10,
            Reg::Status1 => 0x11,
            Reg::BmcCtrl => 0x12,
            Reg::HostCtrl => 0x13,
            Reg::BmcIntEn0 => 0x14,
            Reg::BmcIntEn1 => 0x15,
            Reg::HostIntEn0 => 0x16,
            Reg::HostIntEn1 => 0x17,
        }
    }
}

bitflags! {
    /// Bits of the BMC and host control registers.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Ctrl: u8 {
        /// Peer signalled us. Write one to clear.
        const INT_STATUS = 1 << 7;
        const INT_MASK = 1 << 1;
        /// Ping the peer.
        const INT_SEND = 1 << 0;
    }
}

bitflags! {
    /// Bits of the two status registers.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Status: u8 {
        /// Peer has something to tell us. Write one to clear.
        const ATTN = 1 << 7;
    }
}

bitflags! {
    /// Action bits the peer leaves in the flag register with an attention.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Action: u8 {
        const BMC_RESET = 1 << 0;
        /// Reserved by the peer firmware; we do not act on it.
        const BMC_COMPLETE = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_registers_sit_above_the_data_block() {
        let regs = [
            Reg::Flag,
            Reg::Status0,
            Reg::Status1,
            Reg::BmcCtrl,
            Reg::HostCtrl,
            Reg::BmcIntEn0,
            Reg::BmcIntEn1,
            Reg::HostIntEn0,
            Reg::HostIntEn1,
        ];
        for reg in regs {
            assert!(reg.offset() as usize >= MBOX_DATA_REGS, "{reg:?} overlaps data");
            assert!((reg.offset() as usize) < MBOX_WINDOW_LEN, "{reg:?} outside window");
        }
        assert_eq!(Reg::Flag.offset() as usize, MBOX_DATA_REGS);
    }

    #[test]
    fn unknown_action_bits_survive_truncation() {
        let action = Action::from_bits_retain(0x05);
        assert!(action.contains(Action::BMC_RESET));
        assert_eq!((action - Action::BMC_RESET).bits(), 0x04);
    }
}
