//! Mapping between [`MboxMsg`] and the data register block.
//!
//! The transport never looks inside a message. Any `MBOX_DATA_REGS`-byte block
//! is a valid message, so both directions are total.

use crate::io::RegisterWindow;
use crate::regs::MBOX_DATA_REGS;

/// Raw contents of the data registers, in register order.
pub type RegisterBlock = [u8; MBOX_DATA_REGS];

/// One request or response exchanged with the BMC.
///
/// Deliberately not `Copy`: a message is owned by exactly one of the caller,
/// the mailbox, or the completion callback.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MboxMsg {
    data: RegisterBlock,
}

impl MboxMsg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: RegisterBlock) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &RegisterBlock {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut RegisterBlock {
        &mut self.data
    }
}

pub fn serialize(msg: &MboxMsg) -> RegisterBlock {
    msg.data
}

pub fn deserialize(raw: RegisterBlock) -> MboxMsg {
    MboxMsg { data: raw }
}

/// Copies a serialized message into the data registers, lowest offset first.
pub fn write_block(window: &RegisterWindow, block: &RegisterBlock) {
    for (index, &byte) in block.iter().enumerate() {
        window.write_data(index, byte);
    }
}

/// Overwrites `msg` with the current contents of the data registers.
pub fn read_message(window: &RegisterWindow, msg: &mut MboxMsg) {
    let mut raw = [0u8; MBOX_DATA_REGS];
    for (index, byte) in raw.iter_mut().enumerate() {
        *byte = window.read_data(index);
    }
    *msg = deserialize(raw);
}
