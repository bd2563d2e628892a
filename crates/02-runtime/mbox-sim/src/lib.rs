#![deny(missing_docs)]
//! Simulated platform for the LPC mailbox, shared by integration tests and
//! the CLI.
//!
//! * [`SimLpc`] – LPC IO space with the mailbox's write-one-to-clear bits.
//! * [`SimBmc`] – the peer end of the window.
//! * [`ManualTimer`] / [`ThreadTimer`] – deterministic and threaded poll timers.
//! * [`SimRouter`] – interrupt subscriptions the BMC can fire.

mod bmc;
mod lpc;
mod router;
mod timer;

pub use bmc::SimBmc;
pub use lpc::SimLpc;
pub use router::SimRouter;
pub use timer::{ManualTimer, ThreadTimer};

/// IO base used by the default platform description.
pub const SIM_BASE: u32 = 0x1000;
/// LPC interrupt line used by the default platform description.
pub const SIM_IRQ: u32 = 9;

/// Platform description with a single mailbox at [`SIM_BASE`].
pub fn default_nodes() -> Vec<lpc_mbox::ChannelNode> {
    vec![lpc_mbox::ChannelNode::io("mbox", 0, SIM_BASE, SIM_IRQ)]
}
