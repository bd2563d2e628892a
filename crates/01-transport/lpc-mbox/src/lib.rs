//! Host-side transport for the LPC mailbox shared with the BMC.
//!
//! * [`Mailbox`] – the channel: one message in flight, completed by interrupt
//!   or poll timer, with attention decoding on the side.
//! * [`codec`] – the data register block to/from [`MboxMsg`].
//! * [`LpcIo`], [`PollTimer`], [`InterruptRouter`] – what the platform must
//!   provide.
//! * [`InitError`] / [`SendError`] – synchronous failures. Everything the
//!   handler runs into is logged and counted in [`MboxMetricsSnapshot`].

pub mod codec;
mod config;
mod error;
mod io;
mod mailbox;
mod metrics;
pub mod platform;
pub mod regs;
mod slot;

pub use codec::{MboxMsg, RegisterBlock};
pub use config::{MboxConfig, MissingNodeSeverity};
pub use error::{InitError, InitResult, SendError};
pub use io::{LpcIo, RegisterWindow};
pub use mailbox::{Callback, ChannelInfo, Mailbox};
pub use metrics::MboxMetricsSnapshot;
pub use platform::{
    AddressSpace, Cadence, ChannelNode, InterruptRouter, InterruptSink, PollTimer, RegProperty,
};
pub use regs::MBOX_DATA_REGS;
pub use slot::{Completion, InFlightSlot};
