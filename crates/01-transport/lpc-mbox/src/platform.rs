//! Collaborators supplied by the platform: the channel description, the poll
//! timer and interrupt routing.

use std::sync::Arc;
use std::time::Duration;

/// Address space of a `reg` entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressSpace {
    Mem,
    Io,
    Fw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegProperty {
    pub space: AddressSpace,
    pub base: u32,
}

/// Platform description of one mailbox channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelNode {
    pub compatible: String,
    pub chip_id: u32,
    /// LPC interrupt line. Zero is treated the same as absent.
    pub interrupts: Option<u32>,
    pub reg: Option<RegProperty>,
}

impl ChannelNode {
    /// A well-formed IO-space channel.
    pub fn io(compatible: impl Into<String>, chip_id: u32, base: u32, irq: u32) -> Self {
        Self {
            compatible: compatible.into(),
            chip_id,
            interrupts: Some(irq),
            reg: Some(RegProperty {
                space: AddressSpace::Io,
                base,
            }),
        }
    }

    pub fn irq(&self) -> Option<u32> {
        self.interrupts.filter(|&irq| irq != 0)
    }
}

/// First node whose compatible string matches `compatible`.
pub fn find_compatible<'a>(nodes: &'a [ChannelNode], compatible: &str) -> Option<&'a ChannelNode> {
    nodes.iter().find(|node| node.compatible == compatible)
}

/// When the next handler run should happen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cadence {
    /// As soon as the platform next polls.
    Poll,
    After(Duration),
}

/// Re-armable one-shot timer. On expiry the platform calls
/// [`crate::Mailbox::poll`].
pub trait PollTimer: Send + Sync {
    /// Arms the timer, replacing any earlier schedule.
    fn schedule(&self, cadence: Cadence);
    fn cancel(&self);
}

/// Receives interrupt deliveries for a subscribed line.
pub trait InterruptSink: Send + Sync {
    fn interrupt(&self);
}

/// Interrupt controller side of the LPC bus.
pub trait InterruptRouter {
    /// Subscribes `sink` to `irq` on `chip_id`. Returns false if refused.
    fn register(&self, chip_id: u32, irq: u32, sink: Arc<dyn InterruptSink>) -> bool;
}
