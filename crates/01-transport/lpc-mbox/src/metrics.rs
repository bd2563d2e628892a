use std::sync::atomic::{AtomicU32, Ordering};

/// Counters for events the handler absorbs instead of reporting to a caller.
#[derive(Default)]
pub(crate) struct MboxMetrics {
    sent: AtomicU32,
    busy: AtomicU32,
    completed: AtomicU32,
    orphan_completions: AtomicU32,
    missing_callback: AtomicU32,
    peer_resets: AtomicU32,
    unknown_attention: AtomicU32,
    bus_not_ready: AtomicU32,
    polls: AtomicU32,
    interrupts: AtomicU32,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum MboxEvent {
    Sent,
    Busy,
    Completed,
    OrphanCompletion,
    MissingCallback,
    PeerReset,
    UnknownAttention,
    BusNotReady,
    Poll,
    Interrupt,
}

impl MboxMetrics {
    pub(crate) fn record(&self, event: MboxEvent) {
        let counter = match event {
            MboxEvent::Sent => &self.sent,
            MboxEvent::Busy => &self.busy,
            MboxEvent::Completed => &self.completed,
            MboxEvent::OrphanCompletion => &self.orphan_completions,
            MboxEvent::MissingCallback => &self.missing_callback,
            MboxEvent::PeerReset => &self.peer_resets,
            MboxEvent::UnknownAttention => &self.unknown_attention,
            MboxEvent::BusNotReady => &self.bus_not_ready,
            MboxEvent::Poll => &self.polls,
            MboxEvent::Interrupt => &self.interrupts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MboxMetricsSnapshot {
        MboxMetricsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            busy: self.busy.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            orphan_completions: self.orphan_completions.load(Ordering::Relaxed),
            missing_callback: self.missing_callback.load(Ordering::Relaxed),
            peer_resets: self.peer_resets.load(Ordering::Relaxed),
            unknown_attention: self.unknown_attention.load(Ordering::Relaxed),
            bus_not_ready: self.bus_not_ready.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            interrupts: self.interrupts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the mailbox counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MboxMetricsSnapshot {
    pub sent: u32,
    pub busy: u32,
    pub completed: u32,
    /// Completion signalled with nothing in flight.
    pub orphan_completions: u32,
    pub missing_callback: u32,
    pub peer_resets: u32,
    /// Attentions carrying action bits we do not understand.
    pub unknown_attention: u32,
    pub bus_not_ready: u32,
    pub polls: u32,
    pub interrupts: u32,
}
