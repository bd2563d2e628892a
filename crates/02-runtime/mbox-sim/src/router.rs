use std::sync::Arc;

use lpc_mbox::{InterruptRouter, InterruptSink};
use parking_lot::Mutex;

struct Subscription {
    chip_id: u32,
    irq: u32,
    sink: Arc<dyn InterruptSink>,
}

/// LPC interrupt controller that records subscriptions and delivers
/// interrupts on request.
pub struct SimRouter {
    accept: bool,
    subs: Mutex<Vec<Subscription>>,
}

impl Default for SimRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRouter {
    /// Router that accepts every subscription.
    pub fn new() -> Self {
        Self {
            accept: true,
            subs: Mutex::new(Vec::new()),
        }
    }

    /// Router that refuses every subscription.
    pub fn refusing() -> Self {
        Self {
            accept: false,
            subs: Mutex::new(Vec::new()),
        }
    }

    /// `(chip_id, irq)` of every accepted subscription.
    pub fn subscriptions(&self) -> Vec<(u32, u32)> {
        self.subs.lock().iter().map(|s| (s.chip_id, s.irq)).collect()
    }

    /// Delivers `irq` to its subscribers, returning how many were called.
    pub fn fire(&self, irq: u32) -> usize {
        // Deliver outside the lock; a sink may subscribe again.
        let sinks: Vec<_> = self
            .subs
            .lock()
            .iter()
            .filter(|s| s.irq == irq)
            .map(|s| Arc::clone(&s.sink))
            .collect();
        for sink in &sinks {
            sink.interrupt();
        }
        sinks.len()
    }
}

impl InterruptRouter for SimRouter {
    fn register(&self, chip_id: u32, irq: u32, sink: Arc<dyn InterruptSink>) -> bool {
        if self.accept {
            self.subs.lock().push(Subscription { chip_id, irq, sink });
        }
        self.accept
    }
}
