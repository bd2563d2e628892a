use std::sync::Arc;

use lpc_mbox::regs::{Action, Ctrl, Reg, Status};
use lpc_mbox::{MboxMsg, RegisterBlock};
use tracing::trace;

use crate::lpc::SimLpc;
use crate::router::SimRouter;

/// The BMC end of the mailbox window.
///
/// With an interrupt line attached, every completion and attention is also
/// delivered through the router; otherwise the host only notices on its next
/// poll.
#[derive(Clone)]
pub struct SimBmc {
    lpc: Arc<SimLpc>,
    irq: Option<(Arc<SimRouter>, u32)>,
}

impl SimBmc {
    /// Peer that never raises interrupts.
    pub fn new(lpc: Arc<SimLpc>) -> Self {
        Self { lpc, irq: None }
    }

    /// Peer that raises `irq` through `router` after each signal.
    pub fn with_irq(lpc: Arc<SimLpc>, router: Arc<SimRouter>, irq: u32) -> Self {
        Self {
            lpc,
            irq: Some((router, irq)),
        }
    }

    /// The IO space this peer shares with the host.
    pub fn lpc(&self) -> &Arc<SimLpc> {
        &self.lpc
    }

    /// Consumes one host ping.
    pub fn take_ping(&self) -> bool {
        self.lpc.take_ping()
    }

    /// The request currently in the data registers.
    pub fn request(&self) -> MboxMsg {
        MboxMsg::from_bytes(self.lpc.peek_data())
    }

    /// Writes the response and flags completion to the host.
    pub fn complete(&self, response: &RegisterBlock) {
        self.lpc.poke_data(response);
        self.lpc.set_bits(Reg::HostCtrl, Ctrl::INT_STATUS.bits());
        trace!("sim bmc completed request");
        self.raise();
    }

    /// Flags completion without touching the data registers.
    pub fn signal_completion(&self) {
        self.lpc.set_bits(Reg::HostCtrl, Ctrl::INT_STATUS.bits());
        self.raise();
    }

    /// Leaves `action` in the flag register and raises an attention.
    pub fn raise_attention(&self, action: u8) {
        self.lpc.poke(Reg::Flag, action);
        self.lpc.set_bits(Reg::Status1, Status::ATTN.bits());
        trace!(action, "sim bmc raised attention");
        self.raise();
    }

    /// Announces a BMC reboot.
    pub fn reset(&self) {
        self.raise_attention(Action::BMC_RESET.bits());
    }

    /// Answers one pending request by applying `respond` to it.
    ///
    /// Returns false if the host has not pinged.
    pub fn serve_one(&self, respond: impl FnOnce(MboxMsg) -> MboxMsg) -> bool {
        if !self.take_ping() {
            return false;
        }
        let response = respond(self.request());
        self.complete(response.as_bytes());
        true
    }

    fn raise(&self) {
        if let Some((router, irq)) = &self.irq {
            router.fire(*irq);
        }
    }
}
