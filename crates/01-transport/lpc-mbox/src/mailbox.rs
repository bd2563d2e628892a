//! Host side of the BMC mailbox: one message in flight, completed either by
//! interrupt or by the poll timer, plus decoding of peer attentions.
//!
//! Both triggers funnel into [`Mailbox::poll`]. One run at a time owns the
//! registers; a trigger that arrives while another run is active only asks it
//! to go round once more, so two triggers for one completion deliver it once.
//! A duplicate run that finds nothing pending costs a couple of register
//! reads and a re-arm.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::codec::{self, MboxMsg};
use crate::config::{MboxConfig, MissingNodeSeverity};
use crate::error::{InitError, InitResult, SendError};
use crate::io::{LpcIo, RegisterWindow};
use crate::metrics::{MboxEvent, MboxMetrics, MboxMetricsSnapshot};
use crate::platform::{
    find_compatible, AddressSpace, Cadence, ChannelNode, InterruptRouter, InterruptSink, PollTimer,
};
use crate::regs::{Action, Ctrl, Reg, Status};
use crate::slot::{Completion, InFlightSlot};

/// Completion callback. Receives the caller's message, overwritten with the
/// response registers.
pub type Callback = Box<dyn FnMut(MboxMsg) + Send>;

/// What [`Mailbox::init`] brought up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelInfo {
    pub chip_id: u32,
    pub base: u32,
    pub irq: u32,
    /// False if the router refused the line; the channel then runs on the
    /// poll timer alone.
    pub irq_registered: bool,
}

pub struct Mailbox {
    io: Arc<dyn LpcIo>,
    timer: Arc<dyn PollTimer>,
    config: MboxConfig,
    init_lock: Mutex<()>,
    /// Held for the whole of a send; shutdown waits on it.
    send_lock: Mutex<()>,
    /// Held by the active handler run.
    handler: Mutex<()>,
    rerun: AtomicBool,
    window: OnceLock<RegisterWindow>,
    irq_ok: AtomicBool,
    closed: AtomicBool,
    slot: InFlightSlot,
    callback: Mutex<Option<Callback>>,
    metrics: MboxMetrics,
}

impl Mailbox {
    pub fn new(io: Arc<dyn LpcIo>, timer: Arc<dyn PollTimer>, config: MboxConfig) -> Arc<Self> {
        Arc::new(Self {
            io,
            timer,
            config,
            init_lock: Mutex::new(()),
            send_lock: Mutex::new(()),
            handler: Mutex::new(()),
            rerun: AtomicBool::new(false),
            window: OnceLock::new(),
            irq_ok: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            slot: InFlightSlot::new(),
            callback: Mutex::new(None),
            metrics: MboxMetrics::default(),
        })
    }

    /// Finds the channel in `nodes`, programs the hardware and subscribes to
    /// its interrupt line.
    pub fn init(
        self: &Arc<Self>,
        nodes: &[ChannelNode],
        router: &dyn InterruptRouter,
    ) -> InitResult<ChannelInfo> {
        let _guard = self.init_lock.lock();
        if self.window.get().is_some() {
            error!("duplicate mailbox init");
            return Err(InitError::AlreadyInitialized);
        }

        debug!("attempting mailbox init");
        let Some(node) = find_compatible(nodes, &self.config.compatible) else {
            let compatible = &self.config.compatible;
            match self.config.missing_node_severity {
                MissingNodeSeverity::Debug => debug!(%compatible, "no platform entry"),
                MissingNodeSeverity::Error => error!(%compatible, "no platform entry"),
            }
            return Err(InitError::NoChannel("no platform entry"));
        };

        let Some(irq) = node.irq() else {
            error!("no interrupts property");
            return Err(InitError::MissingInterruptLine);
        };

        if !self.io.present() {
            error!("LPC not present");
            return Err(InitError::NoChannel("LPC bus not present"));
        }

        let Some(reg) = node.reg else {
            error!("can't find reg property");
            return Err(InitError::NoChannel("no reg property"));
        };
        if reg.space != AddressSpace::Io {
            error!(space = ?reg.space, "only IO addresses are supported");
            return Err(InitError::UnsupportedAddressSpace(reg.space));
        }

        let window = RegisterWindow::new(Arc::clone(&self.io), reg.base);
        if let Err(err) = init_hw(&window) {
            debug!("couldn't init hardware");
            return Err(err);
        }

        self.slot.release();
        self.irq_ok.store(false, Ordering::Release);
        self.closed.store(false, Ordering::Release);
        // Guarded by `init_lock` and checked empty above.
        let _ = self.window.set(window);

        let sink: Arc<dyn InterruptSink> = Arc::clone(self) as Arc<dyn InterruptSink>;
        let irq_registered = router.register(node.chip_id, irq, sink);
        if !irq_registered {
            warn!(irq, "interrupt subscription refused, relying on polling");
        }

        debug!(
            chip_id = node.chip_id,
            "enabled on chip {}, IO port 0x{:x}, IRQ {}",
            node.chip_id,
            reg.base,
            irq
        );
        Ok(ChannelInfo {
            chip_id: node.chip_id,
            base: reg.base,
            irq,
            irq_registered,
        })
    }

    /// Installs the completion callback, replacing any earlier one.
    pub fn register_callback<F>(&self, callback: F)
    where
        F: FnMut(MboxMsg) + Send + 'static,
    {
        *self.callback.lock() = Some(Box::new(callback));
    }

    /// Hands `msg` to the BMC. Never blocks: with a message already in flight
    /// it comes straight back in [`SendError::Busy`].
    pub fn send(&self, msg: MboxMsg) -> Result<(), SendError> {
        let Some(window) = self.window.get() else {
            error!(critical = true, "using mailbox without init");
            return Err(SendError::NotInitialized(msg));
        };
        let _sending = self.send_lock.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(SendError::Closed(msg));
        }

        let block = codec::serialize(&msg);
        if let Err(msg) = self.slot.try_claim(msg) {
            debug!("mailbox message already in flight");
            self.metrics.record(MboxEvent::Busy);
            return Err(SendError::Busy(msg));
        }

        if !window.bus_ok() {
            // Best effort: the write may still land, and polling continues.
            error!("LPC isn't ok");
            self.metrics.record(MboxEvent::BusNotReady);
        }
        codec::write_block(window, &block);

        debug!("sending BMC interrupt");
        window.write(Reg::HostCtrl, Ctrl::INT_SEND.bits());
        self.metrics.record(MboxEvent::Sent);

        self.rearm();
        Ok(())
    }

    /// Handler body, run on every timer expiry and interrupt.
    pub fn poll(&self) {
        let Some(window) = self.window.get() else {
            trace!("mailbox poll before init");
            return;
        };
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        self.rerun.store(true, Ordering::Release);
        loop {
            let Some(running) = self.handler.try_lock() else {
                trace!("handler already running, leaving it a rerun");
                return;
            };
            while self.rerun.swap(false, Ordering::AcqRel) {
                self.metrics.record(MboxEvent::Poll);
                self.check_completion(window);
                self.check_attention(window);
            }
            drop(running);
            // A trigger may have raised the flag between the last swap and
            // the unlock, and found the handler still held.
            if !self.rerun.load(Ordering::Acquire) {
                break;
            }
        }
        self.rearm();
    }

    /// Stops re-arming and returns a message that never completed.
    ///
    /// Waits for a send in progress to finish. Further sends fail with
    /// [`SendError::Closed`]. A message whose completion callback is currently
    /// running belongs to that callback and is not returned.
    pub fn shutdown(&self) -> Option<MboxMsg> {
        let _sending = self.send_lock.lock();
        self.closed.store(true, Ordering::Release);
        self.timer.cancel();
        let pending = self.slot.drain();
        info!(abandoned = pending.is_some(), "mailbox shut down");
        pending
    }

    pub fn is_initialized(&self) -> bool {
        self.window.get().is_some()
    }

    pub fn base(&self) -> Option<u32> {
        self.window.get().map(RegisterWindow::base)
    }

    /// Whether an interrupt has been seen on this channel.
    pub fn irq_ok(&self) -> bool {
        self.irq_ok.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &MboxConfig {
        &self.config
    }

    pub fn metrics(&self) -> MboxMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Cadence of the next handler run.
    pub fn cadence(&self) -> Cadence {
        if self.irq_ok() {
            Cadence::After(self.config.poll_interval())
        } else {
            Cadence::Poll
        }
    }

    fn rearm(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.timer.schedule(self.cadence());
    }

    /// The BMC flagged a response to the message we sent.
    fn check_completion(&self, window: &RegisterWindow) {
        if !Ctrl::from_bits_retain(window.read(Reg::HostCtrl)).contains(Ctrl::INT_STATUS) {
            return;
        }
        window.write(Reg::HostCtrl, Ctrl::INT_STATUS.bits());
        trace!("got a regular interrupt");

        let mut msg = match self.slot.take_for_completion() {
            Completion::Ready(msg) => msg,
            Completion::InProgress => {
                trace!("completion already being delivered");
                return;
            }
            Completion::Idle => {
                error!(critical = true, "completion signalled with no message in flight");
                self.metrics.record(MboxEvent::OrphanCompletion);
                return;
            }
        };
        codec::read_message(window, &mut msg);
        self.metrics.record(MboxEvent::Completed);
        self.deliver(msg);
        self.slot.release();
    }

    fn deliver(&self, msg: MboxMsg) {
        // Run the callback unlocked so it may send or re-register.
        let taken = self.callback.lock().take();
        let Some(mut callback) = taken else {
            error!("no callback registered for mailbox message");
            self.metrics.record(MboxEvent::MissingCallback);
            return;
        };
        callback(msg);

        let mut slot = self.callback.lock();
        if slot.is_none() {
            *slot = Some(callback);
        }
    }

    /// The BMC has something to tell us.
    fn check_attention(&self, window: &RegisterWindow) {
        if !Status::from_bits_retain(window.read(Reg::Status1)).contains(Status::ATTN) {
            return;
        }
        window.write(Reg::Status1, Status::ATTN.bits());

        let mut action = Action::from_bits_retain(window.read(Reg::Flag));
        trace!("got a status register interrupt with action 0x{:02x}", action.bits());

        if action.contains(Action::BMC_RESET) {
            // Recovery is left to the consumer; nothing in flight is failed out.
            warn!("BMC reset detected");
            self.metrics.record(MboxEvent::PeerReset);
            action.remove(Action::BMC_RESET);
        }

        if !action.is_empty() {
            error!("got a status bit set that we don't know about: 0x{:02x}", action.bits());
            self.metrics.record(MboxEvent::UnknownAttention);
        }
    }
}

impl InterruptSink for Mailbox {
    fn interrupt(&self) {
        self.metrics.record(MboxEvent::Interrupt);
        if !self.irq_ok.swap(true, Ordering::AcqRel) {
            info!("mailbox interrupts confirmed");
        }
        self.poll();
    }
}

fn init_hw(window: &RegisterWindow) -> InitResult<()> {
    // Disable all status interrupts except attentions.
    window.write(Reg::HostIntEn0, 0x00);
    window.write(Reg::HostIntEn1, Status::ATTN.bits());

    // Clean up host interrupt and status.
    window.write(Reg::HostCtrl, Ctrl::INT_STATUS.bits());

    // Keep the BMC control interrupt masked until needed.
    window.write(Reg::BmcCtrl, Ctrl::INT_MASK.bits());

    if !window.bus_ok() {
        return Err(InitError::HardwareSetupFailed("LPC bus not ok after setup"));
    }
    Ok(())
}
