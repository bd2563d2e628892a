use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use lpc_mbox::{Mailbox, MboxConfig, MboxMetricsSnapshot, MboxMsg, SendError, MBOX_DATA_REGS};
use mbox_sim::{default_nodes, SimBmc, SimLpc, SimRouter, ThreadTimer, SIM_BASE, SIM_IRQ};
use parking_lot::Mutex;

const POLL_TICK: Duration = Duration::from_micros(100);
const DEADLINE: Duration = Duration::from_secs(10);

struct Rig {
    lpc: Arc<SimLpc>,
    bmc: SimBmc,
    timer: Arc<ThreadTimer>,
    mbox: Arc<Mailbox>,
    responses: Receiver<MboxMsg>,
    stop: Arc<AtomicBool>,
    peer: Option<thread::JoinHandle<()>>,
    max_pings: Arc<AtomicU32>,
}

impl Rig {
    fn new(irq: bool) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();

        let lpc = Arc::new(SimLpc::new(SIM_BASE));
        let router = Arc::new(SimRouter::new());
        let timer = ThreadTimer::spawn(POLL_TICK);
        let config = MboxConfig {
            poll_interval_ms: 1,
            ..MboxConfig::default()
        };
        let mbox = Mailbox::new(lpc.clone(), timer.clone(), config);
        timer.attach(&mbox);
        mbox.init(&default_nodes(), router.as_ref()).expect("init");

        let (tx, responses) = crossbeam_channel::unbounded();
        mbox.register_callback(move |msg| {
            let _ = tx.send(msg);
        });

        let bmc = if irq {
            SimBmc::with_irq(lpc.clone(), router, SIM_IRQ)
        } else {
            SimBmc::new(lpc.clone())
        };
        let stop = Arc::new(AtomicBool::new(false));
        let max_pings = Arc::new(AtomicU32::new(0));
        let peer = {
            let bmc = bmc.clone();
            let stop = Arc::clone(&stop);
            let max_pings = Arc::clone(&max_pings);
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    max_pings.fetch_max(bmc.lpc().pending_pings(), Ordering::Relaxed);
                    if !bmc.serve_one(echo) {
                        thread::sleep(Duration::from_micros(20));
                    }
                }
            })
        };

        Self {
            lpc,
            bmc,
            timer,
            mbox,
            responses,
            stop,
            peer: Some(peer),
            max_pings,
        }
    }

    fn exchange(&self, request: MboxMsg) -> MboxMsg {
        send_with_retry(&self.mbox, request);
        self.responses
            .recv_timeout(DEADLINE)
            .expect("response within deadline")
    }

    fn wait_for(&self, what: &str, cond: impl Fn(&MboxMetricsSnapshot) -> bool) {
        let deadline = Instant::now() + DEADLINE;
        while !cond(&self.mbox.metrics()) {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_micros(200));
        }
    }

    fn stop_peer(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(peer) = self.peer.take() {
            peer.join().unwrap();
        }
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        self.stop_peer();
        self.mbox.shutdown();
        self.timer.stop();
    }
}

fn echo(request: MboxMsg) -> MboxMsg {
    let mut response = request;
    for byte in response.as_bytes_mut().iter_mut() {
        *byte = byte.rotate_left(3) ^ 0xa5;
    }
    response
}

fn request(n: u32) -> MboxMsg {
    let seed = n.to_le_bytes();
    MboxMsg::from_bytes(core::array::from_fn(|i| seed[i % 4].wrapping_add(i as u8)))
}

fn send_with_retry(mbox: &Mailbox, mut msg: MboxMsg) {
    let deadline = Instant::now() + DEADLINE;
    loop {
        match mbox.send(msg) {
            Ok(()) => return,
            Err(SendError::Busy(back)) => {
                assert!(Instant::now() < deadline, "slot never freed");
                msg = back;
                thread::yield_now();
            }
            Err(other) => panic!("send failed: {other}"),
        }
    }
}

#[test]
fn poll_mode_round_trips() {
    const EXCHANGES: u32 = 200;
    let rig = Rig::new(false);

    for n in 0..EXCHANGES {
        let req = request(n);
        assert_eq!(rig.exchange(req.clone()), echo(req), "exchange {n}");
    }

    let metrics = rig.mbox.metrics();
    assert!(!rig.mbox.irq_ok());
    assert_eq!(metrics.sent, EXCHANGES);
    assert_eq!(metrics.completed, EXCHANGES);
    assert_eq!(metrics.orphan_completions, 0);
    assert_eq!(metrics.interrupts, 0);
    assert!(rig.max_pings.load(Ordering::Relaxed) <= 1);
}

#[test]
fn irq_mode_round_trips() {
    const EXCHANGES: u32 = 200;
    let rig = Rig::new(true);

    for n in 0..EXCHANGES {
        let req = request(n);
        assert_eq!(rig.exchange(req.clone()), echo(req), "exchange {n}");
    }

    let metrics = rig.mbox.metrics();
    assert!(rig.mbox.irq_ok());
    assert_eq!(metrics.completed, EXCHANGES);
    assert!(metrics.interrupts >= EXCHANGES);
    assert_eq!(metrics.orphan_completions, 0);
}

#[test]
fn resets_do_not_disturb_exchanges() {
    const EXCHANGES: u32 = 60;
    let rig = Rig::new(false);

    let mut raised = 0;
    for n in 0..EXCHANGES {
        let req = request(n);
        assert_eq!(rig.exchange(req.clone()), echo(req));
        if n % 10 == 9 {
            rig.bmc.reset();
            raised += 1;
            rig.wait_for("reset to be noticed", |m| m.peer_resets == raised);
        }
    }

    let metrics = rig.mbox.metrics();
    assert_eq!(metrics.completed, EXCHANGES);
    assert_eq!(metrics.unknown_attention, 0);
}

#[test]
fn attention_is_noticed_while_idle() {
    let rig = Rig::new(false);
    rig.exchange(request(1));

    // The handler keeps re-arming after the last completion.
    rig.bmc.raise_attention(0x04);
    rig.wait_for("unknown attention", |m| m.unknown_attention == 1);
    assert_eq!(rig.mbox.metrics().peer_resets, 0);
    assert!(rig.responses.try_recv().is_err(), "no spurious callback");
}

#[test]
fn concurrent_senders_share_one_slot() {
    const SENDERS: u32 = 4;
    const PER_SENDER: u32 = 40;
    let rig = Rig::new(true);
    let sent = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..SENDERS)
        .map(|id| {
            let mbox = Arc::clone(&rig.mbox);
            let sent = Arc::clone(&sent);
            thread::spawn(move || {
                for n in 0..PER_SENDER {
                    let req = request(id * 1000 + n);
                    send_with_retry(&mbox, req.clone());
                    sent.lock().push(req);
                }
            })
        })
        .collect();

    let mut delivered = Vec::new();
    while delivered.len() < (SENDERS * PER_SENDER) as usize {
        delivered.push(
            rig.responses
                .recv_timeout(DEADLINE)
                .expect("response within deadline"),
        );
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let mut expected: Vec<[u8; MBOX_DATA_REGS]> =
        sent.lock().iter().cloned().map(|m| *echo(m).as_bytes()).collect();
    let mut got: Vec<[u8; MBOX_DATA_REGS]> = delivered.iter().map(|m| *m.as_bytes()).collect();
    expected.sort_unstable();
    got.sort_unstable();
    assert_eq!(got, expected);
    assert!(rig.max_pings.load(Ordering::Relaxed) <= 1, "two requests were in flight");
    assert!(rig.mbox.metrics().busy > 0);
}

#[test]
fn shutdown_returns_unanswered_message() {
    let mut rig = Rig::new(false);
    rig.stop_peer();

    rig.mbox.send(request(7)).expect("send");
    assert_eq!(rig.mbox.shutdown(), Some(request(7)));

    // A handler already running may schedule once more; its expiry is a no-op.
    let deadline = Instant::now() + DEADLINE;
    while rig.timer.is_armed() {
        assert!(Instant::now() < deadline, "timer kept re-arming after shutdown");
        thread::sleep(Duration::from_millis(1));
    }

    let writes = rig.lpc.writes().len();
    thread::sleep(Duration::from_millis(5));
    assert_eq!(rig.lpc.writes().len(), writes, "no handler runs after shutdown");
    assert!(matches!(rig.mbox.send(request(8)), Err(SendError::Closed(_))));
}
