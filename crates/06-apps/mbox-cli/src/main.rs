//! Drives request/response exchanges over the mailbox against a simulated,
//! echoing BMC and reports the transport counters.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use lpc_mbox::{Mailbox, MboxConfig, MboxMsg};
use mbox_sim::{default_nodes, SimBmc, SimLpc, SimRouter, ThreadTimer, SIM_BASE, SIM_IRQ};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Exercise the LPC mailbox against a simulated BMC")]
struct Args {
    /// Number of request/response exchanges
    #[arg(long, default_value_t = 16)]
    exchanges: u32,

    /// JSON file with mailbox settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backstop sweep once interrupts are live (overrides the config file)
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Delay standing in for the platform's next poll
    #[arg(long, default_value_t = 200)]
    poll_tick_us: u64,

    /// Have the BMC raise the mailbox interrupt on every completion
    #[arg(long)]
    irq: bool,

    /// Announce a BMC reset after every N exchanges (0 = never)
    #[arg(long, default_value_t = 0)]
    reset_every: u32,

    /// Give up on a response after this many milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => MboxConfig::default(),
    };
    if let Some(ms) = args.poll_interval_ms {
        config.poll_interval_ms = ms;
    }

    let lpc = Arc::new(SimLpc::new(SIM_BASE));
    let router = Arc::new(SimRouter::new());
    let timer = ThreadTimer::spawn(Duration::from_micros(args.poll_tick_us));
    let mbox = Mailbox::new(lpc.clone(), timer.clone(), config);
    timer.attach(&mbox);

    let channel = mbox
        .init(&default_nodes(), router.as_ref())
        .context("mailbox init failed")?;
    info!(
        poll_interval = ?mbox.config().poll_interval(),
        "mailbox at IO 0x{:x}, IRQ {} (registered: {})",
        channel.base,
        channel.irq,
        channel.irq_registered
    );

    let (tx, rx) = crossbeam_channel::bounded(1);
    mbox.register_callback(move |msg| {
        // Nobody is waiting once an exchange has timed out.
        let _ = tx.try_send(msg);
    });

    let bmc = if args.irq {
        SimBmc::with_irq(lpc, Arc::clone(&router), SIM_IRQ)
    } else {
        SimBmc::new(lpc)
    };
    let stop = Arc::new(AtomicBool::new(false));
    let peer = spawn_echo_bmc(bmc.clone(), Arc::clone(&stop));

    let timeout = Duration::from_millis(args.timeout_ms);
    let outcome = (0..args.exchanges).try_for_each(|n| {
        let request =
            MboxMsg::from_bytes(std::array::from_fn(|i| (n as u8).wrapping_add(i as u8)));
        send_with_retry(&mbox, request.clone())?;

        let response = match rx.recv_timeout(timeout) {
            Ok(response) => response,
            Err(RecvTimeoutError::Timeout) => bail!("exchange {n}: no response within {timeout:?}"),
            Err(RecvTimeoutError::Disconnected) => bail!("exchange {n}: callback dropped"),
        };
        if response != echo(request) {
            bail!("exchange {n}: unexpected response {:02x?}", response.as_bytes());
        }

        if args.reset_every > 0 && (n + 1) % args.reset_every == 0 {
            bmc.reset();
        }
        Ok(())
    });

    stop.store(true, Ordering::Release);
    let _ = peer.join();
    if let Some(abandoned) = mbox.shutdown() {
        warn!("abandoned in-flight message {:02x?}", abandoned.as_bytes());
    }
    timer.stop();

    let metrics = mbox.metrics();
    println!("irq confirmed: {}", mbox.irq_ok());
    println!("{metrics:#?}");
    outcome
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore error if already set.
    let _ = fmt().with_env_filter(env_filter).try_init();
}

fn load_config(path: &Path) -> Result<MboxConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

fn send_with_retry(mbox: &Mailbox, mut msg: MboxMsg) -> Result<()> {
    loop {
        match mbox.send(msg) {
            Ok(()) => return Ok(()),
            Err(err) if err.is_retryable() => {
                msg = err.into_message();
                thread::yield_now();
            }
            Err(err) => return Err(err).context("mailbox send failed"),
        }
    }
}

fn echo(request: MboxMsg) -> MboxMsg {
    let mut response = request;
    for byte in response.as_bytes_mut().iter_mut() {
        *byte = !*byte;
    }
    response
}

fn spawn_echo_bmc(bmc: SimBmc, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Acquire) {
            if !bmc.serve_one(echo) {
                thread::sleep(Duration::from_micros(50));
            }
        }
    })
}
