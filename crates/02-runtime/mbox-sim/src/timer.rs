use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use lpc_mbox::{Cadence, Mailbox, PollTimer};
use parking_lot::{Condvar, Mutex};

/// Timer that only records what was asked of it. Tests fire it by hand.
#[derive(Default)]
pub struct ManualTimer {
    armed: Mutex<Option<Cadence>>,
    history: Mutex<Vec<Cadence>>,
    cancels: Mutex<u32>,
}

impl ManualTimer {
    /// Creates an unarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current schedule, if armed.
    pub fn armed(&self) -> Option<Cadence> {
        *self.armed.lock()
    }

    /// Every schedule requested so far, oldest first.
    pub fn history(&self) -> Vec<Cadence> {
        self.history.lock().clone()
    }

    /// Number of `cancel` calls.
    pub fn cancels(&self) -> u32 {
        *self.cancels.lock()
    }

    /// Expires the timer if armed, running the handler. Returns whether it
    /// was armed.
    pub fn fire(&self, mbox: &Mailbox) -> bool {
        let armed = self.armed.lock().take();
        if armed.is_some() {
            mbox.poll();
        }
        armed.is_some()
    }
}

impl PollTimer for ManualTimer {
    fn schedule(&self, cadence: Cadence) {
        *self.armed.lock() = Some(cadence);
        self.history.lock().push(cadence);
    }

    fn cancel(&self) {
        *self.armed.lock() = None;
        *self.cancels.lock() += 1;
    }
}

#[derive(Default)]
struct TimerState {
    deadline: Option<Instant>,
    target: Option<Weak<Mailbox>>,
    stop: bool,
}

struct Shared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

/// Poll timer backed by a thread that runs the handler on expiry.
///
/// [`Cadence::Poll`] fires after `poll_tick`, standing in for the platform's
/// next poll.
pub struct ThreadTimer {
    shared: Arc<Shared>,
    poll_tick: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadTimer {
    /// Starts the timer thread.
    pub fn spawn(poll_tick: Duration) -> Arc<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(TimerState::default()),
            wake: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("mbox-timer".into())
            .spawn(move || run(&worker_shared))
            .ok();
        Arc::new(Self {
            shared,
            poll_tick,
            worker: Mutex::new(worker),
        })
    }

    /// Directs expiries at `mbox`.
    pub fn attach(&self, mbox: &Arc<Mailbox>) {
        self.shared.state.lock().target = Some(Arc::downgrade(mbox));
    }

    /// Whether an expiry is pending.
    pub fn is_armed(&self) -> bool {
        self.shared.state.lock().deadline.is_some()
    }

    /// Stops the thread. Pending expiries are dropped.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock();
            state.stop = true;
            state.deadline = None;
        }
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.lock().take() {
            // The last mailbox handle may be dropped on the timer thread itself.
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

impl PollTimer for ThreadTimer {
    fn schedule(&self, cadence: Cadence) {
        let delay = match cadence {
            Cadence::Poll => self.poll_tick,
            Cadence::After(delay) => delay,
        };
        self.shared.state.lock().deadline = Some(Instant::now() + delay);
        self.shared.wake.notify_all();
    }

    fn cancel(&self) {
        self.shared.state.lock().deadline = None;
        self.shared.wake.notify_all();
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        if state.stop {
            return;
        }
        match state.deadline {
            None => shared.wake.wait(&mut state),
            Some(deadline) if Instant::now() < deadline => {
                let _ = shared.wake.wait_until(&mut state, deadline);
            }
            Some(_) => {
                state.deadline = None;
                let target = state.target.as_ref().and_then(Weak::upgrade);
                drop(state);
                if let Some(mbox) = target {
                    mbox.poll();
                }
                state = shared.state.lock();
            }
        }
    }
}
