//! The timer-driven replay engine.
//!
//! [`ReplayEngine`] follows the tracer's log, keeps the tracer's selected
//! entry in sync with its cursor, and drives a recurring tokio timer while
//! replaying. Every transition cancels the running timer before computing
//! the new cursor, so two timers never coexist and a stale timer never
//! fires after the log was cleared.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use hooktrace_core::{LogEntries, ReplayConfig, ReplayDelay};
use hooktrace_observe::{SharedTracer, SubscriptionId};
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info};

use crate::delay::{DelayPreference, KeyValueStore};
use crate::machine::{Direction, LogChange, ReplayMachine, ReplayState};

struct EngineInner {
    tracer: SharedTracer,
    runtime: Handle,
    machine: Mutex<ReplayMachine>,
    delay: RwLock<ReplayDelay>,
    preference: DelayPreference,
    timer: Mutex<Option<JoinHandle<()>>>,
    generation: AtomicU64,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl EngineInner {
    /// Apply a transition and push a changed cursor to the tracer.
    fn apply<R>(&self, transition: impl FnOnce(&mut ReplayMachine) -> R) -> R {
        let (result, before, after, state) = {
            let mut machine = self.machine.lock();
            let before = machine.selected();
            let result = transition(&mut machine);
            (result, before, machine.selected(), machine.state())
        };

        if before != after {
            self.tracer.select_entry(after);
        }
        debug!(state = %state, selected = ?after, "Replay transition");
        result
    }

    /// Bump the timer generation and abort the running timer.
    ///
    /// The generation only changes while the timer slot is locked.
    fn cancel_timer(&self) {
        let mut timer = self.timer.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = timer.take() {
            handle.abort();
            debug!("Replay timer cancelled");
        }
    }

    fn start_timer(self: &Arc<Self>) {
        let period = self.delay.read().as_duration();
        let engine = Arc::downgrade(self);

        let mut timer = self.timer.lock();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let handle = self.runtime.spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            loop {
                ticks.tick().await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                if !engine.tick(generation) {
                    break;
                }
            }
        });

        *timer = Some(handle);
        drop(timer);
        debug!(?period, generation, "Replay timer started");
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Step once for the timer of `generation`.
    ///
    /// Returns false when that timer should stop, either because it was
    /// replaced or because the replay reached the newest entry.
    fn tick(&self, generation: u64) -> bool {
        let stepped = self.apply(|machine| self.is_current(generation).then(|| machine.tick()));
        match stepped {
            None => false,
            Some(true) => true,
            Some(false) => {
                let mut timer = self.timer.lock();
                if self.is_current(generation) {
                    timer.take();
                    debug!("Replay reached the newest entry");
                }
                false
            }
        }
    }

    fn on_log(self: &Arc<Self>, log: &LogEntries) {
        match self.apply(|machine| machine.log_changed(log.len())) {
            LogChange::Followed => self.start_timer(),
            LogChange::Shrunk => self.cancel_timer(),
            LogChange::Grew | LogChange::Unchanged => {}
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.cancel_timer();
        if let Some(id) = self.subscription.lock().take() {
            self.tracer.unsubscribe_log_entries(id);
        }
        self.tracer.unregister_log_viewer();
    }
}

/// Navigable view over the tracer's log.
///
/// The engine registers itself as the tracer's log viewer. New entries
/// replay themselves unless a replay is already running.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use hooktrace_core::{ReplayConfig, TracerConfig};
/// use hooktrace_observe::{TaskQueue, Tracer};
/// use hooktrace_replay::{MemoryStore, ReplayEngine};
///
/// # async fn run() {
/// let queue = TaskQueue::new();
/// let tracer = Tracer::new(TracerConfig::default(), queue.clone()).into_shared();
/// let engine = ReplayEngine::new(
///     tracer,
///     ReplayConfig::default(),
///     Arc::new(MemoryStore::new()),
///     tokio::runtime::Handle::current(),
/// );
///
/// engine.start_replay();
/// # }
/// ```
pub struct ReplayEngine {
    inner: Arc<EngineInner>,
}

impl ReplayEngine {
    /// Create an engine following `tracer`.
    ///
    /// The stored delay preference takes precedence over `config.delay`.
    /// Timers are spawned on `runtime`.
    pub fn new(
        tracer: SharedTracer,
        config: ReplayConfig,
        store: Arc<dyn KeyValueStore>,
        runtime: Handle,
    ) -> Self {
        let preference = DelayPreference::new(store);
        let delay = preference.load(config.delay);

        let inner = Arc::new(EngineInner {
            tracer: Arc::clone(&tracer),
            runtime,
            machine: Mutex::new(ReplayMachine::new()),
            delay: RwLock::new(delay),
            preference,
            timer: Mutex::new(None),
            generation: AtomicU64::new(0),
            subscription: Mutex::new(None),
        });

        tracer.register_log_viewer();

        let weak: Weak<EngineInner> = Arc::downgrade(&inner);
        let id = tracer.subscribe_log_entries(move |log| {
            if let Some(engine) = weak.upgrade() {
                engine.on_log(log);
            }
        });
        *inner.subscription.lock() = Some(id);

        info!(tracer = %tracer.id(), delay = %delay, "Replay engine attached");
        Self { inner }
    }

    /// Current state.
    pub fn state(&self) -> ReplayState {
        self.inner.machine.lock().state()
    }

    /// Selected index.
    pub fn selected_index(&self) -> Option<usize> {
        self.inner.machine.lock().selected()
    }

    /// Snapshot of the log being replayed.
    pub fn log(&self) -> LogEntries {
        self.inner.tracer.log_entries()
    }

    /// Select an entry and pause.
    pub fn set_highlighted(&self, index: usize) {
        self.inner.cancel_timer();
        self.inner.apply(|machine| machine.set_highlighted(index));
    }

    /// Move the selection one entry and pause.
    pub fn step(&self, direction: Direction) {
        self.inner.cancel_timer();
        self.inner.apply(|machine| machine.step(direction));
    }

    /// Step forward and keep stepping on every timer tick.
    pub fn start_replay(&self) {
        self.inner.cancel_timer();
        if self.inner.apply(ReplayMachine::start_replay) {
            self.inner.start_timer();
            info!(selected = ?self.selected_index(), "Replay started");
        }
    }

    /// Stop replaying.
    pub fn stop_replay(&self) {
        self.inner.cancel_timer();
        self.inner.apply(ReplayMachine::stop_replay);
    }

    /// Clear the tracer's log and return to idle.
    pub fn clear_log(&self) {
        self.inner.cancel_timer();
        self.inner.apply(ReplayMachine::clear);
        self.inner.tracer.clear_log();
    }

    /// Current replay delay.
    pub fn delay(&self) -> ReplayDelay {
        *self.inner.delay.read()
    }

    /// Change and persist the replay delay.
    ///
    /// A running replay restarts its timer with the new period.
    pub fn set_delay(&self, delay: ReplayDelay) {
        *self.inner.delay.write() = delay;
        self.inner.preference.save(delay);
        if self.inner.machine.lock().is_replaying() {
            self.inner.start_timer();
        }
        info!(delay = %delay, "Replay delay changed");
    }

    /// Whether a backward step would move.
    pub fn can_step_back(&self) -> bool {
        self.inner.machine.lock().can_step_back()
    }

    /// Whether a forward step would move.
    pub fn can_step_forward(&self) -> bool {
        self.inner.machine.lock().can_step_forward()
    }

    /// Whether starting a replay is offered.
    pub fn can_start_replay(&self) -> bool {
        self.inner.machine.lock().can_start_replay()
    }

    /// Whether clearing the log is offered.
    pub fn can_clear(&self) -> bool {
        self.inner.machine.lock().can_clear()
    }
}

impl std::fmt::Debug for ReplayEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let machine = self.inner.machine.lock();
        f.debug_struct("ReplayEngine")
            .field("state", &machine.state())
            .field("selected", &machine.selected())
            .field("len", &machine.len())
            .field("delay", &*self.inner.delay.read())
            .finish()
    }
}
