//! Background simulation engine with lifecycle management
//!
//! `SimulationEngine` owns one worker thread that advances a
//! [`SimulationModel`] on a fixed-timestep clock and publishes each completed
//! frame through a lock-free pointer swap. Readers call
//! [`latest_snapshot`](SimulationEngine::latest_snapshot) from any thread
//! without ever blocking the worker.
//!
//! The worker is the only code that touches the model once started. Anything
//! else that needs to change the model goes through [`submit`], which queues a
//! closure applied on the worker at the next iteration boundary.
//!
//! [`submit`]: SimulationEngine::submit

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use crossfire::{mpmc, MRx, MTx, TryRecvError, TrySendError};
use kernel::{SimulationModel, Snapshot};

use crate::clock::TickClock;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::state::{EngineState, StateCell};

/// Longest the worker sleeps while paused before re-checking its state.
const PAUSED_WAIT: Duration = Duration::from_millis(50);

/// Log progress every this many completed updates.
const PROGRESS_EVERY: u64 = 1000;

/// A queued change to the model, applied on the worker thread.
pub type Command<M> = Box<dyn FnOnce(&mut M) -> kernel::Result<()> + Send>;

/// Counters maintained by the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Completed `update()` calls
    pub steps: u64,
    /// Snapshots published
    pub published: u64,
    /// Ticks discarded by the overload policy
    pub dropped_ticks: u64,
}

/// State shared between the control surface and the worker.
struct Shared<E> {
    state: StateCell,
    cancelled: AtomicBool,
    latest: ArcSwapOption<Snapshot<E>>,
    last_fault: ArcSwapOption<kernel::Error>,
    worker: OnceLock<Thread>,
    steps: AtomicU64,
    published: AtomicU64,
    dropped_ticks: AtomicU64,
}

impl<E> Shared<E> {
    fn wake(&self) {
        if let Some(worker) = self.worker.get() {
            worker.unpark();
        }
    }

    fn publish(&self, snapshot: Snapshot<E>) {
        self.latest.store(Some(Arc::new(snapshot)));
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    fn fail(&self, fault: kernel::Error) {
        tracing::error!(%fault, "model fault; engine failed");
        self.last_fault.store(Some(Arc::new(fault)));
        if let Err(state) = self.state.terminate(EngineState::Failed) {
            tracing::debug!(%state, "fault recorded after engine already terminated");
        }
    }
}

/// Model ownership: before start, while the worker runs, and after join.
enum WorkerSlot<M> {
    Idle(M, MRx<Command<M>>),
    Running(JoinHandle<M>),
    Joined,
}

/// Handle for controlling and querying a model running in the background.
///
/// All lifecycle requests are fire-and-forget and safe to call from any
/// thread. Dropping the engine stops the worker and waits for it.
pub struct SimulationEngine<M: SimulationModel> {
    shared: Arc<Shared<M::Entity>>,
    config: EngineConfig,
    commands: MTx<Command<M>>,
    slot: Mutex<WorkerSlot<M>>,
}

impl<M: SimulationModel> SimulationEngine<M> {
    /// Wrap `model` in an IDLE engine. No thread is spawned until `start()`.
    pub fn new(model: M, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let (commands, receiver) = mpmc::bounded_blocking(config.command_capacity);
        let shared = Arc::new(Shared {
            state: StateCell::new(EngineState::Idle),
            cancelled: AtomicBool::new(false),
            latest: ArcSwapOption::empty(),
            last_fault: ArcSwapOption::empty(),
            worker: OnceLock::new(),
            steps: AtomicU64::new(0),
            published: AtomicU64::new(0),
            dropped_ticks: AtomicU64::new(0),
        });
        Ok(Self {
            shared,
            config,
            commands,
            slot: Mutex::new(WorkerSlot::Idle(model, receiver)),
        })
    }

    fn slot(&self) -> MutexGuard<'_, WorkerSlot<M>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -----------------------------------------------------------------------
    // Lifecycle requests
    // -----------------------------------------------------------------------

    /// IDLE -> RUNNING: spawn the worker. No effect once started or terminated.
    pub fn start(&self) {
        let mut slot = self.slot();
        if !self.shared.state.transition(EngineState::Idle, EngineState::Running) {
            return;
        }
        let (model, receiver) = match std::mem::replace(&mut *slot, WorkerSlot::Joined) {
            WorkerSlot::Idle(model, receiver) => (model, receiver),
            other => {
                *slot = other;
                return;
            }
        };

        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let name = format!("sim-{}", model.name());
        let spawned = thread::Builder::new()
            .name(name)
            .spawn(move || run_worker(model, receiver, shared, config));
        match spawned {
            Ok(handle) => {
                let _ = self.shared.worker.set(handle.thread().clone());
                *slot = WorkerSlot::Running(handle);
                tracing::debug!("engine started");
            }
            Err(e) => {
                // The closure and the model it owned are gone with the failed spawn.
                self.shared
                    .fail(kernel::Error::Fault(format!("failed to spawn worker: {e}")));
            }
        }
    }

    /// PAUSED -> RUNNING, or start an IDLE engine.
    pub fn request_run(&self) {
        if self.shared.state.load() == EngineState::Idle {
            self.start();
        } else {
            self.request_resume();
        }
    }

    /// PAUSED -> RUNNING. Starts an engine that was never started.
    pub fn request_resume(&self) {
        if self.shared.state.load() == EngineState::Idle {
            self.start();
            return;
        }
        if self.shared.state.transition(EngineState::Paused, EngineState::Running) {
            tracing::debug!("engine resumed");
            self.shared.wake();
        }
    }

    /// RUNNING -> PAUSED. Repeated calls have no further effect.
    pub fn request_pause(&self) {
        if self.shared.state.transition(EngineState::Running, EngineState::Paused) {
            tracing::debug!("engine paused");
            self.shared.wake();
        }
    }

    /// Any live state -> STOPPED. Commands already queued are still applied
    /// before the worker exits.
    pub fn request_stop(&self) {
        if let Ok(previous) = self.shared.state.terminate(EngineState::Stopped) {
            tracing::debug!(%previous, "engine stop requested");
            self.shared.wake();
        }
    }

    /// Stop and discard every queued, not yet applied command.
    pub fn request_cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
        self.request_stop();
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Queue a change to the model, applied on the worker at the next
    /// iteration boundary (or on start if the engine is still IDLE).
    ///
    /// A command returning an error is logged and skipped; it does not fail
    /// the engine.
    pub fn submit<F>(&self, command: F) -> Result<()>
    where
        F: FnOnce(&mut M) -> kernel::Result<()> + Send + 'static,
    {
        if self.shared.state.load().is_terminal() {
            return Err(Error::CommandQueueClosed);
        }
        match self.commands.try_send(Box::new(command)) {
            Ok(()) => {
                self.shared.wake();
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(Error::CommandQueueFull),
            Err(TrySendError::Disconnected(_)) => Err(Error::CommandQueueClosed),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Most recently published snapshot; `None` before the first publish.
    pub fn latest_snapshot(&self) -> Option<Arc<Snapshot<M::Entity>>> {
        self.shared.latest.load_full()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.shared.state.load()
    }

    /// The fault that moved the engine to FAILED, if any.
    pub fn last_fault(&self) -> Option<kernel::Error> {
        self.shared.last_fault.load_full().map(|f| (*f).clone())
    }

    /// Worker counters.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            steps: self.shared.steps.load(Ordering::Relaxed),
            published: self.shared.published.load(Ordering::Relaxed),
            dropped_ticks: self.shared.dropped_ticks.load(Ordering::Relaxed),
        }
    }

    /// Scheduling configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Wait for the worker and take the model back.
    ///
    /// An IDLE engine hands its model back directly, with any queued commands
    /// applied, and moves to STOPPED. A live engine returns
    /// `Error::NotTerminated` and keeps running; request a stop first.
    pub fn join(&self) -> Result<M> {
        let mut slot = self.slot();
        let state = self.shared.state.load();
        match &*slot {
            WorkerSlot::Running(_) if !state.is_terminal() => {
                return Err(Error::NotTerminated(state));
            }
            WorkerSlot::Joined => return Err(Error::AlreadyJoined),
            _ => {}
        }
        match std::mem::replace(&mut *slot, WorkerSlot::Joined) {
            WorkerSlot::Idle(mut model, receiver) => {
                self.request_stop();
                if !self.shared.cancelled.load(Ordering::Acquire) {
                    drain_commands(&mut model, &receiver, &self.shared);
                }
                Ok(model)
            }
            WorkerSlot::Running(handle) => handle.join().map_err(|_| Error::WorkerPanicked),
            WorkerSlot::Joined => Err(Error::AlreadyJoined),
        }
    }
}

impl<M: SimulationModel> Drop for SimulationEngine<M> {
    fn drop(&mut self) {
        self.request_stop();
        let slot = std::mem::replace(&mut *self.slot(), WorkerSlot::Joined);
        if let WorkerSlot::Running(handle) = slot {
            if handle.join().is_err() {
                tracing::warn!("engine worker panicked during shutdown");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run one model call, converting a panic into a fault.
fn guarded<T>(f: impl FnOnce() -> kernel::Result<T>) -> kernel::Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(kernel::Error::Fault(format!(
            "panicked: {}",
            panic_message(payload)
        ))),
    }
}

/// Apply every queued command and return how many succeeded. A panicking
/// command fails the engine and stops the drain.
fn drain_commands<M: SimulationModel>(
    model: &mut M,
    receiver: &MRx<Command<M>>,
    shared: &Shared<M::Entity>,
) -> usize {
    let mut applied = 0;
    loop {
        let command = match receiver.try_recv() {
            Ok(command) => command,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return applied,
        };
        match panic::catch_unwind(AssertUnwindSafe(|| command(model))) {
            Ok(Ok(())) => applied += 1,
            Ok(Err(e)) => tracing::warn!(error = %e, "model command rejected"),
            Err(payload) => {
                shared.fail(kernel::Error::Fault(format!(
                    "command panicked: {}",
                    panic_message(payload)
                )));
                return applied;
            }
        }
    }
}

fn discard_commands<M: SimulationModel>(receiver: &MRx<Command<M>>) -> usize {
    let mut discarded = 0;
    while receiver.try_recv().is_ok() {
        discarded += 1;
    }
    discarded
}

/// Main loop executed in the background thread.
fn run_worker<M: SimulationModel>(
    mut model: M,
    receiver: MRx<Command<M>>,
    shared: Arc<Shared<M::Entity>>,
    config: EngineConfig,
) -> M {
    let start_wall_time = Instant::now();
    let mut clock = TickClock::new(
        config.tick_duration(),
        config.max_catch_up,
        config.overload_policy,
        start_wall_time,
    );
    tracing::info!(
        model = model.name(),
        tick_rate_hz = config.tick_rate_hz,
        max_catch_up = ?config.max_catch_up,
        policy = ?config.overload_policy,
        "simulation thread started"
    );

    drain_commands(&mut model, &receiver, &shared);
    shared.publish(model.snapshot());

    let mut was_paused = false;
    loop {
        if shared.state.load().is_terminal() {
            break;
        }
        let applied = drain_commands(&mut model, &receiver, &shared);

        match shared.state.load() {
            EngineState::Running => {
                if was_paused {
                    clock.rebase(Instant::now());
                    was_paused = false;
                }
                let plan = clock.plan(Instant::now());
                if plan.dropped > 0 {
                    shared.dropped_ticks.fetch_add(plan.dropped, Ordering::Relaxed);
                    tracing::warn!(
                        dropped = plan.dropped,
                        policy = ?config.overload_policy,
                        "engine overloaded; backlog dropped"
                    );
                }

                let mut ran = 0u64;
                for _ in 0..plan.steps {
                    if let Err(fault) = guarded(|| model.update()) {
                        shared.fail(fault);
                        break;
                    }
                    ran += 1;
                    if shared.state.load() != EngineState::Running {
                        break;
                    }
                }

                if ran > 0 {
                    let before = shared.steps.fetch_add(ran, Ordering::Relaxed);
                    let after = before + ran;
                    if before / PROGRESS_EVERY != after / PROGRESS_EVERY {
                        let snap = model.snapshot();
                        tracing::debug!(
                            steps = after,
                            sim_time = snap.time(),
                            metric = snap.metric(),
                            wall_time = start_wall_time.elapsed().as_secs_f64(),
                            "simulation progress"
                        );
                    }
                }
                if ran > 0 || applied > 0 {
                    shared.publish(model.snapshot());
                }
                if shared.state.load() == EngineState::Running {
                    thread::park_timeout(clock.until_next(Instant::now()));
                }
            }
            EngineState::Paused => {
                was_paused = true;
                if applied > 0 {
                    shared.publish(model.snapshot());
                }
                thread::park_timeout(PAUSED_WAIT);
            }
            EngineState::Idle => thread::park_timeout(PAUSED_WAIT),
            EngineState::Stopped | EngineState::Failed => {}
        }
    }

    if shared.state.load() == EngineState::Stopped {
        if shared.cancelled.load(Ordering::Acquire) {
            let discarded = discard_commands(&receiver);
            if discarded > 0 {
                tracing::debug!(discarded, "cancel discarded queued commands");
            }
        } else if drain_commands(&mut model, &receiver, &shared) > 0 {
            shared.publish(model.snapshot());
        }
    }

    let snap = model.snapshot();
    tracing::info!(
        steps = shared.steps.load(Ordering::Relaxed),
        sim_time = snap.time(),
        state = %shared.state.load(),
        "simulation thread exiting"
    );
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::Entities;

    /// Counts updates; time advances by 1 per update.
    #[derive(Debug)]
    struct Counter {
        steps: u64,
        fail_at: Option<u64>,
        panic_at: Option<u64>,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                steps: 0,
                fail_at: None,
                panic_at: None,
            }
        }
    }

    impl SimulationModel for Counter {
        type Entity = ();

        fn update(&mut self) -> kernel::Result<()> {
            if self.panic_at == Some(self.steps + 1) {
                panic!("counter exploded");
            }
            if self.fail_at == Some(self.steps + 1) {
                return Err(kernel::Error::Fault("counter overflow".into()));
            }
            self.steps += 1;
            Ok(())
        }

        fn snapshot(&self) -> Snapshot<()> {
            Snapshot::new(
                Arc::new(Vec::new()),
                Entities::Omitted,
                self.steps as f64,
                0.0,
                0,
                self.steps,
            )
        }
    }

    fn fast() -> EngineConfig {
        EngineConfig {
            tick_rate_hz: 1000.0,
            ..EngineConfig::default()
        }
    }

    fn wait_for(engine: &SimulationEngine<Counter>, state: EngineState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.state() != state && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(engine.state(), state);
    }

    #[test]
    fn test_engine_lifecycle() {
        let engine = SimulationEngine::new(Counter::new(), fast()).unwrap();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.latest_snapshot().is_none());

        engine.start();
        engine.start();
        assert_eq!(engine.state(), EngineState::Running);

        thread::sleep(Duration::from_millis(50));
        engine.request_stop();
        assert_eq!(engine.state(), EngineState::Stopped);
        engine.request_run();
        assert_eq!(engine.state(), EngineState::Stopped);

        let model = engine.join().unwrap();
        assert!(model.steps > 0);
    }

    #[test]
    fn test_engine_pause_resume() {
        let engine = SimulationEngine::new(Counter::new(), fast()).unwrap();
        engine.request_run();
        thread::sleep(Duration::from_millis(30));

        engine.request_pause();
        engine.request_pause();
        assert_eq!(engine.state(), EngineState::Paused);
        thread::sleep(Duration::from_millis(20));

        let paused_at = engine.latest_snapshot().unwrap().time();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(engine.latest_snapshot().unwrap().time(), paused_at);

        engine.request_resume();
        assert_eq!(engine.state(), EngineState::Running);
        thread::sleep(Duration::from_millis(30));
        assert!(engine.latest_snapshot().unwrap().time() > paused_at);
    }

    #[test]
    fn test_fault_moves_to_failed() {
        let mut model = Counter::new();
        model.fail_at = Some(5);
        let engine = SimulationEngine::new(model, fast()).unwrap();
        engine.start();
        wait_for(&engine, EngineState::Failed);

        assert_eq!(
            engine.last_fault(),
            Some(kernel::Error::Fault("counter overflow".into()))
        );
        // Last good frame stays published.
        assert_eq!(engine.latest_snapshot().unwrap().time(), 4.0);
        engine.request_resume();
        assert_eq!(engine.state(), EngineState::Failed);
        assert!(matches!(engine.submit(|_| Ok(())), Err(Error::CommandQueueClosed)));
        assert_eq!(engine.join().unwrap().steps, 4);
    }

    #[test]
    fn test_panic_is_contained() {
        let mut model = Counter::new();
        model.panic_at = Some(3);
        let engine = SimulationEngine::new(model, fast()).unwrap();
        engine.start();
        wait_for(&engine, EngineState::Failed);
        let fault = engine.last_fault().unwrap().to_string();
        assert!(fault.contains("counter exploded"), "fault was {fault}");
        assert!(engine.join().is_ok());
    }

    #[test]
    fn test_join_live_engine_is_refused() {
        let engine = SimulationEngine::new(Counter::new(), fast()).unwrap();
        engine.start();
        let err = engine.join().unwrap_err();
        assert!(matches!(err, Error::NotTerminated(EngineState::Running)));

        // The refused join leaves the engine running with its model.
        assert_eq!(engine.state(), EngineState::Running);
        let seen = engine.stats().steps;
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.stats().steps <= seen && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(engine.stats().steps > seen);

        engine.request_stop();
        let model = engine.join().unwrap();
        assert!(model.steps > seen);
        assert!(matches!(engine.join(), Err(Error::AlreadyJoined)));
    }

    #[test]
    fn test_join_idle_engine_stops_it() {
        let engine = SimulationEngine::new(Counter::new(), fast()).unwrap();
        assert_eq!(engine.join().unwrap().steps, 0);
        assert_eq!(engine.state(), EngineState::Stopped);
        engine.start();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(matches!(engine.submit(|_| Ok(())), Err(Error::CommandQueueClosed)));
    }

    #[test]
    fn test_stop_before_start_returns_model() {
        let engine = SimulationEngine::new(Counter::new(), fast()).unwrap();
        engine.request_stop();
        engine.start();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(engine.latest_snapshot().is_none());
        assert_eq!(engine.join().unwrap().steps, 0);
    }

    #[test]
    fn test_panicking_command_fails_engine() {
        let engine = SimulationEngine::new(Counter::new(), fast()).unwrap();
        engine.start();
        engine.submit(|_| panic!("bad command")).unwrap();
        wait_for(&engine, EngineState::Failed);
        assert!(engine.last_fault().unwrap().to_string().contains("bad command"));
    }
}
