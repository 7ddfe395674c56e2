use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::display::{format_elapsed, ZERO_DISPLAY};
use crate::error::TimerError;
use crate::tick::{IntervalTicks, TickScheduler};
use crate::time_source::{MonotonicTimeSource, TimeSource};

/// Whether the stopwatch is counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

impl RunState {
    pub fn is_running(self) -> bool {
        matches!(self, RunState::Running)
    }
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub run_state: RunState,
    pub elapsed_millis: u64,
    pub display: String,
}

struct EngineState {
    run_state: RunState,
    elapsed_millis: u64,
    /// `now - start_reference == elapsed_millis` while running. Signed so a
    /// time source that reads below the accumulated total still resumes
    /// from the right value.
    start_reference: i64,
    /// Bumped on every run-state transition; a loop only publishes while its
    /// own generation is current.
    generation: u64,
    /// Bumped on every mutation that observers should see.
    publish_seq: u64,
    update_loop: Option<JoinHandle<()>>,
}

impl EngineState {
    /// Captures the observable values after a mutation.
    fn publication(&mut self) -> Publication {
        self.publish_seq += 1;
        Publication {
            seq: self.publish_seq,
            run_state: self.run_state,
            elapsed_millis: self.elapsed_millis,
        }
    }
}

/// Observable values taken under the state lock and sent after it is
/// released.
#[must_use]
struct Publication {
    seq: u64,
    run_state: RunState,
    elapsed_millis: u64,
}

/// A `watch` sender that drops publications older than the newest one it
/// has applied.
struct Outbox<T> {
    tx: watch::Sender<T>,
    last_seq: AtomicU64,
}

impl<T: PartialEq> Outbox<T> {
    fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            tx,
            last_seq: AtomicU64::new(0),
        }
    }

    /// Replaces the value and notifies receivers if `seq` is newer than
    /// anything sent so far and the value actually changed.
    fn send(&self, seq: u64, value: T) -> bool {
        // The closure runs under the channel's write lock, which serializes
        // the sequence check.
        self.tx.send_if_modified(|current| {
            if seq <= self.last_seq.load(Ordering::Relaxed) {
                return false;
            }
            self.last_seq.store(seq, Ordering::Relaxed);
            if *current == value {
                return false;
            }
            *current = value;
            true
        })
    }

    fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

struct EngineShared {
    time: Arc<dyn TimeSource>,
    ticks: Arc<dyn TickScheduler>,
    runtime: Handle,
    state: Mutex<EngineState>,
    run_state_out: Outbox<RunState>,
    elapsed_out: Outbox<u64>,
    display_out: Outbox<String>,
}

impl EngineShared {
    fn now(&self) -> i64 {
        self.time.now_millis() as i64
    }

    /// Sends a publication to observers. Must be called without the state
    /// lock held: a receiver holding `borrow()` blocks the send.
    fn publish(&self, publication: Publication) {
        let Publication {
            seq,
            run_state,
            elapsed_millis,
        } = publication;
        self.elapsed_out.send(seq, elapsed_millis);
        self.display_out.send(seq, format_elapsed(elapsed_millis));
        self.run_state_out.send(seq, run_state);
    }

    /// One step of the update loop. Returns `false` once `generation` has
    /// been superseded, which ends the loop.
    fn refresh(&self, generation: u64) -> bool {
        let publication = {
            let mut state = self.state.lock();
            if state.generation != generation || !state.run_state.is_running() {
                return false;
            }

            let elapsed = (self.now() - state.start_reference).max(0) as u64;
            state.elapsed_millis = elapsed;
            trace!(elapsed_ms = elapsed, "stopwatch tick");
            state.publication()
        };
        self.publish(publication);
        true
    }
}

impl Drop for EngineShared {
    fn drop(&mut self) {
        if let Some(update_loop) = self.state.get_mut().update_loop.take() {
            update_loop.abort();
        }
    }
}

/// The shared stopwatch.
///
/// Cloning is cheap and every clone drives the same stopwatch. The update
/// loop stops once the last clone is dropped.
#[derive(Clone)]
pub struct TimerEngine {
    shared: Arc<EngineShared>,
}

impl TimerEngine {
    pub fn builder() -> TimerEngineBuilder {
        TimerEngineBuilder::default()
    }

    /// Starts the stopwatch if it is stopped, or pauses it if it is running.
    ///
    /// Returns the state after the transition.
    /// Pausing freezes the elapsed time at the value last published by the
    /// update loop.
    ///
    /// Returns the state after the transition.
    pub fn start_or_pause(&self) -> RunState {
        let shared = &self.shared;
        let (run_state, publication) = {
            let mut state = shared.state.lock();
            state.generation = state.generation.wrapping_add(1);

            let current = state.run_state;
            match current {
                RunState::Running => {
                    if let Some(update_loop) = state.update_loop.take() {
                        update_loop.abort();
                    }
                    state.run_state = RunState::Stopped;
                    info!(elapsed_ms = state.elapsed_millis, "stopwatch paused");
                }
                RunState::Stopped => {
                    state.start_reference = shared.now() - state.elapsed_millis as i64;
                    state.run_state = RunState::Running;
                    let update_loop = shared.runtime.spawn(run_update_loop(
                        Arc::downgrade(shared),
                        shared.ticks.clone(),
                        state.generation,
                    ));
                    state.update_loop = Some(update_loop);
                    info!(
                        elapsed_ms = state.elapsed_millis,
                        start_reference = state.start_reference,
                        "stopwatch started"
                    );
                }
            }
            (state.run_state, state.publication())
        };

        shared.publish(publication);
        run_state
    }

    /// Resets the stopwatch to zero without changing whether it runs.
    pub fn clear(&self) {
        let shared = &self.shared;
        let publication = {
            let mut state = shared.state.lock();
            state.start_reference = shared.now();
            state.elapsed_millis = 0;
            debug!(running = state.run_state.is_running(), "stopwatch cleared");
            state.publication()
        };
        shared.publish(publication);
    }

    pub fn observe_run_state(&self) -> watch::Receiver<RunState> {
        self.shared.run_state_out.subscribe()
    }

    pub fn observe_elapsed_display(&self) -> watch::Receiver<String> {
        self.shared.display_out.subscribe()
    }

    pub fn observe_elapsed_millis(&self) -> watch::Receiver<u64> {
        self.shared.elapsed_out.subscribe()
    }

    pub fn run_state(&self) -> RunState {
        self.shared.state.lock().run_state
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.shared.state.lock().elapsed_millis
    }

    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed_millis())
    }

    /// Reference reading the current run is measured from.
    pub fn start_reference_millis(&self) -> i64 {
        self.shared.state.lock().start_reference
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let state = self.shared.state.lock();
        TimerSnapshot {
            run_state: state.run_state,
            elapsed_millis: state.elapsed_millis,
            display: format_elapsed(state.elapsed_millis),
        }
    }
}

impl fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TimerEngine")
            .field("run_state", &state.run_state)
            .field("elapsed_millis", &state.elapsed_millis)
            .field("generation", &state.generation)
            .finish()
    }
}

async fn run_update_loop(
    shared: Weak<EngineShared>,
    ticks: Arc<dyn TickScheduler>,
    generation: u64,
) {
    loop {
        let Some(engine) = shared.upgrade() else {
            break;
        };
        if !engine.refresh(generation) {
            break;
        }
        drop(engine);

        ticks.wait_for_tick().await;
    }
    trace!(generation, "update loop finished");
}

/// Builder wiring a [`TimerEngine`] to its collaborators.
#[derive(Default)]
pub struct TimerEngineBuilder {
    time: Option<Arc<dyn TimeSource>>,
    ticks: Option<Arc<dyn TickScheduler>>,
    runtime: Option<Handle>,
}

impl TimerEngineBuilder {
    pub fn time_source(mut self, time: impl TimeSource) -> Self {
        self.time = Some(Arc::new(time));
        self
    }

    pub fn shared_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn tick_scheduler(mut self, ticks: impl TickScheduler) -> Self {
        self.ticks = Some(Arc::new(ticks));
        self
    }

    pub fn shared_tick_scheduler(mut self, ticks: Arc<dyn TickScheduler>) -> Self {
        self.ticks = Some(ticks);
        self
    }

    /// Runtime the update loop is spawned on. Defaults to the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<TimerEngine, TimerError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| TimerError::NoRuntime)?,
        };
        let time: Arc<dyn TimeSource> = match self.time {
            Some(time) => time,
            None => Arc::new(MonotonicTimeSource::new()),
        };
        let ticks: Arc<dyn TickScheduler> = match self.ticks {
            Some(ticks) => ticks,
            None => Arc::new(IntervalTicks::default()),
        };

        let start_reference = time.now_millis() as i64;

        Ok(TimerEngine {
            shared: Arc::new(EngineShared {
                time,
                ticks,
                runtime,
                state: Mutex::new(EngineState {
                    run_state: RunState::Stopped,
                    elapsed_millis: 0,
                    start_reference,
                    generation: 0,
                    publish_seq: 0,
                    update_loop: None,
                }),
                run_state_out: Outbox::new(RunState::Stopped),
                elapsed_out: Outbox::new(0),
                display_out: Outbox::new(ZERO_DISPLAY.to_string()),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::tick::ManualTicks;
    use crate::time_source::ManualTimeSource;

    fn manual_engine() -> (TimerEngine, ManualTimeSource, ManualTicks) {
        let clock = ManualTimeSource::new(0);
        let ticks = ManualTicks::new();
        let engine = TimerEngine::builder()
            .time_source(clock.clone())
            .tick_scheduler(ticks.clone())
            .build()
            .expect("runtime available");
        (engine, clock, ticks)
    }

    /// Lets aborted loops be torn down before the test continues.
    async fn settle() {
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn build_requires_a_runtime() {
        let err = TimerEngine::builder().build().unwrap_err();
        assert_eq!(err, TimerError::NoRuntime);
    }

    #[test]
    fn build_accepts_an_explicit_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime builds");
        let engine = TimerEngine::builder()
            .runtime(runtime.handle().clone())
            .build()
            .expect("engine builds");
        assert_eq!(engine.run_state(), RunState::Stopped);
    }

    #[tokio::test]
    async fn emits_initial_state() {
        let (engine, _, _) = manual_engine();
        assert_eq!(*engine.observe_run_state().borrow(), RunState::Stopped);
        assert_eq!(*engine.observe_elapsed_display().borrow(), "00:00:00");
        assert_eq!(engine.snapshot().elapsed_millis, 0);
    }

    #[tokio::test]
    async fn toggling_alternates_run_state() {
        let (engine, _, _) = manual_engine();
        let mut observed = engine.observe_run_state();

        for n in 1..=10 {
            let state = engine.start_or_pause();
            assert_eq!(state.is_running(), n % 2 == 1);
            observed.changed().await.expect("engine alive");
            assert_eq!(*observed.borrow_and_update(), state);
        }
        settle().await;
        assert_eq!(engine.run_state(), RunState::Stopped);
    }

    #[tokio::test]
    async fn pause_and_resume_scenario() {
        let (engine, clock, ticks) = manual_engine();

        engine.start_or_pause();
        ticks.parked().await;
        assert_eq!(engine.elapsed_millis(), 0);

        clock.set(1_000);
        assert!(ticks.step().await);
        assert_eq!(engine.elapsed_millis(), 1_000);
        assert_eq!(engine.elapsed_display(), "00:01:00");

        assert_eq!(engine.start_or_pause(), RunState::Stopped);
        assert_eq!(engine.elapsed_millis(), 1_000);

        clock.set(5_000);
        settle().await;
        assert!(!ticks.tick());
        assert_eq!(engine.elapsed_millis(), 1_000);

        assert_eq!(engine.start_or_pause(), RunState::Running);
        assert_eq!(engine.start_reference_millis(), 4_000);
        ticks.parked().await;

        clock.set(6_000);
        assert!(ticks.step().await);
        assert_eq!(engine.elapsed_millis(), 2_000);
        assert_eq!(engine.elapsed_display(), "00:02:00");
    }

    #[tokio::test]
    async fn stray_ticks_while_stopped_change_nothing() {
        let (engine, clock, ticks) = manual_engine();
        clock.set(3_000);
        for _ in 0..5 {
            assert!(!ticks.tick());
        }
        settle().await;
        assert_eq!(engine.elapsed_millis(), 0);
        assert_eq!(engine.run_state(), RunState::Stopped);
    }

    #[tokio::test]
    async fn tick_reaching_a_paused_loop_changes_nothing() {
        let (engine, clock, ticks) = manual_engine();
        engine.start_or_pause();
        ticks.parked().await;
        clock.set(1_000);
        assert!(ticks.step().await);

        assert_eq!(engine.start_or_pause(), RunState::Stopped);
        clock.set(5_000);
        // The aborted loop is still parked and receives this tick.
        assert!(ticks.tick());
        settle().await;

        assert_eq!(engine.run_state(), RunState::Stopped);
        assert_eq!(engine.elapsed_millis(), 1_000);
        assert_eq!(*engine.observe_elapsed_display().borrow(), "00:01:00");
        assert!(!ticks.is_parked());
    }

    #[tokio::test]
    async fn superseded_generation_does_not_publish() {
        let (engine, clock, ticks) = manual_engine();
        engine.start_or_pause();
        ticks.parked().await;
        let generation = engine.shared.state.lock().generation;
        clock.set(1_000);
        assert!(ticks.step().await);

        engine.start_or_pause();
        engine.start_or_pause();
        clock.set(5_000);
        assert!(!engine.shared.refresh(generation));
        assert_eq!(engine.elapsed_millis(), 1_000);
        assert_eq!(*engine.observe_elapsed_millis().borrow(), 1_000);
    }

    #[tokio::test]
    async fn pause_freezes_at_the_last_tick() {
        let (engine, clock, ticks) = manual_engine();
        engine.start_or_pause();
        ticks.parked().await;
        clock.set(1_000);
        assert!(ticks.step().await);

        clock.set(1_010);
        assert_eq!(engine.start_or_pause(), RunState::Stopped);
        assert_eq!(engine.elapsed_millis(), 1_000);
        assert_eq!(*engine.observe_elapsed_display().borrow(), "00:01:00");

        assert_eq!(engine.start_or_pause(), RunState::Running);
        assert_eq!(engine.start_reference_millis(), 10);
        ticks.parked().await;
        clock.set(1_510);
        assert!(ticks.step().await);
        assert_eq!(engine.elapsed_millis(), 1_500);
    }

    #[test]
    fn outbox_drops_out_of_order_publications() {
        let outbox = Outbox::new(0u64);
        let observer = outbox.subscribe();
        assert!(outbox.send(2, 200));
        assert!(!outbox.send(1, 100));
        assert_eq!(*observer.borrow(), 200);
        assert!(!outbox.send(3, 200));
        assert!(outbox.send(4, 0));
        assert_eq!(*observer.borrow(), 0);
    }

    #[test]
    fn engine_reads_do_not_wait_on_a_busy_observer() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()
            .expect("runtime builds");
        let clock = ManualTimeSource::new(0);
        let engine = TimerEngine::builder()
            .time_source(clock.clone())
            .tick_scheduler(ManualTicks::new())
            .runtime(runtime.handle().clone())
            .build()
            .expect("engine builds");
        clock.set(1_500);

        let display = engine.observe_elapsed_display();
        let (held_tx, held_rx) = std::sync::mpsc::channel();
        let holder = std::thread::spawn(move || {
            let value = display.borrow();
            held_tx.send(()).expect("test thread waiting");
            std::thread::sleep(Duration::from_millis(500));
            drop(value);
        });
        held_rx.recv().expect("observer holds a borrow");

        // Sending takes the channel's write lock even when the value is
        // unchanged, so this clear parks behind the borrow.
        let clearer = {
            let engine = engine.clone();
            std::thread::spawn(move || engine.clear())
        };
        std::thread::sleep(Duration::from_millis(50));

        let started = std::time::Instant::now();
        assert_eq!(engine.run_state(), RunState::Stopped);
        let snapshot = engine.snapshot();
        assert!(
            started.elapsed() < Duration::from_millis(200),
            "engine reads waited {:?} on an observer",
            started.elapsed()
        );
        assert_eq!(snapshot.elapsed_millis, 0);
        assert_eq!(engine.start_reference_millis(), 1_500);

        holder.join().expect("observer thread");
        clearer.join().expect("clear thread");
        assert_eq!(*engine.observe_elapsed_display().borrow(), "00:00:00");
    }

    #[tokio::test]
    async fn clear_while_running_keeps_running_from_zero() {
        let (engine, clock, ticks) = manual_engine();
        engine.start_or_pause();
        ticks.parked().await;

        clock.set(2_500);
        assert!(ticks.step().await);
        assert_eq!(engine.elapsed_millis(), 2_500);

        let mut run_state = engine.observe_run_state();
        engine.clear();
        assert_eq!(engine.run_state(), RunState::Running);
        assert!(!run_state.has_changed().expect("engine alive"));
        assert_eq!(engine.elapsed_millis(), 0);
        assert_eq!(engine.start_reference_millis(), 2_500);
        assert_eq!(*engine.observe_elapsed_display().borrow(), "00:00:00");

        clock.set(3_000);
        assert!(ticks.step().await);
        assert_eq!(engine.elapsed_millis(), 500);
    }

    #[tokio::test]
    async fn clear_while_stopped_stays_stopped_at_zero() {
        let (engine, clock, ticks) = manual_engine();
        engine.start_or_pause();
        ticks.parked().await;
        clock.set(4_200);
        assert!(ticks.step().await);
        engine.start_or_pause();

        engine.clear();
        assert_eq!(engine.run_state(), RunState::Stopped);
        assert_eq!(engine.elapsed_display(), "00:00:00");
        assert_eq!(*engine.observe_elapsed_display().borrow(), "00:00:00");
    }

    #[tokio::test]
    async fn simultaneous_observers_see_identical_values() {
        let (engine, clock, ticks) = manual_engine();
        engine.start_or_pause();
        ticks.parked().await;
        clock.set(65_000);
        assert!(ticks.step().await);

        let first = engine.observe_elapsed_display();
        let second = engine.observe_elapsed_display();
        assert_eq!(*first.borrow(), "01:05:00");
        assert_eq!(*first.borrow(), *second.borrow());
    }

    #[tokio::test]
    async fn repeated_cycles_leave_a_single_loop() {
        let (engine, clock, ticks) = manual_engine();
        for _ in 0..5 {
            engine.start_or_pause();
            engine.start_or_pause();
        }
        settle().await;
        assert!(!ticks.is_parked());

        engine.start_or_pause();
        ticks.parked().await;
        clock.set(700);
        assert!(ticks.step().await);
        assert_eq!(engine.elapsed_millis(), 700);
        clock.set(900);
        assert!(ticks.step().await);
        assert_eq!(engine.elapsed_millis(), 900);
    }

    #[tokio::test]
    async fn dropping_the_engine_stops_the_loop() {
        let (engine, _, ticks) = manual_engine();
        engine.start_or_pause();
        ticks.parked().await;

        drop(engine);
        settle().await;
        assert!(!ticks.is_parked());
    }

    #[tokio::test(start_paused = true)]
    async fn interval_driven_engine_tracks_tokio_time() {
        let engine = TimerEngine::builder()
            .time_source(MonotonicTimeSource::new())
            .tick_scheduler(IntervalTicks::new(Duration::from_millis(16)))
            .build()
            .expect("runtime available");

        // Refreshes land every 16ms; the last one before t=1000 is at 992.
        engine.start_or_pause();
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        engine.start_or_pause();
        assert_eq!(engine.elapsed_millis(), 992);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(engine.elapsed_millis(), 992);

        // Resumed at t=1500; the last refresh before t=1750 is at 1740.
        engine.start_or_pause();
        tokio::time::sleep(Duration::from_millis(250)).await;
        engine.start_or_pause();
        assert_eq!(engine.elapsed_millis(), 1_232);
        assert_eq!(engine.elapsed_display(), "00:01:23");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_toggles_keep_parity() {
        let engine = TimerEngine::builder()
            .tick_scheduler(IntervalTicks::new(Duration::from_millis(1)))
            .build()
            .expect("runtime available");

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..25 {
                    engine.start_or_pause();
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.expect("toggle task");
        }

        // 8 * 25 toggles is even.
        assert_eq!(engine.run_state(), RunState::Stopped);
        engine.start_or_pause();
        assert_eq!(engine.run_state(), RunState::Running);
    }
}
