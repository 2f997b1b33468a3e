//! Debounced multi-callback countdown timer.
//!
//! A [`CallbackTimer`] waits until `target` worth of uninterrupted ticks has
//! accumulated, then fires its bound callbacks exactly once per armed cycle.
//! Callers reset it on every input event; as long as resets keep arriving
//! faster than `target`, the callbacks never run. That is the entire debounce
//! contract -- there is no scheduling framework behind it.
//!
//! Ticking runs on a single spawned task (the scheduler); countdown state is
//! only ever mutated there or under the state lock in `reset`. The execution
//! step is dispatched as a detached task so a slow callback can never stall
//! the tick cadence or the progress display.

use anyhow::Result;
use futures_util::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A unit of work fired by the timer.
///
/// Callbacks are bound at construction, cloned into the execution step, and
/// spawned concurrently; each one is responsible for short-circuiting itself
/// when there is nothing to do (the timer never filters calls).
pub type AsyncCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

type TickObserver = Box<dyn Fn(f32) + Send>;
type ErrorObserver = Box<dyn Fn(anyhow::Error) + Send>;

#[derive(Debug, thiserror::Error)]
pub enum TimerConfigError {
    #[error("timer target duration must be positive")]
    NonPositiveTarget,
    #[error("timer step duration must be positive")]
    NonPositiveStep,
}

#[derive(Debug, Default)]
struct Countdown {
    elapsed: Duration,
    fired: bool,
}

/// Restartable, single-fire, multi-callback countdown.
///
/// State machine: `start()` arms a cycle and begins ticking at `step`
/// cadence; each tick reports elapsed time to the tick observer, advances
/// the countdown, and on first reaching `target` dispatches the execution
/// step. Further ticks keep reporting but never re-fire until the next
/// `start()`/`reset()`. `stop()` halts ticking without clearing progress;
/// `reset()` clears progress without touching the ticking task.
pub struct CallbackTimer {
    target: Duration,
    step: Duration,
    callbacks: Arc<[AsyncCallback]>,
    state: Arc<Mutex<Countdown>>,
    on_tick: Arc<Mutex<Option<TickObserver>>>,
    on_error: Arc<Mutex<Option<ErrorObserver>>>,
    ticker: Option<JoinHandle<()>>,
}

// Mutex poisoning only happens if a holder panicked; the countdown state is
// plain data, so recover it rather than propagate the panic.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CallbackTimer {
    /// Bind `callbacks` to a countdown of `target`, ticking every `step`.
    ///
    /// Does not start ticking; call [`start`](Self::start).
    pub fn new(
        target: Duration,
        step: Duration,
        callbacks: Vec<AsyncCallback>,
    ) -> Result<Self, TimerConfigError> {
        if target.is_zero() {
            return Err(TimerConfigError::NonPositiveTarget);
        }
        if step.is_zero() {
            return Err(TimerConfigError::NonPositiveStep);
        }
        Ok(Self {
            target,
            step,
            callbacks: callbacks.into(),
            state: Arc::new(Mutex::new(Countdown::default())),
            on_tick: Arc::new(Mutex::new(None)),
            on_error: Arc::new(Mutex::new(None)),
            ticker: None,
        })
    }

    /// Replace the tick observer. Single slot: the previous observer, if
    /// any, is dropped.
    pub fn set_on_tick(&self, observer: impl Fn(f32) + Send + 'static) {
        *lock(&self.on_tick) = Some(Box::new(observer));
    }

    /// Replace the callback-failure observer. Failures are reported here
    /// (after being logged) and never abort sibling callbacks.
    pub fn set_on_callback_error(&self, observer: impl Fn(anyhow::Error) + Send + 'static) {
        *lock(&self.on_error) = Some(Box::new(observer));
    }

    /// Arm a fresh cycle and begin ticking. Idempotent while running: the
    /// previous ticking task is replaced and the countdown starts over.
    pub fn start(&mut self) {
        self.stop_ticker();
        {
            let mut state = lock(&self.state);
            state.elapsed = Duration::ZERO;
            state.fired = false;
        }

        let target = self.target;
        let step = self.step;
        let state = Arc::clone(&self.state);
        let callbacks = Arc::clone(&self.callbacks);
        let on_tick = Arc::clone(&self.on_tick);
        let on_error = Arc::clone(&self.on_error);

        self.ticker = Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(step);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval yields immediately; consume that so the first observed
            // tick lands one full step after start.
            ticks.tick().await;
            loop {
                ticks.tick().await;

                let (seen, fire) = {
                    let mut state = lock(&state);
                    let seen = state.elapsed;
                    if state.elapsed < target {
                        state.elapsed += step;
                    }
                    let fire = state.elapsed >= target && !state.fired;
                    if fire {
                        state.fired = true;
                    }
                    (seen, fire)
                };

                // Observer runs outside the state lock so it may call reset()
                // without deadlocking.
                if let Some(observer) = lock(&on_tick).as_ref() {
                    observer(seen.as_secs_f32());
                }

                if fire {
                    tokio::spawn(run_callbacks(
                        Arc::clone(&callbacks),
                        Arc::clone(&on_error),
                    ));
                }
            }
        }));
    }

    /// Halt ticking. Countdown progress and the fired latch are preserved;
    /// an execution step already dispatched is not retracted.
    pub fn stop(&mut self) {
        self.stop_ticker();
    }

    /// Clear countdown progress and the fired latch without touching the
    /// ticking task. Called on every input event: this is the debounce.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.elapsed = Duration::ZERO;
        state.fired = false;
    }

    /// Elapsed time within the current cycle, as the observer reports it.
    #[must_use]
    pub fn elapsed_seconds(&self) -> f32 {
        lock(&self.state).elapsed.as_secs_f32()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Drop for CallbackTimer {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

/// The execution step: spawn every bound callback, then join them all.
///
/// "Fire all, join all" -- a failure is logged and reported per callback,
/// and the remaining siblings always run to completion.
async fn run_callbacks(
    callbacks: Arc<[AsyncCallback]>,
    on_error: Arc<Mutex<Option<ErrorObserver>>>,
) {
    let handles: Vec<JoinHandle<Result<()>>> =
        callbacks.iter().map(|callback| tokio::spawn(callback())).collect();

    for (index, handle) in handles.into_iter().enumerate() {
        let failure = match handle.await {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(error),
            Err(join_error) => Some(anyhow::anyhow!("callback task died: {join_error}")),
        };
        if let Some(error) = failure {
            tracing::error!(callback = index, "debounce callback failed: {error:#}");
            if let Some(observer) = lock(&on_error).as_ref() {
                observer(error);
            }
        }
    }
}
