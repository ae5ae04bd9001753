//! Public slideshow handle and the loop that drives it.
//!
//! The loop runs as one spawned task per run. Between two steps it rotates
//! the queue and checks the running flag; a stop request is only ever
//! observed there, so an in-flight step always finishes.
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::loader::{DecodingFetcher, ImageFetcher};
use super::progression::{StepContext, progress_to};
use super::transition::{self, DisplaySurface, TransitionExecutor};
use crate::error::{Error, LifecycleError};
use crate::events::{Handler, Notifier, Stopped, Subscription};
use crate::slide::{SlideDescriptor, SlideQueue};

const DEFAULT_FADE: Duration = Duration::from_millis(500);
const EMPTY_ENTRIES: &str = "Entries supplied to the slideshow are empty, will not iterate any slides";

enum Launch {
    Empty,
    AlreadyIterating,
    Spawn(u64),
}

#[derive(Debug, Default)]
struct SchedulerState {
    running: bool,
    loop_active: bool,
    /// Generation of the most recently spawned loop.
    run: u64,
    queue: SlideQueue,
}

/// Pending stop: resolves when the loop of generation `run` halts. Dropping
/// it removes the subscription.
struct StopWaiter {
    stopped: Notifier<Stopped>,
    subscription: Subscription,
    rx: oneshot::Receiver<()>,
}

impl Drop for StopWaiter {
    fn drop(&mut self) {
        self.stopped.unsubscribe(self.subscription);
    }
}

struct Shared {
    state: Mutex<SchedulerState>,
    step: StepContext,
    stopped: Notifier<Stopped>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn feedback(&self, message: impl Into<String>) {
        self.step.feedback.publish(&message.into());
    }
}

/// Handle to a running (or idle) slideshow. Clones share the same show.
#[derive(Clone)]
pub struct Slideshow {
    shared: Arc<Shared>,
}

pub struct SlideshowBuilder {
    surface: transition::SharedSurface,
    entries: Vec<SlideDescriptor>,
    fade_duration: Duration,
    fetcher: Arc<dyn ImageFetcher>,
    on_feedback: Option<Handler<String>>,
    on_error: Option<Handler<String>>,
    on_stopped: Option<Handler<Stopped>>,
}

impl SlideshowBuilder {
    pub fn entries(mut self, entries: impl IntoIterator<Item = SlideDescriptor>) -> Self {
        self.entries = entries.into_iter().collect();
        self
    }

    pub fn fade_duration(mut self, fade: Duration) -> Self {
        self.fade_duration = fade;
        self
    }

    pub fn image_fetcher(mut self, fetcher: impl ImageFetcher + 'static) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    pub fn on_feedback(mut self, handler: impl Fn(&String) + Send + Sync + 'static) -> Self {
        self.on_feedback = Some(Arc::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl Fn(&String) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn on_stopped(mut self, handler: impl Fn(&Stopped) + Send + Sync + 'static) -> Self {
        self.on_stopped = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Slideshow {
        let feedback = Notifier::with_hook(|msg: &String| debug!(feedback = %msg));
        let errors = Notifier::with_hook(|msg: &String| warn!(error = %msg));
        let stopped = Notifier::new();
        if let Some(handler) = self.on_feedback {
            feedback.subscribe_shared(handler);
        }
        if let Some(handler) = self.on_error {
            errors.subscribe_shared(handler);
        }
        if let Some(handler) = self.on_stopped {
            stopped.subscribe_shared(handler);
        }

        Slideshow {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState {
                    queue: SlideQueue::new(self.entries),
                    ..SchedulerState::default()
                }),
                step: StepContext {
                    fetcher: self.fetcher,
                    executor: TransitionExecutor::new(self.surface, self.fade_duration),
                    feedback,
                    errors,
                },
                stopped,
            }),
        }
    }
}

impl Slideshow {
    pub fn builder(surface: impl DisplaySurface + 'static) -> SlideshowBuilder {
        SlideshowBuilder {
            surface: transition::shared(surface),
            entries: Vec::new(),
            fade_duration: DEFAULT_FADE,
            fetcher: Arc::new(DecodingFetcher),
            on_feedback: None,
            on_error: None,
            on_stopped: None,
        }
    }

    pub fn on_feedback(&self) -> &Notifier<String> {
        &self.shared.step.feedback
    }

    pub fn on_error(&self) -> &Notifier<String> {
        &self.shared.step.errors
    }

    pub fn on_stopped(&self) -> &Notifier<Stopped> {
        &self.shared.stopped
    }

    pub fn is_running(&self) -> bool {
        self.shared.state().running
    }

    /// Snapshot of the queue as currently rotated.
    pub fn queue(&self) -> SlideQueue {
        self.shared.state().queue.clone()
    }

    /// Begins iterating from the head of the queue with no initial delay.
    ///
    /// Must be called within a tokio runtime. While a run is still active
    /// (for instance a stop is pending) this only re-arms the running flag.
    pub fn start(&self) {
        let launch = {
            let mut state = self.shared.state();
            state.running = true;
            if state.queue.is_empty() {
                Launch::Empty
            } else if std::mem::replace(&mut state.loop_active, true) {
                Launch::AlreadyIterating
            } else {
                state.run += 1;
                Launch::Spawn(state.run)
            }
        };
        match launch {
            Launch::Empty => self.shared.feedback(EMPTY_ENTRIES),
            Launch::AlreadyIterating => debug!("slideshow already iterating"),
            Launch::Spawn(generation) => {
                self.shared.feedback("Starting slideshow");
                tokio::spawn(run(self.shared.clone(), generation));
            }
        }
    }

    /// Requests a stop; the returned future resolves once the current step
    /// has finished and the loop is idle.
    ///
    /// The request takes effect when this is called, not when the future is
    /// first polled.
    pub fn stop(&self) -> impl Future<Output = Result<(), LifecycleError>> + Send + 'static {
        self.shared.feedback("Stopping slideshow");
        let shared = self.shared.clone();
        let pending = self.request_stop();
        async move {
            match pending? {
                Some(mut waiter) => {
                    let _ = (&mut waiter.rx).await;
                }
                None => {
                    let run = shared.state().run;
                    shared.stopped.publish(&Stopped { run });
                }
            }
            shared.feedback("Slideshow stopped");
            info!("slideshow stopped");
            Ok(())
        }
    }

    /// Stops, swaps in `entries`, and starts again from the new head.
    ///
    /// The whole cycle runs as its own task: dropping the returned future
    /// only gives up on waiting for it.
    pub fn set_entries(
        &self,
        entries: Vec<SlideDescriptor>,
    ) -> impl Future<Output = Result<(), Error>> + Send + 'static {
        let stopping = self.stop();
        let this = self.clone();
        let cycle = tokio::spawn(async move {
            stopping.await?;
            this.shared.state().queue = SlideQueue::new(entries);
            this.start();
            Ok::<(), Error>(())
        });
        async move { cycle.await? }
    }

    // `None` means no loop is iterating, so nothing is left to wait for.
    fn request_stop(&self) -> Result<Option<StopWaiter>, LifecycleError> {
        let mut state = self.shared.state();
        if !state.running {
            return Err(LifecycleError::AlreadyStopped);
        }
        state.running = false;
        if !state.loop_active {
            return Ok(None);
        }
        // Subscribe under the state lock so the loop cannot halt unseen. Only
        // the halt of the loop running now counts, not a late signal from an
        // earlier one.
        let awaited = state.run;
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let subscription = self.shared.stopped.subscribe(move |stopped: &Stopped| {
            if stopped.run != awaited {
                return;
            }
            if let Some(tx) = tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
                let _ = tx.send(());
            }
        });
        Ok(Some(StopWaiter {
            stopped: self.shared.stopped.clone(),
            subscription,
            rx,
        }))
    }
}

async fn run(shared: Arc<Shared>, generation: u64) {
    let mut minimum_wait = Duration::ZERO;
    loop {
        let head = shared.state().queue.head().cloned();
        let Some(next) = head else {
            shared.feedback(EMPTY_ENTRIES);
            shared.state().loop_active = false;
            return;
        };

        let started = Instant::now();
        match progress_to(minimum_wait, &next, &shared.step).await {
            Ok(()) => {
                shared.feedback("Transition to new slide complete, scheduling the next slide");
                minimum_wait = next.duration;
            }
            Err(err) => {
                let remaining = minimum_wait.saturating_sub(started.elapsed());
                info!(
                    source = %next.source,
                    error = %err,
                    ?remaining,
                    "skipping slide"
                );
                shared.feedback(format!(
                    "Transition to slide failed. Skipping it and scheduling another slide to appear in {}",
                    humantime::format_duration(remaining)
                ));
                minimum_wait = remaining;
            }
        }

        let halted = {
            let mut state = shared.state();
            state.queue.rotate();
            if state.running {
                false
            } else {
                state.loop_active = false;
                true
            }
        };
        if halted {
            shared.stopped.publish(&Stopped { run: generation });
            return;
        }
    }
}
