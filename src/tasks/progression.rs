//! One attempt to advance the show by a single slide.
use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::loader::{ImageFetcher, SlideLoader};
use super::transition::TransitionExecutor;
use crate::error::LoadError;
use crate::events::Notifier;
use crate::slide::SlideDescriptor;

/// Collaborators a step needs; cheap to clone.
#[derive(Clone)]
pub struct StepContext {
    pub fetcher: Arc<dyn ImageFetcher>,
    pub executor: TransitionExecutor,
    pub feedback: Notifier<String>,
    pub errors: Notifier<String>,
}

/// Prepares `next` while the current slide stays up for at least
/// `minimum_wait`, then transitions to it.
///
/// Preparation starts before the timer. A preparation failure before the
/// timer fires drops the timer and fails right away; after the timer fires
/// the step waits for preparation to settle and that result alone decides the
/// outcome. The transition never happens before `minimum_wait` has elapsed.
pub async fn progress_to(
    minimum_wait: Duration,
    next: &SlideDescriptor,
    ctx: &StepContext,
) -> Result<(), LoadError> {
    ctx.feedback
        .publish(&format!("Scheduling progression to {}", next.source));

    let loader = SlideLoader::for_slide(next, &ctx.fetcher);
    let mut preparation = loader.prepare();
    let timer = sleep(minimum_wait);
    tokio::pin!(timer);

    let early = select! {
        biased;
        result = &mut preparation => Some(result),
        _ = &mut timer => None,
    };

    let prepared = match early {
        Some(Err(err)) => {
            debug!(source = %next.source, "preload failed before minimum wait; timer cancelled");
            return Err(report_failure(next, err, ctx));
        }
        Some(Ok(resource)) => {
            timer.await;
            wait_elapsed(ctx);
            Ok(resource)
        }
        None => {
            wait_elapsed(ctx);
            preparation.await
        }
    };

    let resource = prepared.map_err(|err| report_failure(next, err, ctx))?;
    info!(source = %next.source, kind = %next.kind, "preload complete, transitioning");
    ctx.executor.transition(resource).await;
    ctx.feedback.publish(&"Transition complete".to_string());
    loader.activate();
    Ok(())
}

fn wait_elapsed(ctx: &StepContext) {
    ctx.feedback.publish(
        &"Current slide has shown for long enough, waiting for the next slide to finish preloading before transitioning."
            .to_string(),
    );
}

fn report_failure(next: &SlideDescriptor, err: LoadError, ctx: &StepContext) -> LoadError {
    warn!(source = %next.source, error = %err, "preload failed; slide will remain as-is");
    ctx.errors.publish(&err.to_string());
    err
}
