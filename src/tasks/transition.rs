use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info};

use super::loader::PreparedResource;

/// Container the slideshow draws into.
pub trait DisplaySurface: Send {
    /// Fades the current content out; resolves when fully hidden.
    fn fade_out(&mut self, duration: Duration) -> BoxFuture<'_, ()>;
    /// Drops whatever is currently mounted.
    fn clear(&mut self);
    /// Mounts new content while hidden.
    fn mount(&mut self, resource: PreparedResource);
    /// Fades the mounted content in; resolves when fully visible.
    fn fade_in(&mut self, duration: Duration) -> BoxFuture<'_, ()>;
}

pub type SharedSurface = Arc<Mutex<Box<dyn DisplaySurface>>>;

pub fn shared(surface: impl DisplaySurface + 'static) -> SharedSurface {
    Arc::new(Mutex::new(Box::new(surface)))
}

/// Swaps surface content: fade out, clear, mount, fade in.
#[derive(Clone)]
pub struct TransitionExecutor {
    surface: SharedSurface,
    fade: Duration,
}

impl TransitionExecutor {
    pub fn new(surface: SharedSurface, fade: Duration) -> Self {
        Self { surface, fade }
    }

    pub async fn transition(&self, resource: PreparedResource) {
        let mut surface = self.surface.lock().await;
        debug!(source = resource.source(), fade = ?self.fade, "transition");
        surface.fade_out(self.fade).await;
        surface.clear();
        surface.mount(resource);
        surface.fade_in(self.fade).await;
    }
}

/// Headless surface: logs what would be shown and spends the fade time.
#[derive(Debug, Default)]
pub struct LoggingSurface {
    current: Option<PreparedResource>,
}

impl LoggingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&PreparedResource> {
        self.current.as_ref()
    }
}

impl DisplaySurface for LoggingSurface {
    fn fade_out(&mut self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(sleep(duration))
    }

    fn clear(&mut self) {
        if let Some(old) = self.current.take() {
            debug!(source = old.source(), "cleared");
        }
    }

    fn mount(&mut self, resource: PreparedResource) {
        match &resource {
            PreparedResource::Image { source, image } => {
                info!(%source, width = image.width, height = image.height, "showing image");
            }
            PreparedResource::Frame { source } => info!(%source, "showing webpage"),
            PreparedResource::Video(video) => info!(source = %video.source, "showing video"),
        }
        self.current = Some(resource);
    }

    fn fade_in(&mut self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(sleep(duration))
    }
}
