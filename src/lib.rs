pub mod config;
pub mod error;
pub mod events;
pub mod slide;
pub mod tasks {
    pub mod loader;
    pub mod progression;
    pub mod reload;
    pub mod scheduler;
    pub mod transition;
}

pub use error::{Error, LifecycleError, LoadError};
pub use slide::{SlideDescriptor, SlideKind, SlideQueue};
pub use tasks::scheduler::{Slideshow, SlideshowBuilder};
