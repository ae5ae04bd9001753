use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;
use crate::slide::{SlideDescriptor, SlideQueue};

/// Top-level YAML document for the slideshow.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    /// Slides in display order; the show cycles through them forever.
    #[serde(default)]
    pub entries: Vec<SlideDescriptor>,

    /// Length of each half (fade out, fade in) of a transition.
    #[serde(
        default = "Configuration::default_fade_duration",
        with = "humantime_serde"
    )]
    pub fade_duration: Duration,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            fade_duration: Self::default_fade_duration(),
        }
    }
}

impl Configuration {
    const fn default_fade_duration() -> Duration {
        Duration::from_millis(500)
    }

    pub fn queue(&self) -> SlideQueue {
        SlideQueue::new(self.entries.iter().cloned())
    }

    pub fn validate(&self) -> Result<(), Error> {
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.source.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "entry {idx} ({}) has an empty source",
                    entry.kind
                )));
            }
        }
        Ok(())
    }
}

pub fn from_yaml_str(yaml: &str) -> Result<Configuration, Error> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn from_yaml_file(path: &Path) -> Result<Configuration, Error> {
    let raw = std::fs::read_to_string(path)?;
    from_yaml_str(&raw)
}
