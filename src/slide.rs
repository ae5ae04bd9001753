use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// What a slide shows. Anything outside the known kinds is kept verbatim so the
/// scheduler can skip it at run time instead of rejecting the whole config.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlideKind {
    Image,
    Webpage,
    Video,
    Unknown(String),
}

impl SlideKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Image => "image",
            Self::Webpage => "webpage",
            Self::Video => "video",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "image" => Self::Image,
            "webpage" => Self::Webpage,
            "video" => Self::Video,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for SlideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SlideKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// One item of the slideshow.
///
/// `duration` is the minimum time the slide stays on screen before the
/// scheduler advances away from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SlideDescriptor {
    #[serde(alias = "type")]
    pub kind: SlideKind,
    #[serde(alias = "path")]
    pub source: String,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl SlideDescriptor {
    pub fn new(kind: SlideKind, source: impl Into<String>, duration: Duration) -> Self {
        Self {
            kind,
            source: source.into(),
            duration,
        }
    }

    pub fn image(source: impl Into<String>, duration: Duration) -> Self {
        Self::new(SlideKind::Image, source, duration)
    }

    pub fn webpage(source: impl Into<String>, duration: Duration) -> Self {
        Self::new(SlideKind::Webpage, source, duration)
    }

    pub fn video(source: impl Into<String>, duration: Duration) -> Self {
        Self::new(SlideKind::Video, source, duration)
    }
}

/// Circular playlist. Rotation moves the head to the tail; the length never
/// changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlideQueue {
    slides: VecDeque<SlideDescriptor>,
}

impl SlideQueue {
    pub fn new(slides: impl IntoIterator<Item = SlideDescriptor>) -> Self {
        Self {
            slides: slides.into_iter().collect(),
        }
    }

    pub fn head(&self) -> Option<&SlideDescriptor> {
        self.slides.front()
    }

    pub fn rotate(&mut self) {
        if !self.slides.is_empty() {
            self.slides.rotate_left(1);
        }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlideDescriptor> {
        self.slides.iter()
    }

    pub fn to_vec(&self) -> Vec<SlideDescriptor> {
        self.slides.iter().cloned().collect()
    }
}

impl FromIterator<SlideDescriptor> for SlideQueue {
    fn from_iter<I: IntoIterator<Item = SlideDescriptor>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<Vec<SlideDescriptor>> for SlideQueue {
    fn from(slides: Vec<SlideDescriptor>) -> Self {
        Self::new(slides)
    }
}
