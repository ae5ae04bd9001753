//! Turns slide descriptors into displayable resources.
//!
//! Each kind prepares differently and may do something once on screen
//! (videos start playing). Preparation starts as soon as `prepare` is called
//! and runs as its own task.
use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::LoadError;
use crate::slide::{SlideDescriptor, SlideKind};

/// Decoded RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Fetch + decode primitive behind the image loader.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, uri: String) -> BoxFuture<'static, Result<DecodedImage, LoadError>>;
}

/// Reads images from the local file system (`file://` URIs or bare paths)
/// and decodes them off the async threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodingFetcher;

impl ImageFetcher for DecodingFetcher {
    fn fetch(&self, uri: String) -> BoxFuture<'static, Result<DecodedImage, LoadError>> {
        Box::pin(async move {
            let path = local_path(&uri).ok_or_else(|| LoadError::Fetch {
                uri: uri.clone(),
                reason: "unsupported scheme".into(),
            })?;
            let decoded = tokio::task::spawn_blocking(move || decode_rgba8_apply_exif(&path))
                .await
                .map_err(|_| LoadError::Aborted(uri.clone()))?;
            let img = decoded.map_err(|err| LoadError::Fetch {
                uri: uri.clone(),
                reason: err.to_string(),
            })?;
            let (width, height) = img.dimensions();
            Ok(DecodedImage {
                width,
                height,
                pixels: img.into_raw(),
            })
        })
    }
}

fn local_path(uri: &str) -> Option<PathBuf> {
    if let Some(rest) = uri.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    if uri.contains("://") {
        return None;
    }
    Some(PathBuf::from(uri))
}

// Orientation is best-effort; without EXIF the pixels are used as stored.
fn decode_rgba8_apply_exif(path: &Path) -> anyhow::Result<image::RgbaImage> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgba8();

    let img = match read_orientation(path).unwrap_or(1) {
        2 => image::imageops::flip_horizontal(&img),
        3 => image::imageops::rotate180(&img),
        4 => image::imageops::flip_vertical(&img),
        5 => image::imageops::flip_horizontal(&image::imageops::rotate90(&img)),
        6 => image::imageops::rotate90(&img),
        7 => image::imageops::flip_horizontal(&image::imageops::rotate270(&img)),
        8 => image::imageops::rotate270(&img),
        _ => img,
    };
    Ok(img)
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = field.value.get_uint(0)? as u16;
    debug!(orientation, path = %path.display(), "exif orientation");
    Some(orientation)
}

/// Playback switches of a video element, shared between the loader that
/// created it and the surface showing it.
#[derive(Debug, Default)]
struct Playback {
    controls: AtomicBool,
    autoplay: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct VideoElement {
    pub source: String,
    playback: Arc<Playback>,
}

impl VideoElement {
    fn new(source: String) -> Self {
        Self {
            source,
            playback: Arc::new(Playback::default()),
        }
    }

    pub fn controls(&self) -> bool {
        self.playback.controls.load(Ordering::Acquire)
    }

    pub fn autoplay(&self) -> bool {
        self.playback.autoplay.load(Ordering::Acquire)
    }

    fn play(&self) {
        self.playback.controls.store(true, Ordering::Release);
        self.playback.autoplay.store(true, Ordering::Release);
    }
}

/// Ready-to-mount content. Ownership passes to the display surface on
/// transition.
#[derive(Debug, Clone)]
pub enum PreparedResource {
    /// Decoded image, shown stretched inside a container.
    Image { source: String, image: DecodedImage },
    /// Embedded page. Never verified to load.
    Frame { source: String },
    Video(VideoElement),
}

impl PreparedResource {
    pub fn source(&self) -> &str {
        match self {
            Self::Image { source, .. } | Self::Frame { source } => source,
            Self::Video(video) => &video.source,
        }
    }
}

/// In-flight preparation. Resolves exactly once; dropping it detaches the
/// underlying task rather than aborting it.
#[derive(Debug)]
pub struct Preparation {
    source: String,
    task: JoinHandle<Result<PreparedResource, LoadError>>,
}

impl Future for Preparation {
    type Output = Result<PreparedResource, LoadError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(LoadError::Aborted(self.source.clone()))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Per-kind loader for one descriptor.
pub enum SlideLoader {
    Image {
        source: String,
        fetcher: Arc<dyn ImageFetcher>,
    },
    Webpage {
        source: String,
    },
    Video {
        element: VideoElement,
    },
    Unsupported {
        kind: String,
    },
}

impl SlideLoader {
    pub fn for_slide(slide: &SlideDescriptor, fetcher: &Arc<dyn ImageFetcher>) -> Self {
        let source = slide.source.clone();
        match &slide.kind {
            SlideKind::Image => Self::Image {
                source,
                fetcher: fetcher.clone(),
            },
            SlideKind::Webpage => Self::Webpage { source },
            SlideKind::Video => Self::Video {
                element: VideoElement::new(source),
            },
            SlideKind::Unknown(kind) => Self::Unsupported { kind: kind.clone() },
        }
    }

    /// Starts preparing immediately on the current runtime.
    pub fn prepare(&self) -> Preparation {
        let (source, task) = match self {
            Self::Image { source, fetcher } => {
                debug!(source = %source, "loading image");
                let fut = fetcher.fetch(source.clone());
                let owned = source.clone();
                let task = tokio::spawn(async move {
                    let image = fut.await?;
                    debug!(source = %owned, width = image.width, height = image.height, "image loaded");
                    Ok(PreparedResource::Image {
                        source: owned,
                        image,
                    })
                });
                (source.clone(), task)
            }
            Self::Webpage { source } => {
                let frame = PreparedResource::Frame {
                    source: source.clone(),
                };
                (source.clone(), tokio::spawn(async move { Ok(frame) }))
            }
            Self::Video { element } => {
                let video = PreparedResource::Video(element.clone());
                (
                    element.source.clone(),
                    tokio::spawn(async move { Ok(video) }),
                )
            }
            Self::Unsupported { kind } => {
                let err = LoadError::UnknownKind(kind.clone());
                (kind.clone(), tokio::spawn(async move { Err(err) }))
            }
        };
        Preparation { source, task }
    }

    /// Called once the prepared resource is on screen.
    pub fn activate(&self) {
        if let Self::Video { element } = self {
            element.play();
        }
    }
}
