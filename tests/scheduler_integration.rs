use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use media_slideshow::tasks::loader::{DecodedImage, ImageFetcher, PreparedResource};
use media_slideshow::tasks::transition::DisplaySurface;
use media_slideshow::{LifecycleError, LoadError, SlideDescriptor, SlideKind, Slideshow};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout};

#[derive(Debug, Clone, Copy)]
enum Behaviour {
    Succeed(u64),
    Fail(u64),
}

/// Image fetcher scripted per source: succeed or fail after a delay (ms).
#[derive(Default)]
struct ScriptedFetcher(HashMap<String, Behaviour>);

impl ScriptedFetcher {
    fn with(mut self, source: &str, behaviour: Behaviour) -> Self {
        self.0.insert(source.to_string(), behaviour);
        self
    }
}

impl ImageFetcher for ScriptedFetcher {
    fn fetch(&self, uri: String) -> BoxFuture<'static, Result<DecodedImage, LoadError>> {
        let behaviour = self.0.get(&uri).copied().unwrap_or(Behaviour::Succeed(0));
        Box::pin(async move {
            match behaviour {
                Behaviour::Succeed(ms) => {
                    sleep(Duration::from_millis(ms)).await;
                    Ok(DecodedImage {
                        width: 1,
                        height: 1,
                        pixels: vec![0; 4],
                    })
                }
                Behaviour::Fail(ms) => {
                    sleep(Duration::from_millis(ms)).await;
                    Err(LoadError::Fetch {
                        uri,
                        reason: "scripted failure".into(),
                    })
                }
            }
        })
    }
}

struct Mount {
    at: Duration,
    source: String,
}

/// Surface that reports every mount with its offset from test start.
struct ChannelSurface {
    origin: Instant,
    tx: mpsc::UnboundedSender<Mount>,
}

impl DisplaySurface for ChannelSurface {
    fn fade_out(&mut self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(sleep(duration))
    }
    fn clear(&mut self) {}
    fn mount(&mut self, resource: PreparedResource) {
        let _ = self.tx.send(Mount {
            at: self.origin.elapsed(),
            source: resource.source().to_string(),
        });
    }
    fn fade_in(&mut self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(sleep(duration))
    }
}

struct Rig {
    show: Slideshow,
    mounts: mpsc::UnboundedReceiver<Mount>,
    feedback: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<String>>>,
    stopped: Arc<Mutex<usize>>,
}

impl Rig {
    async fn next_mount(&mut self) -> Mount {
        timeout(Duration::from_secs(60), self.mounts.recv())
            .await
            .expect("timeout waiting for a transition")
            .expect("surface dropped")
    }
}

fn rig(entries: Vec<SlideDescriptor>, fetcher: ScriptedFetcher) -> Rig {
    rig_with_fade(entries, fetcher, Duration::ZERO)
}

/// A non-zero fade keeps the loop parked inside the transition, so a stop
/// issued right after a mount lands before the next step boundary.
fn rig_with_fade(entries: Vec<SlideDescriptor>, fetcher: ScriptedFetcher, fade: Duration) -> Rig {
    let (tx, mounts) = mpsc::unbounded_channel();
    let feedback = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let stopped = Arc::new(Mutex::new(0));

    let (fb, er, st) = (feedback.clone(), errors.clone(), stopped.clone());
    let show = Slideshow::builder(ChannelSurface {
        origin: Instant::now(),
        tx,
    })
    .entries(entries)
    .fade_duration(fade)
    .image_fetcher(fetcher)
    .on_feedback(move |m| fb.lock().unwrap().push(m.clone()))
    .on_error(move |m| er.lock().unwrap().push(m.clone()))
    .on_stopped(move |_| *st.lock().unwrap() += 1)
    .build();

    Rig {
        show,
        mounts,
        feedback,
        errors,
        stopped,
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn assert_near(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + ms(50),
        "expected ~{expected:?}, got {actual:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn first_slide_shows_without_delay_and_waits_use_own_duration() {
    let fetcher = ScriptedFetcher::default().with("a", Behaviour::Succeed(100));
    let mut rig = rig(
        vec![
            SlideDescriptor::image("a", secs(2)),
            SlideDescriptor::video("b", secs(3)),
        ],
        fetcher,
    );

    rig.show.start();

    let first = rig.next_mount().await;
    assert_eq!(first.source, "a");
    assert_near(first.at, ms(100));

    // `a` stays up for its own 2s before `b` replaces it.
    let second = rig.next_mount().await;
    assert_eq!(second.source, "b");
    assert_near(second.at, ms(2100));

    // `b` stays up for 3s; `a` preloads within that window.
    let third = rig.next_mount().await;
    assert_eq!(third.source, "a");
    assert_near(third.at, ms(5100));

    rig.show.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn fast_failure_preserves_remaining_wait() {
    let mut rig = rig(
        vec![
            SlideDescriptor::image("a", secs(2)),
            SlideDescriptor::new(SlideKind::Unknown("hologram".into()), "bad", secs(5)),
            SlideDescriptor::webpage("c", secs(1)),
        ],
        ScriptedFetcher::default(),
    );

    rig.show.start();

    let first = rig.next_mount().await;
    assert_eq!(first.source, "a");

    let next = rig.next_mount().await;
    assert_eq!(next.source, "c", "unknown kind must be skipped");
    assert_near(next.at, first.at + secs(2));
    assert_eq!(
        *rig.errors.lock().unwrap(),
        vec!["Unknown entry type hologram encountered"]
    );

    rig.show.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn late_failure_adds_no_extra_delay() {
    let fetcher = ScriptedFetcher::default().with("slow-bad", Behaviour::Fail(1500));
    let mut rig = rig(
        vec![
            SlideDescriptor::webpage("a", secs(1)),
            SlideDescriptor::image("slow-bad", secs(1)),
            SlideDescriptor::webpage("c", secs(1)),
        ],
        fetcher,
    );

    rig.show.start();
    let first = rig.next_mount().await;
    let next = rig.next_mount().await;

    assert_eq!(next.source, "c");
    assert_near(next.at, first.at + ms(1500));
    assert_eq!(rig.errors.lock().unwrap().len(), 1);

    rig.show.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn queue_rotates_once_per_step_and_stop_waits_for_boundary() {
    let entries = vec![
        SlideDescriptor::webpage("a", secs(1)),
        SlideDescriptor::webpage("b", secs(1)),
        SlideDescriptor::webpage("c", secs(1)),
    ];
    let mut rig = rig_with_fade(entries.clone(), ScriptedFetcher::default(), ms(100));

    rig.show.start();
    let mut shown = Vec::new();
    for _ in 0..5 {
        shown.push(rig.next_mount().await.source);
    }
    assert_eq!(shown, vec!["a", "b", "c", "a", "b"]);

    rig.show.stop().await.unwrap();
    assert_eq!(*rig.stopped.lock().unwrap(), 1);

    let mut expected = entries;
    expected.rotate_left(5 % 3);
    assert_eq!(rig.show.queue().to_vec(), expected);

    // Nothing further is scheduled once stopped.
    sleep(secs(10)).await;
    assert!(rig.mounts.try_recv().is_err());
    assert!(!rig.show.is_running());
}

#[tokio::test(start_paused = true)]
async fn stopping_twice_is_a_lifecycle_error() {
    let mut rig = rig_with_fade(
        vec![SlideDescriptor::webpage("a", secs(1))],
        ScriptedFetcher::default(),
        ms(100),
    );
    rig.show.start();
    rig.next_mount().await;

    rig.show.stop().await.unwrap();
    assert_eq!(rig.show.stop().await, Err(LifecycleError::AlreadyStopped));
    assert_eq!(*rig.stopped.lock().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn set_entries_restarts_from_new_head_without_delay() {
    let mut rig = rig_with_fade(
        vec![
            SlideDescriptor::webpage("old-1", secs(4)),
            SlideDescriptor::webpage("old-2", secs(4)),
        ],
        ScriptedFetcher::default(),
        ms(100),
    );
    rig.show.start();
    assert_eq!(rig.next_mount().await.source, "old-1");

    rig.show
        .set_entries(vec![
            SlideDescriptor::webpage("new-1", secs(1)),
            SlideDescriptor::webpage("new-2", secs(1)),
        ])
        .await
        .unwrap();
    let restarted = Instant::now();
    assert_eq!(*rig.stopped.lock().unwrap(), 1);
    assert!(rig.show.is_running());

    // Only the fade separates the restart from the new head.
    let head = rig.next_mount().await;
    assert_eq!(head.source, "new-1");
    assert!(Instant::now() - restarted < ms(150));
    assert_eq!(rig.show.queue().head().map(|s| s.source.as_str()), Some("new-1"));

    rig.show.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn set_entries_completes_even_if_caller_stops_waiting() {
    let mut rig = rig_with_fade(
        vec![SlideDescriptor::webpage("old", secs(4))],
        ScriptedFetcher::default(),
        ms(100),
    );
    rig.show.start();
    assert_eq!(rig.next_mount().await.source, "old");

    drop(rig.show.set_entries(vec![SlideDescriptor::webpage("new", secs(1))]));

    // The stop/swap/start cycle still runs to completion on its own.
    assert_eq!(rig.next_mount().await.source, "new");
    assert!(rig.show.is_running());
    assert_eq!(*rig.stopped.lock().unwrap(), 1);
    assert_eq!(rig.show.queue().to_vec(), vec![SlideDescriptor::webpage("new", secs(1))]);

    rig.show.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn set_entries_on_stopped_show_fails() {
    let rig = rig(Vec::new(), ScriptedFetcher::default());
    let err = rig
        .show
        .set_entries(vec![SlideDescriptor::webpage("a", secs(1))])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        media_slideshow::Error::Lifecycle(LifecycleError::AlreadyStopped)
    ));
}

#[tokio::test(start_paused = true)]
async fn empty_queue_emits_one_feedback_and_nothing_else() {
    let mut rig = rig(Vec::new(), ScriptedFetcher::default());

    rig.show.start();
    sleep(secs(5)).await;

    assert_eq!(rig.feedback.lock().unwrap().len(), 1);
    assert!(rig.errors.lock().unwrap().is_empty());
    assert_eq!(*rig.stopped.lock().unwrap(), 0);
    assert!(rig.mounts.try_recv().is_err());
}
