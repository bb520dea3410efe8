use livedrop_types::RarityTier;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};
use thiserror::Error;
use tokio::{task::JoinHandle, time::sleep};
use tracing::debug;

/// Clip played while the reel spins.
pub const SPIN_SOUND_URL: &str =
    "https://raw.githubusercontent.com/poofy25/Case-Simulator/main/Audio/CSGO%20Case%20Opening%20Sound%20Effect.mp3";

/// Clip played alongside the jackpot overlay.
pub const JACKPOT_SOUND_URL: &str = "https://www.myinstants.com/media/sounds/4092-mango-phonk.mp3";

/// How long the jackpot overlay may stay up when its clip could not start.
pub const JACKPOT_FALLBACK: Duration = Duration::from_millis(5_000);

/// Sound for a rarity tier. Several tiers share a clip.
pub fn tier_sound_url(tier: RarityTier) -> &'static str {
    match tier {
        RarityTier::Consumer | RarityTier::Industrial => {
            "https://www.myinstants.com/media/sounds/perdiozh.mp3"
        }
        RarityTier::MilSpec => "https://www.myinstants.com/media/sounds/movie_1.mp3",
        RarityTier::Restricted => "https://www.myinstants.com/media/sounds/yippeeeeeeeeeeeeee.mp3",
        RarityTier::Classified => {
            "https://www.myinstants.com/media/sounds/kids-saying-yay-sound-effect_3.mp3"
        }
        RarityTier::Covert | RarityTier::Gold => JACKPOT_SOUND_URL,
    }
}

/// A clip could not be started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("playback failed: {0}")]
pub struct PlaybackError(pub String);

/// A loaded sound.
pub trait Clip: Send + Sync + 'static {
    /// Seek back to the start.
    fn rewind(&self);

    fn play(&self) -> Result<(), PlaybackError>;

    fn pause(&self);
}

/// Platform audio output.
pub trait AudioBackend: Send + Sync + 'static {
    type Clip: Clip;

    /// Prepare a clip for `url`. Loading is expected to be lazy and cheap to
    /// fail; errors surface on [Clip::play].
    fn load(&self, url: &str) -> Self::Clip;
}

/// Full-viewport monochrome effect shown with the jackpot clip.
pub trait Overlay: Send + Sync + 'static {
    fn engage(&self);

    fn release(&self);
}

struct Inner<B: AudioBackend, O: Overlay> {
    backend: B,
    overlay: O,
    clips: Mutex<HashMap<&'static str, Arc<B::Clip>>>,
    current_tier_clip: Mutex<Option<&'static str>>,
    jackpot_active: AtomicBool,
    jackpot_generation: AtomicU64,
    jackpot_fallback: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Plays rarity sounds and the jackpot effect.
///
/// Playback is best effort: failures are logged and otherwise ignored. Clones
/// share the clip cache and the jackpot state.
pub struct AudioEffectPlayer<B: AudioBackend, O: Overlay> {
    inner: Arc<Inner<B, O>>,
}

impl<B: AudioBackend, O: Overlay> Clone for AudioEffectPlayer<B, O> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: AudioBackend, O: Overlay> AudioEffectPlayer<B, O> {
    pub fn new(backend: B, overlay: O) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                overlay,
                clips: Mutex::new(HashMap::new()),
                current_tier_clip: Mutex::new(None),
                jackpot_active: AtomicBool::new(false),
                jackpot_generation: AtomicU64::new(0),
                jackpot_fallback: Mutex::new(None),
            }),
        }
    }

    /// Cached clip for `url`, loading it on first use.
    fn clip(&self, url: &'static str) -> Arc<B::Clip> {
        let mut clips = lock(&self.inner.clips);
        clips
            .entry(url)
            .or_insert_with(|| {
                debug!(url, "loading clip");
                Arc::new(self.inner.backend.load(url))
            })
            .clone()
    }

    /// Number of distinct clips loaded so far.
    pub fn loaded_clips(&self) -> usize {
        lock(&self.inner.clips).len()
    }

    fn start(&self, url: &'static str) -> Result<(), PlaybackError> {
        let clip = self.clip(url);
        clip.rewind();
        clip.play()
    }

    pub fn play_spin(&self) {
        if let Err(err) = self.start(SPIN_SOUND_URL) {
            debug!(?err, "spin clip unavailable");
        }
    }

    fn silence_tier_clip(&self) {
        if let Some(previous) = lock(&self.inner.current_tier_clip).take() {
            self.clip(previous).pause();
        }
    }

    /// Restart the sound for `tier`, silencing any other tier sound.
    pub fn play(&self, tier: RarityTier) {
        let url = tier_sound_url(tier);
        {
            let mut current = lock(&self.inner.current_tier_clip);
            if let Some(previous) = current.replace(url).filter(|previous| *previous != url) {
                self.clip(previous).pause();
            }
        }
        if let Err(err) = self.start(url) {
            debug!(?err, %tier, "tier clip unavailable");
        }
    }

    /// Engage the overlay and start the jackpot clip.
    ///
    /// If the clip cannot start, the overlay is released after
    /// [JACKPOT_FALLBACK]. Otherwise it stays until [Self::jackpot_ended].
    pub fn play_jackpot(&self) {
        self.clear_jackpot();
        self.silence_tier_clip();
        let generation = self.inner.jackpot_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.jackpot_active.store(true, Ordering::SeqCst);
        self.inner.overlay.engage();

        if let Err(err) = self.start(JACKPOT_SOUND_URL) {
            debug!(?err, "jackpot clip unavailable, scheduling fallback cleanup");
            let inner = self.inner.clone();
            let handle = tokio::spawn(async move {
                sleep(JACKPOT_FALLBACK).await;
                if inner.jackpot_generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                lock(&inner.jackpot_fallback).take();
                if inner.jackpot_active.swap(false, Ordering::SeqCst) {
                    inner.overlay.release();
                }
            });
            *lock(&self.inner.jackpot_fallback) = Some(handle);
        }
    }

    /// The jackpot clip finished playing.
    pub fn jackpot_ended(&self) {
        self.clear_jackpot();
    }

    /// Remove the overlay and cancel any pending fallback.
    pub fn clear_jackpot(&self) {
        if let Some(handle) = lock(&self.inner.jackpot_fallback).take() {
            handle.abort();
        }
        if self.inner.jackpot_active.swap(false, Ordering::SeqCst) {
            self.inner.overlay.release();
        }
    }

    pub fn jackpot_active(&self) -> bool {
        self.inner.jackpot_active.load(Ordering::SeqCst)
    }
}

/// Recording backend and overlay for tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Clone, Default)]
    pub struct Recorder {
        pub events: Arc<Mutex<Vec<String>>>,
        pub failing: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        pub fn fail(&self, url: &str) {
            self.failing.lock().unwrap().push(url.to_string());
        }

        pub fn count(&self, event: &str) -> usize {
            self.events().iter().filter(|e| *e == event).count()
        }

        fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    pub struct RecordedClip {
        url: String,
        recorder: Recorder,
    }

    impl Clip for RecordedClip {
        fn rewind(&self) {
            self.recorder.record(format!("rewind {}", self.url));
        }

        fn play(&self) -> Result<(), PlaybackError> {
            if self.recorder.failing.lock().unwrap().contains(&self.url) {
                return Err(PlaybackError("blocked".to_string()));
            }
            self.recorder.record(format!("play {}", self.url));
            Ok(())
        }

        fn pause(&self) {
            self.recorder.record(format!("pause {}", self.url));
        }
    }

    impl AudioBackend for Recorder {
        type Clip = RecordedClip;

        fn load(&self, url: &str) -> RecordedClip {
            self.record(format!("load {url}"));
            RecordedClip {
                url: url.to_string(),
                recorder: self.clone(),
            }
        }
    }

    impl Overlay for Recorder {
        fn engage(&self) {
            self.record("overlay on".to_string());
        }

        fn release(&self) {
            self.record("overlay off".to_string());
        }
    }

    pub fn player() -> (AudioEffectPlayer<Recorder, Recorder>, Recorder) {
        let recorder = Recorder::default();
        (
            AudioEffectPlayer::new(recorder.clone(), recorder.clone()),
            recorder,
        )
    }
}
