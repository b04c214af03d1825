//! Sound and vibration feedback. Always best-effort: failures are logged, never returned.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::Settings;

/// Vibration pattern played when a workout completes (on/off milliseconds)
pub const COMPLETION_PATTERN: [u64; 5] = [200, 100, 200, 100, 200];

/// Candidate directories tried for sound files, relative to the assets root
const SOUND_DIRS: &[&str] = &["sounds", "public/sounds", "assets/sounds"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sound {
    ExerciseStart,
    ExerciseEnd,
    RestEnd,
}

impl Sound {
    pub fn name(&self) -> &'static str {
        match self {
            Sound::ExerciseStart => "exercise-start",
            Sound::ExerciseEnd => "exercise-end",
            Sound::RestEnd => "rest-end",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.mp3", self.name())
    }
}

/// Feedback side effects triggered by the workout timer
pub trait Feedback {
    fn play_sound(&self, sound: Sound);
    fn vibrate(&self, pattern: &[u64]);
}

/// Resolves logical sounds to files under an assets root
#[derive(Debug, Clone)]
pub struct SoundAssets {
    root: PathBuf,
}

impl SoundAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths tried for `sound`, in order
    pub fn candidates(&self, sound: Sound) -> Vec<PathBuf> {
        let file = sound.file_name();
        SOUND_DIRS.iter().map(|dir| self.root.join(dir).join(&file)).collect()
    }

    pub fn resolve(&self, sound: Sound) -> Option<PathBuf> {
        self.candidates(sound).into_iter().find(|p| p.is_file())
    }
}

/// Terminal feedback: a resolved sound rings the bell, vibration is unsupported
#[derive(Debug, Clone)]
pub struct TerminalFeedback {
    sound_enabled: bool,
    vibration_enabled: bool,
    assets: SoundAssets,
}

impl TerminalFeedback {
    pub fn new(settings: &Settings, assets: SoundAssets) -> Self {
        Self {
            sound_enabled: settings.sound_enabled,
            vibration_enabled: settings.vibration_enabled,
            assets,
        }
    }
}

impl Feedback for TerminalFeedback {
    fn play_sound(&self, sound: Sound) {
        if !self.sound_enabled {
            return;
        }
        let Some(path) = self.assets.resolve(sound) else {
            warn!(
                "Sound '{}' not found under {}",
                sound.name(),
                self.assets.root().display()
            );
            return;
        };
        debug!("Playing {}", path.display());
        let mut out = std::io::stdout();
        if let Err(e) = out.write_all(b"\x07").and_then(|_| out.flush()) {
            warn!("Failed to play sound '{}': {}", sound.name(), e);
        }
    }

    fn vibrate(&self, pattern: &[u64]) {
        if !self.vibration_enabled {
            return;
        }
        debug!("Vibration {:?} requested but not supported in a terminal", pattern);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_sound_file_names() {
        assert_eq!(Sound::ExerciseStart.file_name(), "exercise-start.mp3");
        assert_eq!(Sound::RestEnd.name(), "rest-end");
    }

    #[test]
    fn test_resolve_tries_candidates_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let assets = SoundAssets::new(dir.path());
        assert!(assets.resolve(Sound::ExerciseEnd).is_none());

        let public = dir.path().join("public/sounds");
        fs::create_dir_all(&public).unwrap();
        fs::write(public.join("exercise-end.mp3"), b"").unwrap();
        assert_eq!(assets.resolve(Sound::ExerciseEnd), Some(public.join("exercise-end.mp3")));

        let plain = dir.path().join("sounds");
        fs::create_dir_all(&plain).unwrap();
        fs::write(plain.join("exercise-end.mp3"), b"").unwrap();
        assert_eq!(assets.resolve(Sound::ExerciseEnd), Some(plain.join("exercise-end.mp3")));
    }

    #[test]
    fn test_missing_assets_are_swallowed() {
        let assets = SoundAssets::new("/nonexistent/fitcycle");
        let feedback = TerminalFeedback::new(&Settings::default(), assets);
        feedback.play_sound(Sound::RestEnd);
        feedback.vibrate(&COMPLETION_PATTERN);
    }
}
