//! The seam between the reconciliation loop and whatever actually plays
//! audio locally.

use std::time::Instant;

use thiserror::Error;

/// The local playback primitive refused to start playing, typically an
/// autoplay policy. The reconciliation loop swallows this and leaves
/// starting playback to the user.
#[derive(Error, Debug)]
#[error("playback start refused: {0}")]
pub struct PlaybackRefused(pub String);

/// Capability set the reconciliation loop needs from local playback.
pub trait PlaybackEngine {
    /// Points local playback at new media, paused at position zero.
    fn load(&mut self, url: &str);

    /// Current local position in seconds.
    fn position(&self) -> f64;

    /// Hard-sets the local position (a corrective seek).
    fn seek(&mut self, position: f64);

    /// Starts local playback; may be refused by the environment.
    fn play(&mut self) -> Result<(), PlaybackRefused>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    fn media_url(&self) -> Option<&str>;
}

/// Simulated player for the headless observer: the position advances in
/// real time while playing, nothing is decoded.
#[derive(Debug)]
pub struct VirtualEngine {
    media_url: Option<String>,
    paused: bool,
    /// Position as of the moment playback last started or was repositioned.
    offset: f64,
    resumed_at: Instant,
}

impl VirtualEngine {
    pub fn new() -> Self {
        Self {
            media_url: None,
            paused: true,
            offset: 0.0,
            resumed_at: Instant::now(),
        }
    }
}

impl Default for VirtualEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackEngine for VirtualEngine {
    fn load(&mut self, url: &str) {
        self.media_url = Some(url.to_string());
        self.paused = true;
        self.offset = 0.0;
    }

    fn position(&self) -> f64 {
        if self.paused {
            self.offset
        } else {
            self.offset + self.resumed_at.elapsed().as_secs_f64()
        }
    }

    fn seek(&mut self, position: f64) {
        self.offset = position.max(0.0);
        self.resumed_at = Instant::now();
    }

    fn play(&mut self) -> Result<(), PlaybackRefused> {
        if self.paused {
            self.paused = false;
            self.resumed_at = Instant::now();
        }
        Ok(())
    }

    fn pause(&mut self) {
        if !self.paused {
            self.offset += self.resumed_at.elapsed().as_secs_f64();
            self.paused = true;
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn media_url(&self) -> Option<&str> {
        self.media_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_resets_to_paused_zero() {
        let mut engine = VirtualEngine::new();
        engine.seek(10.0);
        engine.play().unwrap();
        engine.load("/uploads/x.mp3");

        assert!(engine.is_paused());
        assert_eq!(engine.position(), 0.0);
        assert_eq!(engine.media_url(), Some("/uploads/x.mp3"));
    }

    #[test]
    fn paused_position_is_stable() {
        let mut engine = VirtualEngine::new();
        engine.seek(4.5);
        assert_eq!(engine.position(), 4.5);
        engine.pause();
        assert_eq!(engine.position(), 4.5);
    }

    #[test]
    fn pause_freezes_the_running_position() {
        let mut engine = VirtualEngine::new();
        engine.load("/uploads/x.mp3");
        engine.seek(2.0);
        engine.play().unwrap();
        engine.pause();
        // Whatever ran between play and pause is sub-millisecond here.
        assert!(engine.position() >= 2.0);
        assert!(engine.position() < 2.1);
    }
}
