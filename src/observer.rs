//! Client-side reconciliation: turning a stale snapshot plus elapsed time
//! into a corrected local playback position.
//!
//! The loop never blocks: each pass reads the cached snapshot, derives the
//! expected position and nudges the local engine only when the discrepancy
//! is audible. Manual play/pause by the local user is detected against the
//! engine state the loop itself left behind, so the loop's own corrections
//! are never reported upstream as user actions.

use tracing::{debug, trace};

use crate::engine::PlaybackEngine;
use crate::events::ClientCommand;
use crate::state::{extrapolate, PlaybackState};

/// Positional discrepancy below which local playback is left alone.
/// Seeking on every pass would audibly stutter; a quarter second of skew
/// between rooms is not perceptible.
pub const DRIFT_THRESHOLD: f64 = 0.25;

pub struct Observer<E> {
    engine: E,
    cached: Option<PlaybackState>,
    /// Engine pause flag as the last reconciliation pass left it. The loop
    /// updates it after its own mutations, so only a user action can make
    /// the live flag disagree.
    engine_was_paused: bool,
}

impl<E: PlaybackEngine> Observer<E> {
    pub fn new(engine: E) -> Self {
        let engine_was_paused = engine.is_paused();
        Self {
            engine,
            cached: None,
            engine_was_paused,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn cached(&self) -> Option<&PlaybackState> {
        self.cached.as_ref()
    }

    /// Replaces the cached snapshot wholesale and reconciles against it.
    pub fn ingest(&mut self, snapshot: PlaybackState, now_ms: u64) {
        self.cached = Some(snapshot);
        self.reconcile(now_ms);
    }

    /// One pass of the loop: report a manual override if the user toggled
    /// the engine since the last pass, then pull local playback toward the
    /// authoritative state. The returned command, if any, must be sent
    /// upstream.
    pub fn tick(&mut self, now_ms: u64) -> Option<ClientCommand> {
        let command = self.detect_override();
        self.reconcile(now_ms);
        command
    }

    /// A play/pause flip the loop did not make itself is a user override.
    /// It is reported only when it would actually change the authoritative
    /// flag; echoes of the authority's own transitions stay quiet, which is
    /// what breaks the correct-then-report feedback loop.
    fn detect_override(&mut self) -> Option<ClientCommand> {
        let paused = self.engine.is_paused();
        if paused == self.engine_was_paused {
            return None;
        }
        self.engine_was_paused = paused;

        let authority_playing = self.cached.as_ref().is_some_and(|s| s.is_playing);
        let current_time = Some(self.engine.position());
        match (paused, authority_playing) {
            (true, true) => Some(ClientCommand::Pause { current_time }),
            (false, false) => Some(ClientCommand::Play { current_time }),
            _ => None,
        }
    }

    fn reconcile(&mut self, now_ms: u64) {
        let Some(state) = self.cached.clone() else {
            return;
        };

        if let Some(url) = state.audio_url.as_deref() {
            if self.engine.media_url() != Some(url) {
                self.engine.load(url);
            }
        }

        let target = extrapolate(&state, now_ms);
        let drift = self.engine.position() - target;
        if drift.abs() > DRIFT_THRESHOLD {
            debug!(drift, target, "correcting drifted local position");
            self.engine.seek(target);
        }

        if state.is_playing && self.engine.is_paused() {
            if self.engine.media_url().is_some() {
                if let Err(refused) = self.engine.play() {
                    // Blocked autoplay: stay paused until the user acts.
                    trace!(%refused, "local playback start refused");
                }
            }
        } else if !state.is_playing && !self.engine.is_paused() {
            self.engine.pause();
        }

        self.engine_was_paused = self.engine.is_paused();
    }
}
