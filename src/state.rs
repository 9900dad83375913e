//! The authoritative playback record and position extrapolation.

use serde::{Deserialize, Serialize};

/// The shared playback record. Exactly one instance is owned by the
/// authority; every observer holds a copy of the most recent snapshot it
/// received, so the struct doubles as the wire-level state payload.
///
/// `current_time` is always the position *as of* `last_updated`, never an
/// extrapolated value. Transitions rewrite the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    /// Position in seconds at the instant of `last_updated`.
    pub current_time: f64,
    /// Epoch milliseconds of the last transition.
    pub last_updated: u64,
    /// URL of the active media, `None` until something has been loaded.
    pub audio_url: Option<String>,
}

impl PlaybackState {
    /// The startup record: paused at zero with no media.
    pub fn new(now_ms: u64) -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            last_updated: now_ms,
            audio_url: None,
        }
    }
}

/// Where playback should be at `now_ms` given the last known record.
///
/// While paused the stored position is returned unchanged. While playing
/// the position advances by the wall-clock time elapsed since the record
/// was written. Clock skew between peers can make `now_ms` lag behind
/// `last_updated`; the elapsed term saturates at zero so skew never pushes
/// the result below the reference position, and the result itself is
/// clamped to be non-negative.
///
/// This function is the single definition of "position right now" for both
/// the authority and every observer.
pub fn extrapolate(state: &PlaybackState, now_ms: u64) -> f64 {
    if !state.is_playing {
        return state.current_time.max(0.0);
    }
    let elapsed = now_ms.saturating_sub(state.last_updated) as f64 / 1000.0;
    (state.current_time + elapsed).max(0.0)
}

/// Epoch milliseconds right now.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(position: f64, at_ms: u64) -> PlaybackState {
        PlaybackState {
            is_playing: true,
            current_time: position,
            last_updated: at_ms,
            audio_url: Some("/uploads/track.mp3".to_string()),
        }
    }

    fn paused(position: f64, at_ms: u64) -> PlaybackState {
        PlaybackState {
            is_playing: false,
            ..playing(position, at_ms)
        }
    }

    #[test]
    fn paused_state_does_not_advance() {
        let state = paused(12.5, 1_000);
        assert_eq!(extrapolate(&state, 1_000), 12.5);
        assert_eq!(extrapolate(&state, 61_000), 12.5);
        assert_eq!(extrapolate(&state, 500), 12.5);
    }

    #[test]
    fn playing_state_advances_with_elapsed_time() {
        let state = playing(3.0, 1_000);
        assert!((extrapolate(&state, 1_500) - 3.5).abs() < 1e-9);
        assert!((extrapolate(&state, 11_000) - 13.0).abs() < 1e-9);
    }

    #[test]
    fn extrapolation_is_monotonic_while_playing() {
        let state = playing(7.0, 2_000);
        let t1 = extrapolate(&state, 2_300);
        let t2 = extrapolate(&state, 2_800);
        assert!((t2 - t1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn clock_skew_does_not_run_backwards() {
        // An observer whose clock lags the authority sees now < last_updated.
        let state = playing(4.0, 10_000);
        assert_eq!(extrapolate(&state, 9_000), 4.0);
    }

    #[test]
    fn result_is_never_negative() {
        let state = paused(-2.0, 1_000);
        assert_eq!(extrapolate(&state, 1_000), 0.0);
    }

    #[test]
    fn snapshot_uses_wire_field_names() {
        let state = playing(1.25, 42);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["isPlaying"], true);
        assert_eq!(json["currentTime"], 1.25);
        assert_eq!(json["lastUpdated"], 42);
        assert_eq!(json["audioUrl"], "/uploads/track.mp3");
    }
}
