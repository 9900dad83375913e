//! The authority: single owner of the playback record.
//!
//! Commands mutate the record under one short write-lock section, and the
//! updated record is pushed into a watch channel strictly afterwards, so
//! every connection task observes transitions in the order they were
//! applied. Last writer wins; racing commands from two clients converge to
//! whichever reaches the authority last, and no conflict is surfaced.

use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::debug;

use crate::events::ClientCommand;
use crate::state::{extrapolate, PlaybackState};

pub type PlayerHandle = Arc<RwLock<Player>>;

pub struct Player {
    state: PlaybackState,
    changes: watch::Sender<PlaybackState>,
}

impl Player {
    pub fn new(now_ms: u64) -> Self {
        let state = PlaybackState::new(now_ms);
        let (changes, _) = watch::channel(state.clone());
        Self { state, changes }
    }

    pub fn into_handle(self) -> PlayerHandle {
        Arc::new(RwLock::new(self))
    }

    /// Loading new media always restarts paused at zero, discarding any
    /// in-flight play/pause race.
    pub fn load_media(&mut self, url: String, now_ms: u64) {
        debug!(%url, "media changed, playback reset");
        self.state = PlaybackState {
            is_playing: false,
            current_time: 0.0,
            last_updated: now_ms,
            audio_url: Some(url),
        };
        self.publish();
    }

    /// Marks playback running from the client-observed position. Applied
    /// even while no media is loaded; the record then just carries position
    /// bookkeeping for when media arrives.
    pub fn play(&mut self, at: Option<f64>, now_ms: u64) {
        self.state = PlaybackState {
            is_playing: true,
            current_time: normalize_position(at),
            last_updated: now_ms,
            audio_url: self.state.audio_url.clone(),
        };
        self.publish();
    }

    /// Freezes playback at the client-observed position.
    pub fn pause(&mut self, at: Option<f64>, now_ms: u64) {
        self.state = PlaybackState {
            is_playing: false,
            current_time: normalize_position(at),
            last_updated: now_ms,
            audio_url: self.state.audio_url.clone(),
        };
        self.publish();
    }

    /// Applies one state-mutating command. `RequestState` never mutates and
    /// is answered at the connection layer, so it is a no-op here.
    pub fn apply(&mut self, command: ClientCommand, now_ms: u64) {
        match command {
            ClientCommand::Play { current_time } => self.play(current_time, now_ms),
            ClientCommand::Pause { current_time } => self.pause(current_time, now_ms),
            ClientCommand::RequestState => {}
        }
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.state.clone()
    }

    /// Live position extrapolated from the record.
    pub fn position(&self, now_ms: u64) -> f64 {
        extrapolate(&self.state, now_ms)
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.changes.subscribe()
    }

    fn publish(&self) {
        self.changes.send_replace(self.state.clone());
    }
}

/// Missing, non-finite and negative positions all collapse to zero rather
/// than rejecting the command.
fn normalize_position(at: Option<f64>) -> f64 {
    match at {
        Some(position) if position.is_finite() && position >= 0.0 => position,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let player = Player::new(100);
        assert_eq!(player.snapshot(), PlaybackState::new(100));
    }

    #[test]
    fn load_media_resets_to_paused_zero() {
        let mut player = Player::new(0);
        player.play(Some(42.0), 500);
        player.load_media("/uploads/next.mp3".to_string(), 1_000);

        let state = player.snapshot();
        assert!(!state.is_playing);
        assert_eq!(state.current_time, 0.0);
        assert_eq!(state.last_updated, 1_000);
        assert_eq!(state.audio_url.as_deref(), Some("/uploads/next.mp3"));
        assert_eq!(player.position(5_000), 0.0);
    }

    #[test]
    fn play_normalizes_bad_positions() {
        let mut player = Player::new(0);
        player.play(None, 10);
        assert_eq!(player.snapshot().current_time, 0.0);
        player.play(Some(f64::NAN), 20);
        assert_eq!(player.snapshot().current_time, 0.0);
        player.play(Some(-3.0), 30);
        assert_eq!(player.snapshot().current_time, 0.0);
        player.play(Some(6.5), 40);
        assert_eq!(player.snapshot().current_time, 6.5);
    }

    #[test]
    fn pause_twice_differs_only_in_timestamp() {
        let mut player = Player::new(0);
        player.load_media("/uploads/x.mp3".to_string(), 0);
        player.pause(Some(5.0), 100);
        let first = player.snapshot();
        player.pause(Some(5.0), 200);
        let second = player.snapshot();

        assert_eq!(first.is_playing, second.is_playing);
        assert_eq!(first.current_time, second.current_time);
        assert_eq!(first.audio_url, second.audio_url);
        assert_eq!(second.last_updated, 200);
    }

    #[test]
    fn commands_without_media_still_update_bookkeeping() {
        let mut player = Player::new(0);
        player.apply(
            ClientCommand::Play {
                current_time: Some(2.0),
            },
            50,
        );

        let state = player.snapshot();
        assert!(state.is_playing);
        assert_eq!(state.current_time, 2.0);
        assert_eq!(state.audio_url, None);
    }

    #[test]
    fn request_state_does_not_mutate() {
        let mut player = Player::new(0);
        player.load_media("/uploads/x.mp3".to_string(), 10);
        let before = player.snapshot();
        player.apply(ClientCommand::RequestState, 99);
        assert_eq!(player.snapshot(), before);
    }

    #[tokio::test]
    async fn transitions_are_published_in_order() {
        let mut player = Player::new(0);
        let mut changes = player.subscribe();

        player.load_media("/uploads/x.mp3".to_string(), 100);
        changes.changed().await.unwrap();
        assert_eq!(
            changes.borrow_and_update().audio_url.as_deref(),
            Some("/uploads/x.mp3")
        );

        player.play(Some(3.0), 1_000);
        changes.changed().await.unwrap();
        let state = changes.borrow_and_update().clone();
        assert!(state.is_playing);
        assert_eq!(state.current_time, 3.0);
        assert_eq!(state.last_updated, 1_000);
    }
}
