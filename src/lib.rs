//! Shared playback synchronization.
//!
//! One authority process owns the playback record and fans out snapshots
//! over WebSockets; any number of observers reconcile a local playback
//! engine against the latest snapshot plus elapsed time.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod observer;
pub mod player;
pub mod state;
pub mod upload;
