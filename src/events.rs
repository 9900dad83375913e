//! Wire protocol between the authority and its observers.
//!
//! JSON over WebSocket text frames. Commands carry the position the client
//! observed locally at the instant of the action; the authority never
//! measures positions from the network.

use serde::{Deserialize, Deserializer, Serialize};

use crate::state::PlaybackState;

/// Observer -> authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Play {
        #[serde(
            rename = "currentTime",
            default,
            deserialize_with = "lenient_seconds"
        )]
        current_time: Option<f64>,
    },
    Pause {
        #[serde(
            rename = "currentTime",
            default,
            deserialize_with = "lenient_seconds"
        )]
        current_time: Option<f64>,
    },
    /// Resynchronization request; answered with a snapshot to the requester
    /// only, never broadcast.
    RequestState,
}

/// Authority -> observer. The only message is a full snapshot; observers
/// replace their cached state wholesale rather than merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    State { state: PlaybackState },
}

/// Accepts any JSON value and keeps it only when it is a number. A client
/// sending `"currentTime": "3"` gets the position-defaulting treatment
/// downstream instead of having the whole command rejected.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}
