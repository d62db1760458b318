use std::io;
use thiserror::Error;
use btleplug;
use serde_json;

use crate::protocol::layout::MAX_FRAME_LEN;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("No matching device appeared within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Failed to determine path to the address cache file")]
    NoCachePath,

    #[error("Error communicating with the bluetooth stack (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("Failed to read/write the address cache file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build the address cache file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No peripheral with the resolved address was found")]
    PeripheralNotFound,

    #[error("A required bluetooth characteristic is not available")]
    MissingCharacteristic,

    #[error("Establishing the connection took too long")]
    ConnectTimeout,

    #[error("Writing the configuration command took too long")]
    WriteTimeout,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("At least one sensor must be enabled")]
    EmptySelection,

    #[error("Selection produces a {frame_len} byte frame; the device supports at most {max}")]
    PayloadTooLarge { frame_len: usize, max: usize },
}

impl ConfigError {
    pub fn payload_too_large(frame_len: usize) -> Self {
        ConfigError::PayloadTooLarge { frame_len, max: MAX_FRAME_LEN }
    }
}

/// Recoverable decode failures. The decoder resets its reassembly buffer and
/// the stream resynchronizes on the next fragment; the session stays up.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Reassembly buffer overflow: expected a {expected} byte frame, received {received}")]
    FrameOverflow { expected: usize, received: usize },
}

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("Failed to write output record: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to serialize output record: {source}")]
    JsonError { #[from] source: serde_json::Error },

    #[error("Frame queue is closed; the receiving side went away")]
    QueueClosed,

    #[error("Consumer callback failed: {0}")]
    Callback(String),
}

/// Unexpected faults surfaced by [`crate::client::Databot::run`]. Expected
/// termination (a consumer returning Stop, cancellation, a dropped link) is
/// reported as a [`crate::client::StopReason`] value instead.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to resolve device address: {source}")]
    Discovery { #[from] source: DiscoveryError },

    #[error("Invalid sensor selection: {source}")]
    Config { #[from] source: ConfigError },

    #[error("Session failed: {source}")]
    Connection { #[from] source: ConnectionError },

    #[error("Consumer failed: {source}")]
    Consumer { #[from] source: ConsumerError },
}
