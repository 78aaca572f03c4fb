//! Domain types for tagged events and the batches they are shipped in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single tagged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, e.g. "MainActivityCreated"
    pub name: String,

    /// Optional payload attached via `track_with_properties`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    /// When the event was tracked
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(name: impl Into<String>, value: Option<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp: Utc::now(),
        }
    }
}

/// Static description of the host the SDK runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInformation {
    pub sdk_version: String,
    pub os: String,
    pub arch: String,
}

impl DeviceInformation {
    /// Describe the current process
    pub fn current() -> Self {
        Self {
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Wire body POSTed to the collector endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Application the events belong to
    pub app_id: String,

    pub device_information: DeviceInformation,

    /// When the batch was generated
    pub timestamp: DateTime<Utc>,

    pub events: Vec<Event>,

    /// Sequence number, monotonic per tracker starting at 0
    pub number: u64,

    /// Consecutive failed dispatches before this attempt
    pub retries: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_identifier: Option<String>,
}
