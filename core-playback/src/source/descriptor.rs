//! Client-facing source descriptors.

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Extractor options sent with progressive descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractorOptionsDescriptor {
    #[serde(default = "default_true")]
    pub constant_bitrate_seeking_enabled: bool,
    #[serde(default)]
    pub constant_bitrate_seeking_always_enabled: bool,
    #[serde(default)]
    pub mp3_flags: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressiveOptions {
    #[serde(default)]
    pub android_extractor_options: Option<ExtractorOptionsDescriptor>,
}

/// A possibly nested, serialized description of something playable.
///
/// Times are microseconds. Every node carries an `id` that is unique within
/// the tree; the resolver caches nodes by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum SourceDescriptor {
    Progressive {
        id: String,
        uri: String,
        #[serde(default)]
        headers: Option<HashMap<String, String>>,
        #[serde(default)]
        options: Option<ProgressiveOptions>,
    },
    Dash {
        id: String,
        uri: String,
        #[serde(default)]
        headers: Option<HashMap<String, String>>,
    },
    Hls {
        id: String,
        uri: String,
        #[serde(default)]
        headers: Option<HashMap<String, String>>,
    },
    Silence {
        id: String,
        duration: i64,
    },
    Clipping {
        id: String,
        child: Box<SourceDescriptor>,
        #[serde(default)]
        start: Option<i64>,
        #[serde(default)]
        end: Option<i64>,
    },
    Concatenating {
        id: String,
        children: Vec<SourceDescriptor>,
        #[serde(default)]
        use_lazy_preparation: bool,
        #[serde(default)]
        shuffle_order: Vec<usize>,
    },
    Looping {
        id: String,
        child: Box<SourceDescriptor>,
        count: u32,
    },
}

impl SourceDescriptor {
    /// Parse a descriptor received from the client.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| SessionError::InvalidDescriptor(e.to_string()))
    }

    pub fn id(&self) -> &str {
        match self {
            SourceDescriptor::Progressive { id, .. }
            | SourceDescriptor::Dash { id, .. }
            | SourceDescriptor::Hls { id, .. }
            | SourceDescriptor::Silence { id, .. }
            | SourceDescriptor::Clipping { id, .. }
            | SourceDescriptor::Concatenating { id, .. }
            | SourceDescriptor::Looping { id, .. } => id,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SourceDescriptor::Progressive { .. } => "progressive",
            SourceDescriptor::Dash { .. } => "dash",
            SourceDescriptor::Hls { .. } => "hls",
            SourceDescriptor::Silence { .. } => "silence",
            SourceDescriptor::Clipping { .. } => "clipping",
            SourceDescriptor::Concatenating { .. } => "concatenating",
            SourceDescriptor::Looping { .. } => "looping",
        }
    }
}

fn default_true() -> bool {
    true
}
