//! Engine-consumable source graph.
//!
//! The session resolves client descriptors into these nodes and hands the root
//! to [`MediaEngine::set_source`](crate::engine::MediaEngine::set_source). Nodes
//! are immutable once built and shared through `Arc`, so the same asset can
//! appear several times in a graph (for example clipped twice) while remaining
//! a single node.
//!
//! All times inside the graph are microseconds, matching the descriptor
//! format the client sends.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// MIME type tagged on DASH nodes.
pub const MIME_TYPE_DASH: &str = "application/dash+xml";
/// MIME type tagged on HLS nodes.
pub const MIME_TYPE_HLS: &str = "application/x-mpegURL";

/// Sentinel for "until the end of the source" in clipping nodes.
pub const END_OF_SOURCE: i64 = i64::MIN;

/// HTTP parameters for network-backed sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpDataSourceSpec {
    pub user_agent: String,
    /// Request properties sent with every request, user agent excluded.
    pub request_properties: HashMap<String, String>,
    pub allow_cross_protocol_redirects: bool,
}

/// Container-extractor flags for progressive sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorOptions {
    pub constant_bitrate_seeking: bool,
    pub constant_bitrate_seeking_always: bool,
    pub mp3_flags: i32,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            constant_bitrate_seeking: true,
            constant_bitrate_seeking_always: false,
            mp3_flags: 0,
        }
    }
}

/// Variant-specific payload of a [`SourceNode`].
#[derive(Debug)]
pub enum SourceKind {
    Progressive {
        uri: String,
        http: HttpDataSourceSpec,
        extractor: ExtractorOptions,
    },
    Dash {
        uri: String,
        http: HttpDataSourceSpec,
        mime_type: &'static str,
    },
    Hls {
        uri: String,
        http: HttpDataSourceSpec,
        mime_type: &'static str,
    },
    Silence {
        duration_us: i64,
    },
    Clipping {
        child: Arc<SourceNode>,
        start_us: i64,
        /// [`END_OF_SOURCE`] when the clip runs to the end of its child.
        end_us: i64,
    },
    Concatenating {
        children: Vec<Arc<SourceNode>>,
        use_lazy_preparation: bool,
        shuffle_order: Vec<usize>,
    },
    Looping {
        child: Arc<SourceNode>,
        count: u32,
    },
}

/// A resolved source, tagged with the identifier of the descriptor it came from.
#[derive(Debug)]
pub struct SourceNode {
    pub id: String,
    pub kind: SourceKind,
}

impl SourceNode {
    pub fn new(id: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// Number of playable items this node contributes to a timeline.
    pub fn item_count(&self) -> usize {
        match &self.kind {
            SourceKind::Concatenating { children, .. } => {
                children.iter().map(|child| child.item_count()).sum()
            }
            SourceKind::Looping { child, count } => child.item_count() * (*count as usize),
            SourceKind::Clipping { child, .. } => child.item_count(),
            _ => 1,
        }
    }

    pub fn children(&self) -> Vec<&Arc<SourceNode>> {
        match &self.kind {
            SourceKind::Concatenating { children, .. } => children.iter().collect(),
            SourceKind::Looping { child, .. } | SourceKind::Clipping { child, .. } => vec![child],
            _ => Vec::new(),
        }
    }
}
