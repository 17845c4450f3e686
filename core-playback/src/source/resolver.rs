//! Descriptor to source-graph resolution.

use super::descriptor::{ProgressiveOptions, SourceDescriptor};
use crate::error::{Result, SessionError};
use bridge_traits::source::{
    ExtractorOptions, HttpDataSourceSpec, SourceKind, SourceNode, END_OF_SOURCE, MIME_TYPE_DASH,
    MIME_TYPE_HLS,
};
use core_runtime::logging::{redact_if_sensitive, strip_uri};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Resolved nodes of one session, keyed by descriptor id.
#[derive(Debug, Default)]
pub struct SourceCache {
    nodes: HashMap<String, Arc<SourceNode>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<SourceNode>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    fn insert(&mut self, node: Arc<SourceNode>) {
        self.nodes.insert(node.id.clone(), node);
    }
}

/// Turns descriptors into engine-ready nodes.
///
/// Resolution is memoized by id: a descriptor whose id is already in the cache
/// resolves to the cached node without looking at the rest of the
/// descriptor. Descriptor trees are expected to be acyclic.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    default_user_agent: String,
}

impl SourceResolver {
    pub fn new(default_user_agent: impl Into<String>) -> Self {
        Self {
            default_user_agent: default_user_agent.into(),
        }
    }

    pub fn resolve(
        &self,
        descriptor: &SourceDescriptor,
        cache: &mut SourceCache,
    ) -> Result<Arc<SourceNode>> {
        if let Some(node) = cache.get(descriptor.id()) {
            trace!(id = descriptor.id(), "source cache hit");
            return Ok(Arc::clone(node));
        }

        let kind = self.build(descriptor, cache)?;
        let node = Arc::new(SourceNode::new(descriptor.id(), kind));
        cache.insert(Arc::clone(&node));
        Ok(node)
    }

    fn build(&self, descriptor: &SourceDescriptor, cache: &mut SourceCache) -> Result<SourceKind> {
        let kind = match descriptor {
            SourceDescriptor::Progressive {
                uri,
                headers,
                options,
                ..
            } => {
                debug!(uri = %strip_uri(uri), "resolving progressive source");
                SourceKind::Progressive {
                    uri: uri.clone(),
                    http: self.http_spec(headers.as_ref()),
                    extractor: extractor_options(options.as_ref()),
                }
            }
            SourceDescriptor::Dash { uri, headers, .. } => SourceKind::Dash {
                uri: uri.clone(),
                http: self.http_spec(headers.as_ref()),
                mime_type: MIME_TYPE_DASH,
            },
            SourceDescriptor::Hls { uri, headers, .. } => SourceKind::Hls {
                uri: uri.clone(),
                http: self.http_spec(headers.as_ref()),
                mime_type: MIME_TYPE_HLS,
            },
            SourceDescriptor::Silence { id, duration } => {
                if *duration < 0 {
                    return Err(SessionError::InvalidDescriptor(format!(
                        "silence {} has negative duration",
                        id
                    )));
                }
                SourceKind::Silence {
                    duration_us: *duration,
                }
            }
            SourceDescriptor::Clipping {
                id,
                child,
                start,
                end,
            } => {
                let start_us = start.unwrap_or(0).max(0);
                let end_us = end.unwrap_or(END_OF_SOURCE);
                if end_us != END_OF_SOURCE && end_us < start_us {
                    return Err(SessionError::InvalidDescriptor(format!(
                        "clipping {} ends before it starts",
                        id
                    )));
                }
                SourceKind::Clipping {
                    child: self.resolve(child, cache)?,
                    start_us,
                    end_us,
                }
            }
            SourceDescriptor::Concatenating {
                id,
                children,
                use_lazy_preparation,
                shuffle_order,
            } => {
                validate_shuffle_order(id, shuffle_order, children.len())?;
                let children = children
                    .iter()
                    .map(|child| self.resolve(child, cache))
                    .collect::<Result<Vec<_>>>()?;
                SourceKind::Concatenating {
                    children,
                    use_lazy_preparation: *use_lazy_preparation,
                    shuffle_order: shuffle_order.clone(),
                }
            }
            SourceDescriptor::Looping { id, child, count } => {
                if *count == 0 {
                    return Err(SessionError::InvalidDescriptor(format!(
                        "looping {} must repeat at least once",
                        id
                    )));
                }
                SourceKind::Looping {
                    child: self.resolve(child, cache)?,
                    count: *count,
                }
            }
        };
        Ok(kind)
    }

    fn http_spec(&self, headers: Option<&HashMap<String, String>>) -> HttpDataSourceSpec {
        let mut request_properties = headers.cloned().unwrap_or_default();
        let user_agent = request_properties
            .remove("User-Agent")
            .or_else(|| request_properties.remove("user-agent"))
            .unwrap_or_else(|| self.default_user_agent.clone());
        for (name, value) in &request_properties {
            trace!(header = %name, value = %redact_if_sensitive(name, value), "request property");
        }

        HttpDataSourceSpec {
            user_agent,
            request_properties,
            allow_cross_protocol_redirects: true,
        }
    }
}

/// An empty order means "engine default"; anything else must be a
/// permutation of the children.
pub(crate) fn validate_shuffle_order(id: &str, order: &[usize], len: usize) -> Result<()> {
    if order.is_empty() {
        return Ok(());
    }
    let mut seen = vec![false; len];
    let is_permutation = order.len() == len
        && order
            .iter()
            .all(|&index| index < len && !std::mem::replace(&mut seen[index], true));
    if is_permutation {
        Ok(())
    } else {
        Err(SessionError::InvalidDescriptor(format!(
            "concatenating {} has an invalid shuffle order",
            id
        )))
    }
}

fn extractor_options(options: Option<&ProgressiveOptions>) -> ExtractorOptions {
    options
        .and_then(|options| options.android_extractor_options.as_ref())
        .map(|extractor| ExtractorOptions {
            constant_bitrate_seeking: extractor.constant_bitrate_seeking_enabled,
            constant_bitrate_seeking_always: extractor.constant_bitrate_seeking_always_enabled,
            mp3_flags: extractor.mp3_flags,
        })
        .unwrap_or_default()
}
