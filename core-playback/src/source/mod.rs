//! # Source Graph
//!
//! Client descriptors and their resolution into the engine's source graph.
//!
//! ## Overview
//!
//! - [`SourceDescriptor`] is the tagged tree the client sends with `load`
//! - [`SourceResolver`] turns it into shared [`SourceNode`]s
//! - [`SourceCache`] memoizes nodes by descriptor id for the lifetime of the
//!   session, so a later `set_shuffle_order` can find the concatenating node
//!   a descriptor refers to
//!
//! [`SourceNode`]: bridge_traits::source::SourceNode

pub mod descriptor;
pub mod resolver;

pub use descriptor::{ExtractorOptionsDescriptor, ProgressiveOptions, SourceDescriptor};
pub use resolver::{SourceCache, SourceResolver};
pub(crate) use resolver::validate_shuffle_order;
