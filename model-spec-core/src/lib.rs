//! Shared model/provider spec types and resolvers.
//!
//! A [`ModelSpec`] describes the context/output token limits of one model id. The
//! gateway's context builder (`gateway::context`) uses it to size the sliding-window
//! truncation in `gateway::truncate`. Resolution is pluggable: a small built-in table
//! covers the common cases, a [`LocalFileResolver`] allows operators to override or add
//! entries without a rebuild, and [`CachedResolver`] avoids re-resolving on every
//! request.

mod cached;
mod composite;
mod local_file;
mod spec;
mod table;

pub use cached::CachedResolver;
pub use composite::CompositeResolver;
pub use local_file::LocalFileResolver;
pub use spec::ModelSpec;
pub use table::BuiltinTableResolver;

/// Resolves a unified model id to its context/output limits.
pub trait ModelLimitResolver: Send + Sync {
    fn resolve(&self, model_id: &str) -> Option<ModelSpec>;
}
