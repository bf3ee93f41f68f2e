//! Collaborator interfaces the engine depends on, plus in-memory
//! implementations for tests and headless embedding.

pub mod memory;
mod traits;

pub use traits::{
	DocumentFetcher, ErrorReporter, HistoryHost, MetadataSink, ModuleHost, NullMetadata,
	PopHandler, RenderSurface, ResourceArtifact, ResourceHost, StateStore, TracingReporter,
};
