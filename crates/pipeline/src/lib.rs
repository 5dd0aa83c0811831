//! Query → table → artifact: the unload batch pipeline.
//!
//! For each configured query: submit to Athena, wait for the result,
//! materialize it, apply the transform, stamp `loaddts`, encode in the
//! configured format and write it to the destination bucket.

pub mod artifact;
pub mod error;
pub mod orchestrator;
pub mod query_source;
pub mod services;
pub mod transform;

pub use artifact::ArtifactKey;
pub use error::PipelineError;
pub use orchestrator::{ItemOutcome, ItemReport, PipelineOrchestrator, PlannedItem, RunSummary, Stage};
pub use query_source::{DirectoryQuerySource, QuerySource, StaticQuerySource};
pub use services::{execute, RunServices};
