pub mod acquire;
pub mod batch;
pub mod descriptor;
pub mod extract;
pub mod merge;
pub mod pipeline;
pub mod resolver;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

#[cfg(test)]
mod pipeline_tests;

pub use batch::{BatchOptions, BatchReport, ItemResult};
pub use pipeline::{
    EnrichOptions, EnrichReport, Enricher, ItemOutcome, PreviewReport, ResolveReport,
};
