//! Retrieval-augmented answering.
//!
//! [`RagPipeline`] runs hybrid retrieval, [`ContextAssembler`] turns the
//! merged hits into a citation-labeled prompt, and the generation client
//! answers it.

pub mod ask;
pub mod context;
pub mod types;

pub use ask::RagPipeline;
pub use context::{ContextAssembler, PromptContext, TRUNCATION_MARKER};
pub use types::{GroundedRequest, Prepared, RagResponse, RetrievalOutcome, Timing, NO_RESULTS_MESSAGE};
