//! Document ingestion and context retrieval.
//!
//! - `Ingestor`: PDF / pasted text → chunks → embeddings → vector index
//! - `ContextRetriever`: query → top-k payloads from the live corpus
//! - `CorpusState`: which ingestions are currently searchable

mod chunker;
mod corpus;
mod ingest;
pub mod pdf;
mod retriever;

pub use chunker::{split_unit, DocumentChunk};
pub use corpus::{CorpusGeneration, CorpusSnapshot, CorpusState};
pub use ingest::{IngestOptions, IngestReport, Ingestor, PASTED_TEXT_SOURCE};
pub use pdf::{ensure_pdf, StagedUpload};
pub use retriever::ContextRetriever;
