//! Quarry - Document Chunking & Hybrid Retrieval
//!
//! Splits ingested documents into semantically coherent, overlapping chunks
//! and retrieves them through three concurrent strategies (vector, keyword,
//! concept) whose candidates are fused, reranked, and diversity-capped into
//! a single ranked response.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod retrieval;
pub mod segmenter;
pub mod storage;

pub use error::{QuarryError, Result};
