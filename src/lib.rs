//! srt2rag - Subtitle to knowledge-base text conversion
//!
//! Strips timing and cue numbers from SRT files, sends the text through an
//! ordered list of LLM providers with retry and fallback, and writes one
//! cleaned, titled text file per subtitle for RAG ingestion.

pub mod cli;
pub mod config;
pub mod error;
pub mod subtitle;
pub mod chunk;
pub mod pacing;
pub mod provider;
pub mod dispatch;
pub mod pipeline;
pub mod session;
pub mod workflow;
