//! # Ragstore
//!
//! A document ingestion and vector retrieval engine for prompt augmentation.
//!
//! Ragstore turns uploaded documents (plain text, PDF, DOCX) into overlapping
//! text chunks, embeds them through a configurable provider, and serves
//! nearest-neighbor context for LLM prompts from a flat, file-backed vector
//! index.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────┐   ┌───────────┐   ┌─────────────┐
//! │ Extractor │──▶│ Chunker │──▶│ Embedding │──▶│ VectorStore │
//! │ txt/pdf/  │   │ overlap │   │ provider  │   │ flat index  │
//! │ docx      │   │ windows │   │ (HTTP)    │   │ + metadata  │
//! └───────────┘   └─────────┘   └───────────┘   └──────┬──────┘
//!                                                      │
//!                       query ──▶ embed ──▶ search ────┘
//!                                             │
//!                                             ▼
//!                                      context string
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rag init                          # create the index artifacts
//! rag ingest notes.pdf --doc-id 1   # extract, chunk, embed, persist
//! rag query "deployment checklist"  # print assembled context
//! rag status                        # record count and artifact paths
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Retrieval error taxonomy |
//! | [`extract`] | Content-sniffing text extraction |
//! | [`chunk`] | Word-boundary sliding-window chunker |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Flat vector index with parallel metadata |
//! | [`engine`] | Ingestion and retrieval orchestration |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod models;
pub mod store;
