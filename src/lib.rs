//! # Context Library
//!
//! A document library with lexical search, plus retrieval-augmented answers
//! drawn from a pluggable vector store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────────────┐
//! │   Library    │──▶│   Indexer   │──▶│     Vector store     │
//! │ lexical idx  │   │   (embed)   │   │ memory/pg/mongodb    │
//! └──────┬───────┘   └─────────────┘   └──────────┬───────────┘
//!        │ durable                                │ retrieve
//!        ▼                                        ▼
//! ┌──────────────┐                      ┌──────────────────────┐
//! │ JSON files   │                      │   ContextService     │
//! │ <id>.json    │                      │ filter, budget, LLM  │
//! └──────────────┘                      └──────────────────────┘
//! ```
//!
//! Pure logic (documents, traits, context assembly, in-memory backends)
//! lives in `context-library-core`; this crate adds the filesystem store,
//! networked backends, HTTP providers, configuration, and the `ctxlib` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`fs_store`] | One-JSON-file-per-document store |
//! | [`library`] | Lexical index over a document store |
//! | [`vector_store`] | Vector backend factory |
//! | [`vector_pg`] | PostgreSQL + pgvector backend |
//! | [`vector_mongo`] | MongoDB Atlas vector search backend |
//! | [`embedding`] | OpenAI / Ollama / local embedding providers |
//! | [`completion`] | OpenAI / Anthropic / Ollama completion providers |
//! | [`service`] | Retrieval-augmented answering |
//! | [`ingest`] | Bulk indexing of library documents |

pub mod completion;
pub mod config;
pub mod embedding;
pub mod fs_store;
mod http;
pub mod ingest;
pub mod library;
pub mod service;
pub mod vector_mongo;
pub mod vector_pg;
pub mod vector_store;
