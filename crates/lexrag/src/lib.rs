//! # lexrag
//!
//! **Question answering over a legal document: load, chunk, embed, retrieve.**
//!
//! The retrieval core (segmentation, similarity index, error taxonomy)
//! lives in [`lexrag_core`]. This crate adds everything a deployment needs
//! around it: configuration, concrete embedding providers, PDF/text
//! extraction, per-document sessions, a CLI, and a JSON HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │  PDF / text  │──▶│  Segmenter   │──▶│ SimilarityIndex  │
//! │  (extract)   │   │ chapter/art. │   │ (one per session) │
//! └──────────────┘   └──────────────┘   └────────┬─────────┘
//!                                                │
//!                          ┌─────────────────────┤
//!                          ▼                     ▼
//!                     ┌──────────┐         ┌──────────┐
//!                     │   CLI    │         │   HTTP   │
//!                     │ (lexrag) │         │  server  │
//!                     └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lexrag chunks gdpr.pdf
//! lexrag search gdpr.pdf "When must a data breach be notified?" --top-k 5
//! lexrag serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`embedding`] | Embedding providers (hash, OpenAI, Ollama, local) |
//! | [`extract`] | Text extraction from PDF and plain text |
//! | [`session`] | Per-document sessions and the session registry |
//! | [`search`] | `chunks` and `search` CLI commands |
//! | [`server`] | JSON HTTP API |

pub mod config;
pub mod embedding;
pub mod extract;
pub mod search;
pub mod server;
pub mod session;

pub use lexrag_core;
