//! # jacques-core
//!
//! Core library for jacques - a transcript reconstruction and archival
//! engine for externally captured AI-assistant session logs.
//!
//! This library provides:
//! - Domain types for log entries, conversations, and manifests
//! - Deterministic reconstruction of conversations from append-only logs
//! - Named filter policies with token-savings estimation
//! - A SQLite-backed manifest catalog with cross-session statistics
//! - Batch archival with progress reporting and cooperative cancellation
//!
//! ## Pipeline
//!
//! Data flows left to right:
//! - **Capture:** JSONL transcripts written by session hooks (immutable)
//! - **Reconstruction:** entries folded into ordered conversation messages
//! - **Archive:** filtered conversations summarized into catalog manifests
//!
//! ## Example
//!
//! ```rust,no_run
//! use jacques_core::{reconstruct, transcript::read_transcript, FilterPolicy};
//!
//! let read = read_transcript("session.jsonl".as_ref()).expect("failed to read transcript");
//! let messages = reconstruct(&read.entries);
//! let trimmed = jacques_core::filter::apply(FilterPolicy::WithoutTools, &messages);
//! println!("{} messages after filtering", trimmed.len());
//! ```

// Re-export commonly used items at the crate root
pub use archive::{ArchiveCoordinator, ArchiveOptions, ArchiveResult};
pub use catalog::Catalog;
pub use config::Config;
pub use error::{Error, Result};
pub use filter::FilterPolicy;
pub use reconstruct::reconstruct;
pub use stats::ProjectStats;
pub use types::*;

// Public modules
pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod reconstruct;
pub mod stats;
pub mod transcript;
pub mod types;
