//! # Checkline Core Library
//!
//! Editing primitives for tasks written as markdown checklist lines
//! (`- [ ] Water plants #home [due:: 2024-03-04]`) or as whole documents
//! whose status and dates live in a YAML metadata block.
//!
//! ## Features
//!
//! - **Lossless Parsing**: checklist lines split into tags, inline
//!   `[key:: value]` annotations, content and block reference, and
//!   reconstructed in a canonical order with indentation kept verbatim
//! - **Edit Safety**: text edits are refused when the content is scattered
//!   between tokens or the new text would fuse with a tag
//! - **Recurrence**: `every 2 weeks`, `every monday`, `every weekday`, with
//!   completion spawning the next open occurrence
//! - **Recurrence Groups**: bulk status, schedule, text and delete operations
//!   over a parent document and its pre-created children
//! - **Pluggable Storage**: an async [`vault::Vault`] boundary with a
//!   filesystem implementation
//!
//! ## Core Modules
//!
//! - [`parser`], [`format`], [`analyzer`]: the checklist line grammar
//! - [`models`]: `TaskLine`, document metadata and the `TaskRecord` trait
//! - [`recurrence`]: rule parsing and next-occurrence arithmetic
//! - [`mutation`]: status, date and text edits on one record
//! - [`group`]: recurrence group discovery and bulk plans
//! - [`vault`], [`service`]: storage and read-modify-write orchestration
//! - [`status`], [`config`]: the injected status table and property names
//! - [`timezone`]: local-date helpers
//! - [`error`]: error types
//!
//! ## Example Usage
//!
//! ```rust
//! use checkline_core::config::CoreConfig;
//! use checkline_core::format::reconstruct_task_line;
//! use checkline_core::mutation::apply_status_transition;
//! use checkline_core::parser::parse_task_line;
//! use chrono::NaiveDate;
//!
//! let config = CoreConfig::default();
//! let task = parse_task_line("- [ ] Review budget [recurrence:: every week] [due:: 2024-03-04]").unwrap();
//! let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
//!
//! let result = apply_status_transition(&task, 'x', today, &config).unwrap();
//! assert_eq!(
//!     reconstruct_task_line(result.next().unwrap()),
//!     "- [ ] Review budget [recurrence:: every week] [due:: 2024-03-11]"
//! );
//! ```

pub mod analyzer;
pub mod config;
pub mod error;
pub mod format;
pub mod group;
pub mod models;
pub mod mutation;
pub mod parser;
pub mod recurrence;
pub mod service;
pub mod status;
pub mod timezone;
pub mod vault;
