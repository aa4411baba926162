//! Resheet Core Library
//!
//! This crate provides the core functionality for resheet:
//! - Config parsing and up-front validation
//! - Input assembly: reshape, stack, and join source files into one dataset
//! - Output projection: slice the dataset into sheets and write artifacts
//! - Source/sink traits with CSV implementations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Configs   │────▶│  Assembly   │────▶│ Projection  │
//! │   (JSON)    │     │  → dataset  │     │  → sheets   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use resheet_core::config::{InputConfig, OutputConfig};
//! use resheet_core::connectors::{CsvSink, CsvSource};
//!
//! let input = InputConfig::load("input.json")?;
//! let output = OutputConfig::load("output.json")?;
//! let dataset = resheet_core::assemble(&input, &CsvSource::new("input_files"))?;
//! resheet_core::project(&output, &dataset, &mut CsvSink::new("output_files"))?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assemble;
pub mod config;
pub mod connectors;
pub mod error;
pub mod project;
pub mod table;

pub use assemble::assemble;
pub use config::{InputConfig, OutputConfig};
pub use error::{Error, Result};
pub use project::project;
pub use table::{Cell, Column, Table};
