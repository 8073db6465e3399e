//! # icnscarve-core
//!
//! A library for carving length-prefixed resources out of binary blobs.
//!
//! This crate provides the core functionality for:
//! - Scanning a byte buffer for a fixed 4-byte marker
//! - Decoding the big-endian length field that follows it
//! - Slicing each resource out, with bounds checks against truncated input
//!
//! The default marker is `icns`, which finds the Apple Icon Image resources
//! embedded in macOS keyboard layout bundles (`AppleKeyboardLayouts-L.dat`).
//!
//! ## Architecture
//!
//! - [`scanner`]: Marker search and chunk decoding
//! - [`extract`]: Extraction passes, sinks and progress reporting
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use icnscarve_core::{load_source, DirectorySink, Extractor, NullProgress};
//!
//! let buffer = load_source("AppleKeyboardLayouts-L.dat")?;
//! let sink = DirectorySink::create("./icons")?;
//!
//! let report = Extractor::new().run(&buffer, sink, NullProgress)?;
//! println!("{} icons extracted", report.chunks);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`ChunkSink`]: Decide where extracted chunks go
//! - [`Progress`]: Observe the cursor as a pass advances
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod extract;
pub mod scanner;

// Re-export primary types for convenience
pub use error::{ChunkError, Error, Result};
pub use extract::{
    artifact_file_name, extract_file, load_source, ChunkSink, Chunks, DirectorySink,
    ExtractionReport, Extractor, ExtractorConfig, MemorySink, NullProgress, NullSink, PassOutcome,
    Progress,
};
pub use scanner::{find_next, hex_preview, read_chunk, Chunk, Marker};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Location of the keyboard layout bundle on macOS
pub const DEFAULT_DATFILE: &str = "/System/Library/Keyboard Layouts/AppleKeyboardLayouts.bundle/Contents/Resources/AppleKeyboardLayouts-L.dat";
