//! Netforge Core - Configuration kernel
//!
//! This crate provides the foundational pieces for netforge, including:
//! - The in-memory configuration document model (sections, options, lists)
//! - The line-oriented text format codec (parse/emit, round-trip safe)
//! - Dotted-path addressing (`config.section.option`)
//! - Input validation primitives for network-facing values
//! - The canonical error taxonomy
//! - The structured logging facility
//!
//! No filesystem or process I/O happens in this crate.

pub mod codec;
pub mod errors;
pub mod logging;
pub mod model;
pub mod path;
pub mod validate;

// Re-export commonly used types
pub use codec::{emit, parse};
pub use errors::{Error, Result};
pub use model::{ConfigDocument, Section};
pub use path::ConfigPath;
