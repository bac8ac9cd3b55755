//! Incremental JSON writing for trace documents
//!
//! - `sink`: append-only output with a memory limit
//! - `encode`: textual forms of scalars
//! - `compact`: speculative one-line rendering of short scalar arrays
//! - `writer`: the document state machine tying them together

mod compact;
mod encode;
mod sink;
mod writer;

pub use compact::{Backlog, CompactState, LineCompactor, Verdict, LINE_BUDGET};
pub use encode::{escape, format_double, format_size};
pub use sink::OutputBuffer;
pub use writer::{JsonWriter, WriterOptions, DEFAULT_MAX_MEM_SIZE, INDENT_STEP};
