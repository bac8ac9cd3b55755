//! Incremental JSON writer for optimizer traces
//!
//! This crate renders human-readable JSON one call at a time, without ever
//! materializing a value tree. It is built for diagnostic traces written on
//! the hot path of query optimization:
//!
//! - [`JsonWriter`]: nesting stack, separators, indentation, end markers
//! - [`LineCompactor`]: renders short scalar arrays on a single line
//! - [`OutputBuffer`]: append-only sink that truncates at a memory limit
//!
//! ## Layout Rules
//!
//! | Option | Effect |
//! |--------|--------|
//! | default | one element per line, two spaces per nesting level |
//! | `one_line` | no newlines or indentation anywhere |
//! | `end_marker` | `} /* a, b */` after containers that held members |
//!
//! End markers are comments and therefore not standard JSON; they are meant
//! for humans reading a trace.
//!
//! ## Examples
//!
//! ```
//! use optrace_wire::{JsonWriter, WriterOptions};
//!
//! let mut writer = JsonWriter::new(WriterOptions::default());
//! writer.start_object();
//! writer.add_member("rows").add_u64(10);
//! writer.add_member("keys").start_array();
//! writer.add_str("PRIMARY");
//! writer.add_str("idx_a");
//! writer.end_array();
//! writer.end_object();
//!
//! assert_eq!(
//!     writer.output(),
//!     "{\n  \"rows\": 10,\n  \"keys\": [\"PRIMARY\", \"idx_a\"]\n}"
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod json;

// Re-export main types
pub use json::{
    escape, format_double, format_size, Backlog, CompactState, JsonWriter, LineCompactor,
    OutputBuffer, Verdict, WriterOptions, DEFAULT_MAX_MEM_SIZE, INDENT_STEP, LINE_BUDGET,
};
