//! # Optrace
//!
//! Human-readable JSON traces of query optimizer decisions.
//!
//! A trace is written incrementally while the optimizer runs: containers are
//! opened and closed as planning steps begin and end, and scalars are appended
//! as decisions are made. Nothing is materialized as a value tree.
//!
//! ## Quick Start
//!
//! ```
//! use optrace::prelude::*;
//!
//! # fn main() -> optrace::Result<()> {
//! let session = TraceSession::new(TraceConfig::new().enabled(true))?;
//! {
//!     let _trace = session.begin("SELECT a FROM t1 WHERE b > 3");
//!     let plan = TraceObject::new(&session);
//!     plan.add("select_id", 1);
//!     let keys = TraceArray::named(&session, "usable_keys");
//!     keys.add("PRIMARY").add("idx_b");
//! }
//!
//! let records = session.records();
//! assert_eq!(records[0].query(), "SELECT a FROM t1 WHERE b > 3");
//! assert_eq!(
//!     records[0].json(),
//!     "{\n  \"select_id\": 1,\n  \"usable_keys\": [\"PRIMARY\", \"idx_b\"]\n}"
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - [`optrace_wire`]: the JSON writer and line compaction
//! - [`optrace_config`]: trace settings
//! - [`optrace_session`]: begin/end lifecycle, retention, trace scopes
//!
//! Tracing disabled costs one branch per scope: scopes created against a
//! disabled session never touch a writer.

#![warn(missing_docs)]

mod error;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use optrace_config::{ConfigError, TraceConfig};
pub use optrace_session::{
    TraceArray, TraceObject, TraceRecord, TraceSession, TraceStart, TraceValue, RETAINED_TRACES,
};
pub use optrace_wire::{JsonWriter, WriterOptions};

/// Create a session from `config`, validating it first.
pub fn session(config: TraceConfig) -> Result<TraceSession> {
    Ok(TraceSession::new(config)?)
}
