//! Convenient imports for Optrace.
//!
//! ```
//! use optrace::prelude::*;
//!
//! let session = TraceSession::new(TraceConfig::default()).unwrap();
//! assert!(!session.is_enabled());
//! ```

// Session and scopes
pub use optrace_session::{TraceArray, TraceObject, TraceRecord, TraceSession, TraceStart};

// Settings
pub use optrace_config::TraceConfig;

// Error handling
pub use crate::error::{Error, Result};
