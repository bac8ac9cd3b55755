//! Optimizer trace sessions
//!
//! Ties the JSON writer to the lifetime of a statement:
//!
//! - [`TraceSession`]: begin/end nesting, retention of finished traces
//! - [`TraceRecord`]: one finished (or in-progress) trace document
//! - [`TraceObject`] / [`TraceArray`]: scoped containers closed on drop
//!
//! Scopes can be declared before any trace starts; they are queued and
//! opened, in declaration order, by the next outermost `begin`.

#![warn(clippy::all)]

mod pending;
mod record;
mod scope;
mod session;

pub use record::TraceRecord;
pub use scope::{TraceArray, TraceObject, TraceValue};
pub use session::{TraceSession, TraceStart, RETAINED_TRACES};
