//! Trace scopes
//!
//! [`TraceObject`] and [`TraceArray`] open a container when created and
//! close it when dropped. They can be declared unconditionally: with
//! tracing disabled they do nothing at all, and when declared before a
//! trace starts they register with the session and open once it does.
//!
//! ```
//! use optrace_config::TraceConfig;
//! use optrace_session::{TraceArray, TraceObject, TraceSession};
//!
//! let session = TraceSession::new(TraceConfig::new().enabled(true)).unwrap();
//! {
//!     let _trace = session.begin("select * from t1");
//!     let plan = TraceObject::new(&session);
//!     plan.add("table", "t1").add("rows", 100u64);
//!     let keys = TraceArray::named(&session, "possible_keys");
//!     keys.add("PRIMARY");
//! }
//! assert_eq!(
//!     session.records()[0].json(),
//!     "{\n  \"table\": \"t1\",\n  \"rows\": 100,\n  \"possible_keys\": [\"PRIMARY\"]\n}"
//! );
//! ```

use std::fmt;

use optrace_wire::JsonWriter;

use crate::pending::{ContainerKind, SlotId};
use crate::session::TraceSession;

/// How a scope is attached to its session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeHandle {
    /// Tracing disabled; the scope does nothing
    Inert,
    /// Container opened in trace `generation`
    Open { generation: u64 },
    /// Registered while idle; opens when a trace starts
    Pending(SlotId),
}

/// A scalar written into a trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceValue<'a> {
    Int(i64),
    UInt(u64),
    Double(f64),
    Bool(bool),
    Null,
    /// Escaped and quoted when written
    Str(&'a str),
    /// Pre-rendered JSON, written verbatim
    Raw(&'a str),
}

impl TraceValue<'_> {
    fn write_to(self, writer: &mut JsonWriter) {
        match self {
            TraceValue::Int(v) => writer.add_i64(v),
            TraceValue::UInt(v) => writer.add_u64(v),
            TraceValue::Double(v) => writer.add_double(v),
            TraceValue::Bool(v) => writer.add_bool(v),
            TraceValue::Null => writer.add_null(),
            TraceValue::Str(v) => writer.add_str(v),
            TraceValue::Raw(v) => writer.add_raw(v),
        }
    }
}

impl From<i64> for TraceValue<'_> {
    fn from(v: i64) -> Self {
        TraceValue::Int(v)
    }
}

impl From<i32> for TraceValue<'_> {
    fn from(v: i32) -> Self {
        TraceValue::Int(i64::from(v))
    }
}

impl From<u64> for TraceValue<'_> {
    fn from(v: u64) -> Self {
        TraceValue::UInt(v)
    }
}

impl From<u32> for TraceValue<'_> {
    fn from(v: u32) -> Self {
        TraceValue::UInt(u64::from(v))
    }
}

impl From<usize> for TraceValue<'_> {
    fn from(v: usize) -> Self {
        TraceValue::UInt(v as u64)
    }
}

impl From<f64> for TraceValue<'_> {
    fn from(v: f64) -> Self {
        TraceValue::Double(v)
    }
}

impl From<bool> for TraceValue<'_> {
    fn from(v: bool) -> Self {
        TraceValue::Bool(v)
    }
}

impl<'a> From<&'a str> for TraceValue<'a> {
    fn from(v: &'a str) -> Self {
        TraceValue::Str(v)
    }
}

impl<'a> From<&'a String> for TraceValue<'a> {
    fn from(v: &'a String) -> Self {
        TraceValue::Str(v)
    }
}

/// Shared open/close behavior of objects and arrays
#[derive(Debug)]
struct Scope<'s> {
    session: &'s TraceSession,
    kind: ContainerKind,
    handle: ScopeHandle,
}

impl<'s> Scope<'s> {
    fn open(session: &'s TraceSession, kind: ContainerKind, name: Option<&str>) -> Self {
        Scope {
            session,
            kind,
            handle: session.open_scope(kind, name),
        }
    }

    /// Trace generation this scope writes into, once it is open
    fn generation(&self) -> Option<u64> {
        match self.handle {
            ScopeHandle::Inert => None,
            ScopeHandle::Open { generation } => Some(generation),
            ScopeHandle::Pending(id) => self.session.realized_generation(id),
        }
    }

    fn write(&self, f: impl FnOnce(&mut JsonWriter)) {
        if let Some(generation) = self.generation() {
            self.session.write_in(generation, f);
        }
    }

    fn is_tracing(&self) -> bool {
        self.generation()
            .map_or(false, |generation| self.session.is_current(generation))
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        self.session.close_scope(self.kind, &self.handle);
    }
}

/// An object in the trace, closed when dropped
#[derive(Debug)]
pub struct TraceObject<'s> {
    scope: Scope<'s>,
}

impl<'s> TraceObject<'s> {
    /// Open an anonymous object, e.g. an element of an array
    pub fn new(session: &'s TraceSession) -> Self {
        TraceObject {
            scope: Scope::open(session, ContainerKind::Object, None),
        }
    }

    /// Open an object as the value of member `name`
    pub fn named(session: &'s TraceSession, name: &str) -> Self {
        TraceObject {
            scope: Scope::open(session, ContainerKind::Object, Some(name)),
        }
    }

    /// Add a member with a scalar value
    pub fn add<'v>(&self, key: &str, value: impl Into<TraceValue<'v>>) -> &Self {
        let value = value.into();
        self.scope.write(|w| {
            w.add_member(key);
            value.write_to(w);
        });
        self
    }

    /// Add a member whose value is `null`
    pub fn add_null(&self, key: &str) -> &Self {
        self.add(key, TraceValue::Null)
    }

    /// Add a member holding a byte count (`N`, `NKb` or `NMb`)
    pub fn add_size(&self, key: &str, bytes: i64) -> &Self {
        self.scope.write(|w| w.add_member(key).add_size(bytes));
        self
    }

    /// Add a member holding the text rendering of a domain object.
    ///
    /// Rendering only happens while a trace is being written.
    pub fn add_display(&self, key: &str, value: &dyn fmt::Display) -> &Self {
        self.scope.write(|w| w.add_member(key).add_str(&value.to_string()));
        self
    }

    /// True if writes through this scope reach a trace
    pub fn is_tracing(&self) -> bool {
        self.scope.is_tracing()
    }
}

/// An array in the trace, closed when dropped
#[derive(Debug)]
pub struct TraceArray<'s> {
    scope: Scope<'s>,
}

impl<'s> TraceArray<'s> {
    /// Open an anonymous array
    pub fn new(session: &'s TraceSession) -> Self {
        TraceArray {
            scope: Scope::open(session, ContainerKind::Array, None),
        }
    }

    /// Open an array as the value of member `name`
    pub fn named(session: &'s TraceSession, name: &str) -> Self {
        TraceArray {
            scope: Scope::open(session, ContainerKind::Array, Some(name)),
        }
    }

    /// Append a scalar
    pub fn add<'v>(&self, value: impl Into<TraceValue<'v>>) -> &Self {
        let value = value.into();
        self.scope.write(|w| value.write_to(w));
        self
    }

    /// Append `null`
    pub fn add_null(&self) -> &Self {
        self.add(TraceValue::Null)
    }

    /// Append the text rendering of a domain object
    pub fn add_display(&self, value: &dyn fmt::Display) -> &Self {
        self.scope.write(|w| w.add_str(&value.to_string()));
        self
    }

    /// True if writes through this scope reach a trace
    pub fn is_tracing(&self) -> bool {
        self.scope.is_tracing()
    }
}
