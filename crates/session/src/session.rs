//! Trace session lifecycle
//!
//! A [`TraceSession`] belongs to one execution context (one request). It
//! owns the trace being written, if any, and a short history of finished
//! traces.
//!
//! ## States
//!
//! - Idle: begin/end counter at 0, no current record
//! - Active: counter > 0; a current record exists only if tracing is enabled
//!
//! `begin` always increments the counter so nesting stays balanced, but
//! only the outermost `begin` creates a record, and only the matching
//! outermost `end` finalizes it. Nested begin/end pairs share the record.
//!
//! ## Retention
//!
//! Finished records are appended to the history; once it holds more than
//! [`RETAINED_TRACES`] records the oldest is evicted.
//!
//! ## Single-threaded by construction
//!
//! A session is `!Sync` and scopes hold shared references to it, so exactly
//! one begin/end chain can be active. The nesting counter, the reset flag,
//! the history, the pending registry and the writer live in separate cells.
//! Holding the guard from [`TraceSession::current_writer`] therefore never
//! blocks `begin`, `reset` or a scope dropping: writes that would need the
//! writer meanwhile are skipped with a warning, and an outermost `end` that
//! finds the writer borrowed retires the record at the next `begin`.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::VecDeque;

use optrace_config::{ConfigError, TraceConfig};
use optrace_wire::JsonWriter;
use tracing::{debug, trace, warn};

use crate::pending::{ContainerKind, Deferred, PendingRegistry, SlotId};
use crate::record::TraceRecord;
use crate::scope::ScopeHandle;

/// Number of finished traces kept per session
pub const RETAINED_TRACES: usize = 2;

/// The trace being written
#[derive(Debug, Default)]
struct CurrentTrace {
    record: Option<TraceRecord>,
    /// Incremented for every record created
    generation: u64,
}

/// Per-request optimizer trace state
#[derive(Debug)]
pub struct TraceSession {
    config: TraceConfig,
    /// Reentrancy counter
    depth: Cell<usize>,
    /// Destroy the current record instead of retaining it
    discard_current: Cell<bool>,
    /// Finished records, oldest first
    history: RefCell<VecDeque<TraceRecord>>,
    pending: RefCell<PendingRegistry>,
    state: RefCell<CurrentTrace>,
}

impl TraceSession {
    /// Create an idle session
    pub fn new(config: TraceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(TraceSession {
            config,
            depth: Cell::new(0),
            discard_current: Cell::new(false),
            history: RefCell::new(VecDeque::new()),
            pending: RefCell::new(PendingRegistry::new()),
            state: RefCell::new(CurrentTrace::default()),
        })
    }

    /// The configuration the session was created with
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Begin a trace for `query`; the trace ends when the guard drops.
    ///
    /// Only the outermost call creates a record, and only if tracing is
    /// enabled. Scopes registered while idle are opened now, in the order
    /// they were declared.
    pub fn begin(&self, query: &str) -> TraceStart<'_> {
        let depth = self.depth.get() + 1;
        self.depth.set(depth);

        if depth == 1 && self.config.enabled {
            match self.state.try_borrow_mut() {
                Ok(mut state) => self.start_record(&mut state, query),
                Err(_) => warn!("previous trace writer still borrowed, trace not started"),
            }
        }

        TraceStart { session: self }
    }

    fn start_record(&self, state: &mut CurrentTrace, query: &str) {
        // An end that found the writer borrowed left its record behind
        if let Some(stale) = state.record.take() {
            self.retire(stale, state.generation);
        }

        state.generation += 1;
        let mut record = TraceRecord::new(query, self.config.writer_options());
        let realized = self
            .pending
            .borrow_mut()
            .realize_all(state.generation, record.document_mut());
        state.record = Some(record);
        debug!(
            generation = state.generation,
            query_len = query.len(),
            realized,
            "optimizer trace started"
        );
    }

    /// Finish one begin; the outermost finish finalizes the record
    fn end(&self) {
        let depth = self.depth.get();
        debug_assert!(depth > 0, "trace end without a matching begin");
        if depth == 0 {
            warn!("trace end without a matching begin ignored");
            return;
        }

        self.depth.set(depth - 1);
        if depth > 1 {
            return;
        }

        let taken = match self.state.try_borrow_mut() {
            Ok(mut state) => state.record.take().map(|record| (record, state.generation)),
            Err(_) => {
                warn!("trace writer still borrowed at trace end, record retired at next begin");
                return;
            }
        };
        match taken {
            Some((record, generation)) => self.retire(record, generation),
            None => self.discard_current.set(false),
        }
    }

    /// Move a finished record into history, or destroy it after a reset
    fn retire(&self, mut record: TraceRecord, generation: u64) {
        if self.discard_current.replace(false) {
            debug!(generation, "optimizer trace discarded");
            return;
        }

        record.finish();
        debug!(
            generation,
            bytes = record.json().len(),
            missing_bytes = record.missing_bytes_beyond_max_mem_size(),
            "optimizer trace finished"
        );
        let Ok(mut history) = self.history.try_borrow_mut() else {
            warn!(generation, "trace history borrowed, finished trace dropped");
            return;
        };
        history.push_back(record);
        while history.len() > RETAINED_TRACES {
            if let Some(evicted) = history.pop_front() {
                trace!(bytes = evicted.json().len(), "evicted oldest optimizer trace");
            }
        }
    }

    /// Drop all retained history.
    ///
    /// A trace in progress cannot be torn down while scopes may still write
    /// to it; it is destroyed instead of retained when its outermost begin
    /// ends. The writer is never touched, so a held writer stays usable.
    pub fn reset(&self) {
        match self.history.try_borrow_mut() {
            Ok(mut history) => history.clear(),
            Err(_) => warn!("trace history borrowed, reset left it in place"),
        }
        if self.depth.get() > 0 {
            self.discard_current.set(true);
        }
    }

    /// True if tracing is enabled in the configuration
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// True while a record is being written
    pub fn is_active(&self) -> bool {
        // A borrowed writer implies a record
        self.depth.get() > 0
            && self
                .state
                .try_borrow()
                .map_or(true, |state| state.record.is_some())
    }

    /// Current begin/end nesting depth
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Retained records, oldest first
    pub fn records(&self) -> Ref<'_, VecDeque<TraceRecord>> {
        self.history.borrow()
    }

    /// Query text of the trace in progress
    pub fn current_query(&self) -> Option<String> {
        if self.depth.get() == 0 {
            return None;
        }
        let state = self.state.try_borrow().ok()?;
        state.record.as_ref().map(|record| record.query().to_owned())
    }

    /// Writer of the trace in progress.
    ///
    /// `None` while idle, while disabled, or while another writer guard is
    /// alive.
    pub fn current_writer(&self) -> Option<RefMut<'_, JsonWriter>> {
        if self.depth.get() == 0 {
            return None;
        }
        let state = self.state.try_borrow_mut().ok()?;
        RefMut::filter_map(state, |state| {
            state.record.as_mut().map(TraceRecord::document_mut)
        })
        .ok()
    }

    /// Number of scope registrations waiting for a trace to start
    pub fn pending_scopes(&self) -> usize {
        self.pending.borrow().unrealized()
    }

    // =========================================================================
    // Scope plumbing
    // =========================================================================

    pub(crate) fn open_scope(&self, kind: ContainerKind, name: Option<&str>) -> ScopeHandle {
        if !self.config.enabled {
            return ScopeHandle::Inert;
        }
        if self.depth.get() > 0 {
            match self.state.try_borrow_mut() {
                Ok(mut state) => {
                    let generation = state.generation;
                    if let Some(record) = state.record.as_mut() {
                        kind.open(record.document_mut(), name);
                        return ScopeHandle::Open { generation };
                    }
                }
                Err(_) => {
                    warn!(container = ?kind, "trace writer borrowed, scope not traced");
                    return ScopeHandle::Inert;
                }
            }
        }
        ScopeHandle::Pending(self.pending.borrow_mut().register(Deferred {
            kind,
            name: name.map(str::to_owned),
        }))
    }

    pub(crate) fn close_scope(&self, kind: ContainerKind, handle: &ScopeHandle) {
        match *handle {
            ScopeHandle::Inert => {}
            ScopeHandle::Open { generation } => self.write_in(generation, |w| kind.close(w)),
            ScopeHandle::Pending(id) => {
                let released = self.pending.borrow_mut().release(id);
                if let Some((kind, generation)) = released {
                    self.write_in(generation, |w| kind.close(w));
                }
            }
        }
    }

    pub(crate) fn realized_generation(&self, id: SlotId) -> Option<u64> {
        self.pending.borrow().realized(id)
    }

    /// True while trace `generation` is the one being written
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.depth.get() > 0
            && self.state.try_borrow().map_or(false, |state| {
                state.generation == generation && state.record.is_some()
            })
    }

    /// Run `f` on the current writer if it belongs to trace `generation`
    pub(crate) fn write_in(&self, generation: u64, f: impl FnOnce(&mut JsonWriter)) {
        if self.depth.get() == 0 {
            return;
        }
        let Ok(mut state) = self.state.try_borrow_mut() else {
            warn!(generation, "trace writer borrowed, write skipped");
            return;
        };
        if state.generation != generation {
            return;
        }
        if let Some(record) = state.record.as_mut() {
            f(record.document_mut());
        }
    }
}

/// Guard for one `begin`; dropping it performs the matching `end`
#[must_use = "the trace ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TraceStart<'s> {
    session: &'s TraceSession,
}

impl TraceStart<'_> {
    /// True if a record is being written
    pub fn is_tracing(&self) -> bool {
        self.session.is_active()
    }

    /// End the trace now
    pub fn end(self) {}
}

impl Drop for TraceStart<'_> {
    fn drop(&mut self) {
        self.session.end();
    }
}
