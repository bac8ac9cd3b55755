//! Single-line compaction of short scalar arrays
//!
//! A member whose value is an array of scalars is usually more readable on
//! one line:
//!
//! ```text
//! "ranges": ["1 <= a <= 5", "a = 8"]
//! ```
//!
//! The writer cannot know in advance whether an array will stay short, so
//! [`LineCompactor`] buffers `add_member`, `start_array` and scalars
//! speculatively. Every writer entry point first offers its event here and
//! acts on the returned [`Verdict`]:
//!
//! | Verdict | Writer action |
//! |---------|---------------|
//! | `Handled` | nothing, the event was buffered |
//! | `Declined` | write the event normally |
//! | `Expand` | replay the backlog expanded, then write the event normally |
//! | `Collapse` | write the backlog on one line, the event is consumed |
//!
//! Buffered content is never dropped: any event the compactor cannot absorb
//! hands the backlog back for expanded replay first.

use smallvec::SmallVec;

/// Maximum projected width of a compacted line
pub const LINE_BUDGET: usize = 80;

/// Width of `"": [` and `]` around a compacted member name
const MEMBER_OVERHEAD: usize = 6;

/// Width added per quoted value: two quotes plus `, `
const QUOTED_OVERHEAD: usize = 4;

/// Width added per unquoted value: `, `
const UNQUOTED_OVERHEAD: usize = 2;

/// Compaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactState {
    /// Nothing buffered, waiting for a member
    Inactive,
    /// The last candidate was expanded; waits for the next member
    Disabled,
    /// A member name is buffered
    AddMember,
    /// A member name and the opening of its array are buffered
    InArray,
}

/// Outcome of offering one writer event to the compactor
#[derive(Debug, PartialEq)]
pub enum Verdict {
    /// The event was buffered
    Handled,
    /// The event must be written normally
    Declined,
    /// Replay the backlog expanded, then write the event normally
    Expand(Backlog),
    /// Write the backlog on one line; the event is consumed
    Collapse(Backlog),
}

impl Verdict {
    /// True if the writer must not write the event itself
    pub fn is_handled(&self) -> bool {
        matches!(self, Verdict::Handled | Verdict::Collapse(_))
    }
}

/// Buffered content: a member name, whether its array was opened, and the
/// textual forms of the scalars seen so far
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Backlog {
    text: String,
    member_len: Option<usize>,
    array_opened: bool,
    /// End offset into `text` and quoting of each buffered value
    values: SmallVec<[(usize, bool); 16]>,
}

impl Backlog {
    fn with_capacity(capacity: usize) -> Self {
        Backlog {
            text: String::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// The buffered member name, if any
    pub fn member(&self) -> Option<&str> {
        self.member_len.map(|len| &self.text[..len])
    }

    /// True if the member's array was opened
    pub fn array_opened(&self) -> bool {
        self.array_opened
    }

    /// Buffered values in arrival order, each with its quoting flag
    pub fn values(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        let mut start = self.member_len.unwrap_or(0);
        self.values.iter().map(move |&(end, quoted)| {
            let value = &self.text[start..end];
            start = end;
            (value, quoted)
        })
    }

    /// Number of buffered values
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// True if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.member_len.is_none() && self.values.is_empty()
    }

    fn clear(&mut self) {
        self.text.clear();
        self.member_len = None;
        self.array_opened = false;
        self.values.clear();
    }
}

/// Speculative buffer deciding between compact and expanded array layout
#[derive(Debug, Clone)]
pub struct LineCompactor {
    state: CompactState,
    backlog: Backlog,
    /// Projected width of the line being built
    line_len: usize,
}

impl Default for LineCompactor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCompactor {
    /// Create an inactive compactor
    pub fn new() -> Self {
        LineCompactor {
            state: CompactState::Inactive,
            backlog: Backlog::with_capacity(LINE_BUDGET),
            line_len: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> CompactState {
        self.state
    }

    /// Projected width of the buffered line
    pub fn line_len(&self) -> usize {
        self.line_len
    }

    /// Offer `add_member(name)`; `indent` is the writer's current indent
    pub fn on_add_member(&mut self, name: &str, indent: usize) -> Verdict {
        match self.state {
            CompactState::Inactive | CompactState::Disabled => {
                let projected = indent + name.len() + MEMBER_OVERHEAD;
                if projected > LINE_BUDGET {
                    self.state = CompactState::Inactive;
                    return Verdict::Declined;
                }
                self.backlog.text.push_str(name);
                self.backlog.member_len = Some(name.len());
                self.line_len = projected;
                self.state = CompactState::AddMember;
                Verdict::Handled
            }
            // A second member while one is buffered
            CompactState::AddMember | CompactState::InArray => self.expand(),
        }
    }

    /// Offer `start_array()`
    pub fn on_start_array(&mut self) -> Verdict {
        match self.state {
            CompactState::AddMember => {
                self.backlog.array_opened = true;
                self.state = CompactState::InArray;
                Verdict::Handled
            }
            // Nested arrays are never compacted
            CompactState::InArray => self.expand(),
            CompactState::Inactive | CompactState::Disabled => Verdict::Declined,
        }
    }

    /// Offer `start_object()`; nested objects are never compacted
    pub fn on_start_object(&mut self) -> Verdict {
        self.expand()
    }

    /// Offer a scalar in its textual form
    pub fn on_scalar(&mut self, text: &str, quoted: bool) -> Verdict {
        match self.state {
            CompactState::InArray => {
                let overhead = if quoted {
                    QUOTED_OVERHEAD
                } else {
                    UNQUOTED_OVERHEAD
                };
                let projected = self.line_len + text.len() + overhead;
                if projected > LINE_BUDGET {
                    return self.expand();
                }
                self.backlog.text.push_str(text);
                self.backlog.values.push((self.backlog.text.len(), quoted));
                self.line_len = projected;
                Verdict::Handled
            }
            // A member with a scalar value has nothing to compact
            CompactState::AddMember => self.expand(),
            CompactState::Inactive | CompactState::Disabled => Verdict::Declined,
        }
    }

    /// Offer `end_array()`
    pub fn on_end_array(&mut self) -> Verdict {
        match self.state {
            CompactState::InArray => {
                self.state = CompactState::Inactive;
                self.line_len = 0;
                Verdict::Collapse(self.take_backlog())
            }
            CompactState::AddMember => self.expand(),
            CompactState::Disabled => {
                self.state = CompactState::Inactive;
                Verdict::Declined
            }
            CompactState::Inactive => Verdict::Declined,
        }
    }

    /// Offer `end_object()`
    pub fn on_end_object(&mut self) -> Verdict {
        match self.state {
            CompactState::AddMember | CompactState::InArray => self.expand(),
            CompactState::Inactive | CompactState::Disabled => Verdict::Declined,
        }
    }

    /// Give up on the current candidate, handing back anything buffered
    pub fn flush(&mut self) -> Verdict {
        self.expand()
    }

    /// Return a backlog's storage once the writer has rendered it
    pub fn recycle(&mut self, mut backlog: Backlog) {
        debug_assert!(self.backlog.is_empty());
        backlog.clear();
        self.backlog = backlog;
    }

    fn expand(&mut self) -> Verdict {
        self.state = CompactState::Disabled;
        self.line_len = 0;
        if self.backlog.is_empty() {
            Verdict::Declined
        } else {
            Verdict::Expand(self.take_backlog())
        }
    }

    fn take_backlog(&mut self) -> Backlog {
        std::mem::take(&mut self.backlog)
    }
}
