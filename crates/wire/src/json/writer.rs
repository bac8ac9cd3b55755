//! Incremental JSON document writer
//!
//! [`JsonWriter`] is a state machine over a stack of container frames. It
//! never builds a value tree: every call appends to the output immediately,
//! except for the speculative buffering done by the [`LineCompactor`].
//!
//! ## Frames
//!
//! The frame stack always holds a document-level frame at the bottom, so
//! `depth() == frames.len() - 1`. Each frame records whether its first child
//! is still to come and, when end markers are enabled, where its member
//! names begin in the shared name arena.
//!
//! ## Contract violations
//!
//! Closing a container that is not open, writing a scalar with no member
//! name outside an array, or naming a member twice are caller bugs. They
//! trip `debug_assert!` in debug builds; release builds log a warning and
//! take the fallback that keeps already-written bytes intact.

use smallvec::SmallVec;
use tracing::warn;

use super::compact::{Backlog, CompactState, LineCompactor, Verdict};
use super::encode::{escape, format_double, format_size};
use super::sink::OutputBuffer;

/// Indentation added per nesting level
pub const INDENT_STEP: usize = 2;

/// Default memory limit for a document (1 MiB)
pub const DEFAULT_MAX_MEM_SIZE: usize = 1024 * 1024;

const SPACES: &str = "                                ";

/// Layout options fixed for the lifetime of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Emit no newlines or indentation
    pub one_line: bool,
    /// Append `/* names */` after containers that held members
    pub end_marker: bool,
    /// Bytes kept before output is truncated
    pub max_mem_size: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            one_line: false,
            end_marker: false,
            max_mem_size: DEFAULT_MAX_MEM_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Document,
    Object,
    Array,
}

impl FrameKind {
    fn close_bracket(self) -> &'static str {
        match self {
            FrameKind::Object => "}",
            FrameKind::Array => "]",
            FrameKind::Document => "",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    first_child: bool,
    /// Offset into the member name arena where this frame's names begin
    names_start: usize,
}

impl Frame {
    fn new(kind: FrameKind, names_start: usize) -> Self {
        Frame {
            kind,
            first_child: true,
            names_start,
        }
    }
}

/// Streaming JSON writer for one trace document
#[derive(Debug, Clone)]
pub struct JsonWriter {
    output: OutputBuffer,
    one_line: bool,
    end_marker: bool,
    frames: SmallVec<[Frame; 16]>,
    /// Member names of all open frames, `, `-separated, used for end markers
    member_names: String,
    indent_level: usize,
    /// A member name was written and its value has not been
    member_pending: bool,
    document_start: bool,
    compactor: LineCompactor,
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::new(WriterOptions::default())
    }
}

impl JsonWriter {
    /// Create an empty document
    pub fn new(options: WriterOptions) -> Self {
        let mut frames = SmallVec::new();
        frames.push(Frame::new(FrameKind::Document, 0));
        JsonWriter {
            output: OutputBuffer::with_limit(options.max_mem_size),
            one_line: options.one_line,
            end_marker: options.end_marker,
            frames,
            member_names: String::new(),
            indent_level: 0,
            member_pending: false,
            document_start: true,
            compactor: LineCompactor::new(),
        }
    }

    // =========================================================================
    // Containers
    // =========================================================================

    /// Open an object
    pub fn start_object(&mut self) {
        let verdict = self.compactor.on_start_object();
        if self.settle(verdict) {
            return;
        }
        self.open(FrameKind::Object, "{");
    }

    /// Close the innermost object
    pub fn end_object(&mut self) {
        let verdict = self.compactor.on_end_object();
        if self.settle(verdict) {
            return;
        }
        self.close(FrameKind::Object);
    }

    /// Open an array
    pub fn start_array(&mut self) {
        let verdict = self.compactor.on_start_array();
        if self.settle(verdict) {
            return;
        }
        self.open(FrameKind::Array, "[");
    }

    /// Close the innermost array
    pub fn end_array(&mut self) {
        let verdict = self.compactor.on_end_array();
        if self.settle(verdict) {
            return;
        }
        self.close(FrameKind::Array);
    }

    /// Name the next value of the innermost object
    pub fn add_member(&mut self, name: &str) -> &mut Self {
        // Misplaced names bypass compaction so the member checks still apply
        if self.compactor_idle() && (self.member_pending || self.in_array()) {
            self.write_member(name);
            return self;
        }
        let verdict = self.compactor.on_add_member(name, self.indent_level);
        if !self.settle(verdict) {
            self.write_member(name);
        }
        self
    }

    // =========================================================================
    // Scalars
    // =========================================================================

    /// Write a signed integer
    pub fn add_i64(&mut self, value: i64) {
        self.add_text(&value.to_string(), false);
    }

    /// Write an unsigned integer
    pub fn add_u64(&mut self, value: u64) {
        self.add_text(&value.to_string(), false);
    }

    /// Write a double; non-finite values are written as quoted names
    pub fn add_double(&mut self, value: f64) {
        self.add_text(&format_double(value), !value.is_finite());
    }

    /// Write a boolean
    pub fn add_bool(&mut self, value: bool) {
        self.add_text(if value { "true" } else { "false" }, false);
    }

    /// Write `null`
    pub fn add_null(&mut self) {
        self.add_text("null", false);
    }

    /// Write a string, escaping it
    pub fn add_str(&mut self, value: &str) {
        self.add_text(&escape(value), true);
    }

    /// Write pre-rendered text verbatim, unquoted
    pub fn add_raw(&mut self, text: &str) {
        self.add_text(text, false);
    }

    /// Write a byte count as a quoted `N`, `NKb` or `NMb` string
    pub fn add_size(&mut self, bytes: i64) {
        self.add_text(&format_size(bytes), true);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// The document written so far
    pub fn output(&self) -> &str {
        self.output.as_str()
    }

    /// Bytes dropped because the document exceeded its memory limit
    pub fn missing_bytes(&self) -> usize {
        self.output.missing_bytes()
    }

    /// Current nesting depth; 0 at document level
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// True if every opened container has been closed
    pub fn is_balanced(&self) -> bool {
        self.depth() == 0 && !self.member_pending && self.compactor_idle()
    }

    /// Render anything still held back for compaction, in expanded form
    pub fn finish(&mut self) {
        let verdict = self.compactor.flush();
        self.settle(verdict);
    }

    /// Consume the writer and return the document text
    pub fn into_output(mut self) -> String {
        self.finish();
        self.output.into_string()
    }

    fn compactor_idle(&self) -> bool {
        matches!(
            self.compactor.state(),
            CompactState::Inactive | CompactState::Disabled
        )
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Carry out a compaction verdict; returns true if the event was consumed
    fn settle(&mut self, verdict: Verdict) -> bool {
        match verdict {
            Verdict::Handled => true,
            Verdict::Declined => false,
            Verdict::Expand(backlog) => {
                self.replay(&backlog);
                self.compactor.recycle(backlog);
                false
            }
            Verdict::Collapse(backlog) => {
                self.write_collapsed(&backlog);
                self.compactor.recycle(backlog);
                true
            }
        }
    }

    /// Write buffered calls the way they would have been written uncompacted
    fn replay(&mut self, backlog: &Backlog) {
        if let Some(name) = backlog.member() {
            self.write_member(name);
        }
        if backlog.array_opened() {
            self.open(FrameKind::Array, "[");
        }
        for (text, quoted) in backlog.values() {
            self.write_scalar(text, quoted);
        }
    }

    /// Write `"name": [v1, v2]` as one line
    fn write_collapsed(&mut self, backlog: &Backlog) {
        self.separate();
        if let Some(name) = backlog.member() {
            self.record_member(name);
            self.push_member_name(name);
        }
        self.output.push('[');
        for (i, (text, quoted)) in backlog.values().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.push_value(text, quoted);
        }
        self.output.push(']');
    }

    fn add_text(&mut self, text: &str, quoted: bool) {
        let verdict = self.compactor.on_scalar(text, quoted);
        if self.settle(verdict) {
            return;
        }
        self.write_scalar(text, quoted);
    }

    fn in_array(&self) -> bool {
        self.innermost().kind == FrameKind::Array
    }

    fn write_member(&mut self, name: &str) {
        let in_array = self.in_array();
        debug_assert!(!in_array, "member `{}` added inside an array", name);
        if in_array {
            warn!(member = name, "member added inside an array, name dropped");
            return;
        }

        debug_assert!(
            !self.member_pending,
            "member `{}` added while the previous member has no value",
            name
        );
        if self.member_pending {
            warn!(member = name, "previous member has no value, writing null");
            self.output.push_str("null");
            self.member_pending = false;
        }

        self.separate();
        self.record_member(name);
        self.push_member_name(name);
        self.member_pending = true;
    }

    fn write_scalar(&mut self, text: &str, quoted: bool) {
        if !self.begin_value() {
            warn!(value = text, "value without a member name outside an array dropped");
            return;
        }
        self.push_value(text, quoted);
    }

    fn open(&mut self, kind: FrameKind, bracket: &str) {
        if !self.begin_value() {
            // A container cannot be dropped without unbalancing later closes
            warn!(container = ?kind, "container opened without a member name");
            self.separate();
        }
        self.output.push_str(bracket);
        self.indent_level += INDENT_STEP;
        self.frames.push(Frame::new(kind, self.member_names.len()));
        self.document_start = false;
    }

    fn close(&mut self, kind: FrameKind) {
        debug_assert!(
            self.frames.len() > 1,
            "end of {:?} without a matching start",
            kind
        );
        if self.frames.len() <= 1 {
            warn!(container = ?kind, "close without a matching start ignored");
            return;
        }

        debug_assert!(
            !self.member_pending,
            "container closed while a member has no value"
        );
        if self.member_pending {
            warn!("container closed while a member has no value, writing null");
            self.output.push_str("null");
            self.member_pending = false;
        }

        let frame = self.innermost();
        debug_assert_eq!(frame.kind, kind, "mismatched container close");
        if frame.kind != kind {
            warn!(expected = ?frame.kind, found = ?kind, "mismatched container close");
        }

        self.frames.pop();
        self.indent_level = self.indent_level.saturating_sub(INDENT_STEP);
        if !frame.first_child {
            self.indent();
        }
        // Close what is actually open so the document stays well formed
        self.output.push_str(frame.kind.close_bracket());
        self.write_end_marker(frame.names_start);
    }

    /// Prepare for a value; returns false if no value is allowed here
    fn begin_value(&mut self) -> bool {
        if self.member_pending {
            self.member_pending = false;
            return true;
        }
        let frame = self.innermost();
        let allowed = match frame.kind {
            FrameKind::Array => true,
            FrameKind::Document => frame.first_child,
            FrameKind::Object => false,
        };
        debug_assert!(
            allowed,
            "value written without a member name outside an array"
        );
        if allowed {
            self.separate();
        }
        allowed
    }

    /// Comma (unless first child) and indentation before a new element
    fn separate(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.first_child {
                frame.first_child = false;
            } else {
                self.output.push(',');
            }
        }
        self.indent();
    }

    fn indent(&mut self) {
        if self.one_line {
            return;
        }
        if self.document_start {
            self.document_start = false;
        } else {
            self.output.push('\n');
        }
        let mut remaining = self.indent_level;
        while remaining > 0 {
            let n = remaining.min(SPACES.len());
            self.output.push_str(&SPACES[..n]);
            remaining -= n;
        }
    }

    fn push_member_name(&mut self, name: &str) {
        self.output.push('"');
        self.output.push_str(&escape(name));
        self.output.push_str("\": ");
    }

    fn push_value(&mut self, text: &str, quoted: bool) {
        if quoted {
            self.output.push('"');
            self.output.push_str(text);
            self.output.push('"');
        } else {
            self.output.push_str(text);
        }
    }

    fn record_member(&mut self, name: &str) {
        if !self.end_marker {
            return;
        }
        let start = self.innermost().names_start;
        if self.member_names.len() > start {
            self.member_names.push_str(", ");
        }
        // Listed the way it appears in the member, and never closing the comment
        let name = escape(name);
        if name.contains("*/") {
            self.member_names.push_str(&name.replace("*/", "* /"));
        } else {
            self.member_names.push_str(&name);
        }
    }

    fn write_end_marker(&mut self, names_start: usize) {
        if !self.end_marker {
            return;
        }
        if self.member_names.len() > names_start {
            self.output.push_str(" /* ");
            self.output.push_str(&self.member_names[names_start..]);
            self.output.push_str(" */");
        }
        self.member_names.truncate(names_start);
    }

    fn innermost(&self) -> Frame {
        // The document frame is never popped
        self.frames[self.frames.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> JsonWriter {
        JsonWriter::new(WriterOptions::default())
    }

    fn with_markers() -> JsonWriter {
        JsonWriter::new(WriterOptions {
            end_marker: true,
            ..Default::default()
        })
    }

    fn one_line() -> JsonWriter {
        JsonWriter::new(WriterOptions {
            one_line: true,
            ..Default::default()
        })
    }

    // === Layout ===

    #[test]
    fn test_empty_containers() {
        let mut w = writer();
        w.start_object();
        w.end_object();
        assert_eq!(w.output(), "{}");

        let mut w = writer();
        w.start_array();
        w.end_array();
        assert_eq!(w.output(), "[]");
    }

    #[test]
    fn test_members_one_per_line() {
        let mut w = writer();
        w.start_object();
        w.add_member("table").add_str("t1");
        w.add_member("rows").add_u64(100);
        w.add_member("cost").add_double(20.5);
        w.add_member("chosen").add_bool(true);
        w.add_member("cause").add_null();
        w.end_object();
        assert_eq!(
            w.output(),
            "{\n  \"table\": \"t1\",\n  \"rows\": 100,\n  \"cost\": 20.5,\n  \"chosen\": true,\n  \"cause\": null\n}"
        );
        assert!(w.is_balanced());
    }

    #[test]
    fn test_nested_object_indentation() {
        let mut w = writer();
        w.start_object();
        w.add_member("join").start_object();
        w.add_member("select_id").add_i64(1);
        w.end_object();
        w.end_object();
        assert_eq!(
            w.output(),
            "{\n  \"join\": {\n    \"select_id\": 1\n  }\n}"
        );
    }

    #[test]
    fn test_array_of_objects() {
        let mut w = writer();
        w.start_array();
        w.start_object();
        w.add_member("a").add_i64(-1);
        w.end_object();
        w.start_object();
        w.end_object();
        w.end_array();
        assert_eq!(w.output(), "[\n  {\n    \"a\": -1\n  },\n  {}\n]");
    }

    #[test]
    fn test_top_level_scalar() {
        let mut w = writer();
        w.add_i64(5);
        assert_eq!(w.output(), "5");
        assert_eq!(w.depth(), 0);
    }

    #[test]
    fn test_strings_and_names_escaped() {
        let mut w = writer();
        w.start_object();
        w.add_member("say \"hi\"").add_str("a\\b\n");
        w.end_object();
        assert_eq!(w.output(), "{\n  \"say \\\"hi\\\"\": \"a\\\\b\\n\"\n}");
    }

    #[test]
    fn test_raw_text_is_verbatim() {
        let mut w = writer();
        w.start_array();
        w.add_raw("{\"pre\": 1}");
        w.end_array();
        assert_eq!(w.output(), "[\n  {\"pre\": 1}\n]");
    }

    #[test]
    fn test_size_and_special_doubles_quoted() {
        let mut w = writer();
        w.start_array();
        w.add_size(4096);
        w.add_double(f64::NAN);
        w.add_double(1e7);
        w.end_array();
        assert_eq!(w.output(), "[\n  \"4Kb\",\n  \"NaN\",\n  1e+07\n]");
    }

    #[test]
    fn test_depth_tracks_nesting() {
        let mut w = writer();
        w.start_object();
        w.add_member("a").start_array();
        w.start_object();
        assert_eq!(w.depth(), 3);
        w.end_object();
        w.end_array();
        w.end_object();
        assert_eq!(w.depth(), 0);
        assert!(w.is_balanced());
    }

    // === One-line mode ===

    #[test]
    fn test_one_line_has_no_newlines() {
        let mut w = one_line();
        w.start_object();
        w.add_member("a").add_i64(1);
        w.add_member("inner").start_object();
        w.add_member("b").start_array();
        w.start_object();
        w.end_object();
        w.end_array();
        w.end_object();
        w.end_object();
        assert!(!w.output().contains('\n'));
        assert_eq!(w.output(), "{\"a\": 1,\"inner\": {\"b\": [{}]}}");
    }

    #[test]
    fn test_one_line_compacted_array() {
        let mut w = one_line();
        w.start_object();
        w.add_member("a").add_i64(1);
        w.add_member("xs").start_array();
        w.add_i64(1);
        w.add_i64(2);
        w.end_array();
        w.end_object();
        assert_eq!(w.output(), "{\"a\": 1,\"xs\": [1, 2]}");
    }

    // === Compaction ===

    #[test]
    fn test_compacts_scalar_array_at_top_level() {
        let mut w = writer();
        w.add_member("xs");
        w.start_array();
        w.add_i64(1);
        w.add_i64(2);
        w.add_i64(3);
        w.end_array();
        assert_eq!(w.output(), "\"xs\": [1, 2, 3]");
    }

    #[test]
    fn test_compacts_inside_object() {
        let mut w = writer();
        w.start_object();
        w.add_member("keys").start_array();
        w.add_str("PRIMARY");
        w.add_str("idx_a");
        w.end_array();
        w.add_member("empty").start_array();
        w.end_array();
        w.end_object();
        assert_eq!(
            w.output(),
            "{\n  \"keys\": [\"PRIMARY\", \"idx_a\"],\n  \"empty\": []\n}"
        );
    }

    #[test]
    fn test_overflow_renders_expanded_in_order() {
        let a = "a".repeat(30);
        let b = "b".repeat(30);
        let c = "c".repeat(30);
        let mut w = writer();
        w.add_member("xs").start_array();
        w.add_str(&a);
        w.add_str(&b);
        w.add_str(&c);
        w.add_i64(4);
        w.end_array();
        assert_eq!(
            w.output(),
            format!("\"xs\": [\n  \"{}\",\n  \"{}\",\n  \"{}\",\n  4\n]", a, b, c)
        );
    }

    #[test]
    fn test_object_inside_candidate_array_expands() {
        let mut w = writer();
        w.start_object();
        w.add_member("steps").start_array();
        w.add_i64(1);
        w.start_object();
        w.add_member("x").add_i64(2);
        w.end_object();
        w.end_array();
        w.end_object();
        assert_eq!(
            w.output(),
            "{\n  \"steps\": [\n    1,\n    {\n      \"x\": 2\n    }\n  ]\n}"
        );
    }

    #[test]
    fn test_nested_array_inside_candidate_expands() {
        let mut w = writer();
        w.start_object();
        w.add_member("m").start_array();
        w.add_i64(1);
        w.start_array();
        w.add_i64(2);
        w.end_array();
        w.end_array();
        w.end_object();
        assert_eq!(
            w.output(),
            "{\n  \"m\": [\n    1,\n    [\n      2\n    ]\n  ]\n}"
        );
    }

    #[test]
    fn test_member_in_nested_object_compacts_again() {
        let mut w = writer();
        w.start_object();
        w.add_member("outer").start_object();
        w.add_member("xs").start_array();
        w.add_bool(false);
        w.end_array();
        w.end_object();
        w.end_object();
        assert_eq!(
            w.output(),
            "{\n  \"outer\": {\n    \"xs\": [false]\n  }\n}"
        );
    }

    #[test]
    fn test_finish_replays_unfinished_candidate() {
        let mut w = writer();
        w.add_member("xs").start_array();
        w.add_i64(1);
        assert_eq!(w.output(), "");
        assert!(!w.is_balanced());
        w.finish();
        assert_eq!(w.output(), "\"xs\": [\n  1");
    }

    // === End markers ===

    #[test]
    fn test_end_marker_lists_direct_members() {
        let mut w = with_markers();
        w.start_object();
        w.add_member("a");
        w.add_i64(1);
        w.add_member("b");
        w.add_i64(2);
        w.end_object();
        assert_eq!(w.output(), "{\n  \"a\": 1,\n  \"b\": 2\n} /* a, b */");
    }

    #[test]
    fn test_end_marker_not_recursive() {
        let mut w = with_markers();
        w.start_object();
        w.add_member("steps").start_array();
        w.start_object();
        w.add_member("x").add_i64(1);
        w.end_object();
        w.end_array();
        w.end_object();
        assert_eq!(
            w.output(),
            "{\n  \"steps\": [\n    {\n      \"x\": 1\n    } /* x */\n  ]\n} /* steps */"
        );
    }

    #[test]
    fn test_end_marker_includes_compacted_member() {
        let mut w = with_markers();
        w.start_object();
        w.add_member("xs").start_array();
        w.add_i64(1);
        w.end_array();
        w.add_member("n").add_i64(2);
        w.end_object();
        assert_eq!(w.output(), "{\n  \"xs\": [1],\n  \"n\": 2\n} /* xs, n */");
    }

    #[test]
    fn test_no_end_marker_for_empty_containers() {
        let mut w = with_markers();
        w.start_object();
        w.end_object();
        assert_eq!(w.output(), "{}");
    }

    #[test]
    fn test_end_marker_sanitizes_comment_terminator() {
        let mut w = with_markers();
        w.start_object();
        w.add_member("a*/b").add_i64(1);
        w.end_object();
        assert!(w.output().ends_with("} /* a* /b */"));
    }

    #[test]
    fn test_one_line_marker_escapes_names() {
        let mut w = JsonWriter::new(WriterOptions {
            one_line: true,
            end_marker: true,
            ..Default::default()
        });
        w.start_object();
        w.add_member("a\nb").add_i64(1);
        w.end_object();
        assert!(!w.output().contains('\n'));
        assert_eq!(w.output(), "{\"a\\nb\": 1} /* a\\nb */");
    }

    // === Memory limit ===

    #[test]
    fn test_output_truncated_at_memory_limit() {
        let mut w = JsonWriter::new(WriterOptions {
            max_mem_size: 16,
            ..Default::default()
        });
        w.start_array();
        for i in 0..100 {
            w.add_i64(i);
        }
        w.end_array();
        assert_eq!(w.output().len(), 16);
        assert!(w.missing_bytes() > 0);
        // Writer state stays consistent after truncation
        assert!(w.is_balanced());
    }

    // === Contract violations ===

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "without a matching start")]
    fn test_unmatched_close_asserts() {
        let mut w = writer();
        w.end_object();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "without a member name")]
    fn test_scalar_in_object_without_member_asserts() {
        let mut w = writer();
        w.start_object();
        w.add_i64(1);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "previous member has no value")]
    fn test_double_member_asserts() {
        let mut w = writer();
        w.start_object();
        w.add_member("a");
        w.add_member("b");
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "added inside an array")]
    fn test_member_inside_array_asserts() {
        let mut w = writer();
        w.start_array();
        w.add_member("x");
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "previous member has no value")]
    fn test_double_member_after_declined_name_asserts() {
        let long = "n".repeat(crate::LINE_BUDGET);
        let mut w = writer();
        w.start_object();
        w.add_member(&long);
        w.add_member("b");
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn test_member_inside_array_is_dropped() {
        let mut w = writer();
        w.start_array();
        w.add_member("x");
        w.start_array();
        w.add_i64(1);
        w.end_array();
        w.end_array();
        assert_eq!(w.output(), "[\n  [\n    1\n  ]\n]");
        assert!(w.is_balanced());
    }
}
