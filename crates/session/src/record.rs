//! Trace records
//!
//! A [`TraceRecord`] is one trace: the query text it was started for and the
//! document written while it was active.

use optrace_wire::{JsonWriter, WriterOptions};

/// One in-progress or finished trace
#[derive(Debug, Clone)]
pub struct TraceRecord {
    query: String,
    document: JsonWriter,
}

impl TraceRecord {
    pub(crate) fn new(query: &str, options: WriterOptions) -> Self {
        TraceRecord {
            query: query.to_owned(),
            document: JsonWriter::new(options),
        }
    }

    /// The query text the trace was started for
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The JSON document
    pub fn json(&self) -> &str {
        self.document.output()
    }

    /// Bytes of the document dropped at the memory limit
    pub fn missing_bytes_beyond_max_mem_size(&self) -> usize {
        self.document.missing_bytes()
    }

    /// The writer that produced the document
    pub fn document(&self) -> &JsonWriter {
        &self.document
    }

    pub(crate) fn document_mut(&mut self) -> &mut JsonWriter {
        &mut self.document
    }

    /// Render anything the writer still holds back
    pub(crate) fn finish(&mut self) {
        self.document.finish();
    }
}
