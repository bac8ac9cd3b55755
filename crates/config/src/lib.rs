//! Trace configuration.
//!
//! This crate provides [`TraceConfig`], the explicit value a trace session is
//! created with. Nothing in the writer or the session reads global state;
//! everything they need arrives through this type.

use optrace_wire::{WriterOptions, DEFAULT_MAX_MEM_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from validating a [`TraceConfig`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A document could never hold a single byte
    #[error("max_mem_size must be greater than zero")]
    ZeroMemoryLimit,

    /// The record limit does not fit the signed range used by row selection
    #[error("limit {0} is out of range (maximum {max})", max = i64::MAX)]
    LimitOutOfRange(u64),
}

/// Options controlling whether and how optimizer traces are written.
///
/// Use the builder pattern to configure options:
///
/// ```
/// use optrace_config::TraceConfig;
///
/// let config = TraceConfig::new().enabled(true).end_marker(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Create trace documents at all
    pub enabled: bool,
    /// Render documents without newlines or indentation
    pub one_line: bool,
    /// Annotate closing containers with the members they held
    pub end_marker: bool,
    /// Bytes kept per document before output is truncated
    pub max_mem_size: usize,
    /// First retained record to expose; negative counts from the newest.
    /// Only read by code that turns retained records into rows.
    pub offset: i64,
    /// Number of retained records to expose.
    /// Only read by code that turns retained records into rows.
    pub limit: u64,
}

impl TraceConfig {
    /// Default configuration: tracing disabled, 1 MiB per document
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn trace creation on or off
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Write documents without newlines or indentation
    pub fn one_line(mut self, one_line: bool) -> Self {
        self.one_line = one_line;
        self
    }

    /// Follow each closing container with a comment naming its members
    pub fn end_marker(mut self, end_marker: bool) -> Self {
        self.end_marker = end_marker;
        self
    }

    /// Set the per-document size limit in bytes
    pub fn max_mem_size(mut self, bytes: usize) -> Self {
        self.max_mem_size = bytes;
        self
    }

    /// Set the first retained record to expose
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the number of retained records to expose
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Check that the configuration can be used to create a session
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_mem_size == 0 {
            return Err(ConfigError::ZeroMemoryLimit);
        }
        if self.limit > i64::MAX as u64 {
            return Err(ConfigError::LimitOutOfRange(self.limit));
        }
        Ok(())
    }

    /// Layout options for each document written under this configuration
    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            one_line: self.one_line,
            end_marker: self.end_marker,
            max_mem_size: self.max_mem_size,
        }
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            one_line: false,
            end_marker: false,
            max_mem_size: DEFAULT_MAX_MEM_SIZE,
            offset: -1,
            limit: 1,
        }
    }
}
