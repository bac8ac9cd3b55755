//! Unified error types for Optrace.
//!
//! Writing a trace never fails; errors only come from building a session.

use optrace_config::ConfigError;
use thiserror::Error;

/// All Optrace errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Trace settings rejected by validation
    #[error("invalid trace configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for Optrace operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optrace_config::TraceConfig;

    #[test]
    fn test_config_error_converts() {
        let err: Error = TraceConfig::new().max_mem_size(0).validate().unwrap_err().into();
        assert!(err.is_config());
        assert!(err.to_string().starts_with("invalid trace configuration"));
    }

    #[test]
    fn test_session_helper_validates() {
        assert!(crate::session(TraceConfig::new().max_mem_size(0)).is_err());
        assert!(crate::session(TraceConfig::new()).is_ok());
    }
}
