//! Domain error types.

/// Top-level error type for hulltrend.
#[derive(Debug, thiserror::Error)]
pub enum HulltrendError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown smoothing variant '{tag}' (expected hma, ehma or thma)")]
    UnknownVariant { tag: String },

    #[error("data integrity error in {series}: {reason}")]
    DataIntegrity { series: String, reason: String },

    #[error("tracker state persistence failed for {key}: {reason}")]
    Persistence { key: String, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("notification failed: {reason}")]
    Notify { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HulltrendError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HulltrendError::Persistence { .. }
                | HulltrendError::Database { .. }
                | HulltrendError::Notify { .. }
        )
    }
}

impl From<&HulltrendError> for std::process::ExitCode {
    fn from(err: &HulltrendError) -> Self {
        let code: u8 = match err {
            HulltrendError::Io(_) => 1,
            HulltrendError::ConfigParse { .. }
            | HulltrendError::ConfigMissing { .. }
            | HulltrendError::ConfigInvalid { .. }
            | HulltrendError::UnknownVariant { .. } => 2,
            HulltrendError::Database { .. } | HulltrendError::DatabaseQuery { .. } => 3,
            HulltrendError::Persistence { .. } => 4,
            HulltrendError::DataIntegrity { .. } => 5,
            HulltrendError::Notify { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_variant_message() {
        let err = HulltrendError::UnknownVariant { tag: "sma".into() };
        assert_eq!(
            err.to_string(),
            "unknown smoothing variant 'sma' (expected hma, ehma or thma)"
        );
    }

    #[test]
    fn persistence_is_retryable() {
        let err = HulltrendError::Persistence {
            key: "BTC/1h".into(),
            reason: "disk full".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn config_errors_are_not_retryable() {
        let err = HulltrendError::ConfigMissing {
            section: "strategy".into(),
            key: "variant".into(),
        };
        assert!(!err.is_retryable());
        let err = HulltrendError::DataIntegrity {
            series: "BTC/1h".into(),
            reason: "duplicate timestamp".into(),
        };
        assert!(!err.is_retryable());
    }
}
