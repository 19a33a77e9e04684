use thiserror::Error;

/// Failure taxonomy for a report run.
///
/// Every component returns this type; the coordinator catches it once,
/// publishes `user_message()` as the run status and aborts the run.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid experiment data: {0}")]
    Ingest(String),

    #[error("narrative service transport failure: {0}")]
    Transport(String),

    #[error("narrative service returned an empty response")]
    EmptyResponse,

    #[error("section {section} could not be parsed: {reason}")]
    Parse { section: &'static str, reason: String },

    #[error("chart '{chart}' failed to render: {reason}")]
    Render { chart: &'static str, reason: String },

    #[error("document composition failed: {0}")]
    Compose(String),

    #[error("failed to persist report: {0}")]
    Persist(String),

    #[error("a report run is already in progress")]
    Busy,
}

impl ReportError {
    /// Stable tag used in logs and run status.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::Validation(_) => "validation",
            ReportError::Ingest(_) => "ingest",
            ReportError::Transport(_) => "transport",
            ReportError::EmptyResponse => "empty_response",
            ReportError::Parse { .. } => "parse",
            ReportError::Render { .. } => "render",
            ReportError::Compose(_) => "compose",
            ReportError::Persist(_) => "persist",
            ReportError::Busy => "busy",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ReportError::Validation(msg) => msg.clone(),
            ReportError::Ingest(msg) => format!("Invalid JSON file: {}", msg),
            ReportError::Transport(_)
            | ReportError::EmptyResponse
            | ReportError::Parse { .. } => format!("Failed to generate insights: {}", self),
            ReportError::Render { .. } => format!("Failed to generate charts: {}", self),
            ReportError::Compose(_) | ReportError::Persist(_) => {
                format!("Failed to create PDF report: {}", self)
            }
            ReportError::Busy => "A report is already being generated".to_string(),
        }
    }
}

pub type ReportResult<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_section() {
        let err = ReportError::Parse {
            section: "PERFORMANCE_DRIVERS",
            reason: "closing marker not found".to_string(),
        };
        assert_eq!(err.kind(), "parse");
        assert!(err.to_string().contains("PERFORMANCE_DRIVERS"));
        assert!(err.user_message().starts_with("Failed to generate insights"));
    }

    #[test]
    fn validation_message_is_passed_through() {
        let err = ReportError::Validation("Please enter your Gemini API key".to_string());
        assert_eq!(err.user_message(), "Please enter your Gemini API key");
    }
}
