use thiserror::Error;

/// Failure of a single extraction strategy. Always strategy-local: the
/// orchestrator records it and moves on to the next strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Connection failure, DNS failure, or timeout.
    #[error("network error: {0}")]
    Network(String),

    /// The site answered with a non-2xx status.
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The response arrived but the expected structure was absent or malformed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A well-formed response that contained zero listings.
    #[error("no listings in response")]
    NoResults,
}

impl From<reqwest::Error> for StrategyError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            StrategyError::HttpStatus(status.as_u16())
        } else {
            StrategyError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_failure() {
        assert_eq!(
            StrategyError::HttpStatus(429).to_string(),
            "HTTP status 429"
        );
        assert_eq!(
            StrategyError::Network("connection refused".into()).to_string(),
            "network error: connection refused"
        );
        assert_eq!(
            StrategyError::NoResults.to_string(),
            "no listings in response"
        );
    }
}
