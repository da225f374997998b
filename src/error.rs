use thiserror::Error;

/// Why a valuation could not be obtained. Every variant means "unavailable"
/// to the driver; the split only matters for diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Request could not complete (connect, TLS, non-2xx status, body read)
    #[error("network failure: {0}")]
    Network(String),

    /// Request did not finish within the configured bound
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Body arrived but had no usable valuation
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Asset id is empty or still the placeholder
    #[error("asset id not configured")]
    Unconfigured,
}

impl FetchError {
    /// Short label for the presentation layer.
    pub fn display_label(&self) -> &'static str {
        match self {
            FetchError::Unconfigured => "Not configured",
            _ => "Error loading",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FetchError;

    #[test]
    fn unconfigured_gets_its_own_label() {
        assert_eq!(FetchError::Unconfigured.display_label(), "Not configured");
        assert_eq!(FetchError::Timeout(10_000).display_label(), "Error loading");
        assert_eq!(FetchError::Malformed("x".into()).display_label(), "Error loading");
    }

    #[test]
    fn timeout_message_includes_bound() {
        assert_eq!(FetchError::Timeout(250).to_string(), "request timed out after 250 ms");
    }
}
