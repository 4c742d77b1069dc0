/// Errors from fetching or parsing headline feeds.
#[derive(Debug, thiserror::Error)]
pub enum NewsError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Feed request failed for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The feed server returned a non-2xx status code.
    #[error("Feed {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body is not a parseable RSS/Atom/JSON feed.
    #[error("Feed {url} could not be parsed: {message}")]
    Parse { url: String, message: String },

    /// Invalid feed configuration.
    #[error("Invalid feed configuration: {0}")]
    Config(String),
}
