//! Error types for htmlhost

use thiserror::Error;

use crate::navigation::NavigationState;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for host operations
pub type HostResult<T> = Result<T, HostError>;

/// Errors reported by an embedded engine backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine component could not be instantiated
    #[error("Failed to instantiate engine: {0}")]
    Instantiation(String),

    /// In-place activation inside the parent window failed
    #[error("In-place activation failed: {0}")]
    Activation(String),

    /// Advising or unadvising the event sink failed
    #[error("Event connection error: {0}")]
    Connection(String),

    /// The engine rejected a navigation request
    #[error("Navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    /// The engine does not implement this capability
    #[error("Operation not supported by engine: {0}")]
    Unsupported(&'static str),

    /// The engine has already been closed
    #[error("Engine has been closed")]
    Closed,

    /// Any other backend failure
    #[error("Internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Create a navigation error
    pub fn navigation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Errors produced by [`BrowserHost`](crate::BrowserHost)
#[derive(Error, Debug)]
pub enum HostError {
    /// The parent window handle cannot host a control
    #[error("Invalid parent window")]
    InvalidParent,

    /// The engine could not be created
    #[error("Engine instantiation failed: {0}")]
    Instantiate(#[source] EngineError),

    /// The engine refused to embed itself in the parent window
    #[error("In-place activation failed: {0}")]
    Activate(#[source] EngineError),

    /// Subscribing the container site to engine events failed
    #[error("Event subscription failed: {0}")]
    Subscribe(#[source] EngineError),

    /// The host configuration is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A screenshot could not be produced
    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    /// The engine failed an operation after construction
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL '{url}': {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid content scheme: {0}")]
    Scheme(String),

    #[error("Invalid zoom bounds: min {min} > max {max}")]
    ZoomBounds { min: u32, max: u32 },

    #[error("Initial zoom {initial} outside [{min}, {max}]")]
    InitialZoom { initial: u32, min: u32, max: u32 },
}

/// Failure to resolve a synthetic URL to content
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// The host has no content for this URL
    #[error("No data available for {0}")]
    NoData(String),

    /// The URL does not belong to this content source
    #[error("URL {requested} is not served by this source ({served})")]
    WrongUrl { requested: String, served: String },

    /// The pre-registered buffer has already been handed to the engine
    #[error("Content for {0} was already consumed")]
    Consumed(String),

    /// The owning host is gone
    #[error("Content source is detached from its host")]
    Detached,
}

/// An engine event that does not fit the current navigation state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Cannot {event} from {from:?}")]
    InvalidTransition {
        from: NavigationState,
        event: &'static str,
    },
}

/// Drag/drop status returned to the engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DragDropError {
    /// The dragged data carries nothing this host accepts
    #[error("Unsupported drag data")]
    UnsupportedFormat,

    /// The data object could not be read
    #[error("Failed to read drag data: {0}")]
    DataUnavailable(String),

    /// The site is no longer connected to a host
    #[error("Drop target is detached")]
    Detached,
}

/// Bitmap construction and export errors
#[derive(Error, Debug)]
pub enum BitmapError {
    #[error("Pixel buffer of {actual} bytes does not match {width}x{height} RGBA")]
    SizeMismatch {
        width: u32,
        height: u32,
        actual: usize,
    },

    #[error("PNG encoding failed: {0}")]
    PngEncoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::navigation("https://example.com", "refused");
        assert!(err.to_string().contains("https://example.com"));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_host_error_wraps_engine_error() {
        let err: HostError = EngineError::Closed.into();
        assert!(matches!(err, HostError::Engine(EngineError::Closed)));
    }

    #[test]
    fn test_bind_error_display() {
        let err = BindError::NoData("chapter1.html".into());
        assert_eq!(err.to_string(), "No data available for chapter1.html");
    }
}
