//! Error types for the viewer library.

use std::fmt;

/// Errors that can occur while coordinating playback sessions.
///
/// Variants map to the layer where the failure is resolved:
///
/// - **Fatal**: [`EngineInit`](Self::EngineInit),
///   [`EngineCreate`](Self::EngineCreate). Playback is impossible; surfaced
///   once at startup and never retried.
/// - **Validation**: [`InvalidUri`](Self::InvalidUri),
///   [`NoSuchSession`](Self::NoSuchSession),
///   [`NoSuchEntry`](Self::NoSuchEntry). Rejected at command issuance,
///   before any session is touched.
/// - **Lifecycle**: [`NotStarted`](Self::NotStarted),
///   [`AlreadyRunning`](Self::AlreadyRunning),
///   [`Disconnected`](Self::Disconnected),
///   [`SessionDestroyed`](Self::SessionDestroyed).
/// - **Persistence**: [`Store`](Self::Store), [`Io`](Self::Io),
///   [`Json`](Self::Json).
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// The engine binding could not be initialized for this process.
    #[error("engine binding initialization failed: {0}")]
    EngineInit(String),

    /// [`EngineBinding::initialize`](crate::engine::EngineBinding::initialize)
    /// was called while a binding is already live for this engine.
    #[error("engine binding already initialized")]
    BindingAlreadyInitialized,

    /// The engine refused to allocate a playback pipeline for a slot.
    #[error("failed to create engine for player {slot}: {reason}")]
    EngineCreate { slot: usize, reason: String },

    /// A submitted stream URI does not use an accepted scheme.
    #[error("invalid URI {uri:?}: {kind}")]
    InvalidUri { uri: String, kind: UriErrorKind },

    /// The session index is outside the fixed slot range.
    #[error("no such player: {0}")]
    NoSuchSession(usize),

    /// The index is outside the saved-stream library.
    #[error("no library entry {0}")]
    NoSuchEntry(usize),

    /// A command targeted a session that has already been torn down.
    #[error("player {0} has been destroyed")]
    SessionDestroyed(usize),

    /// [`Viewer::start`](crate::Viewer::start) has not been called yet.
    #[error("viewer not started")]
    NotStarted,

    /// [`Viewer::start`](crate::Viewer::start) was called while already running.
    #[error("viewer already running")]
    AlreadyRunning,

    /// The processing loop exited before answering.
    #[error("processing loop disconnected")]
    Disconnected,

    /// The session count in [`ViewerConfig`](crate::ViewerConfig) is out of range.
    #[error("unsupported session count {0} (expected 1..={max})", max = crate::config::MAX_SESSIONS)]
    SessionCount(usize),

    /// The configuration backend reported a failure.
    #[error("configuration store error: {0}")]
    Store(String),

    /// Underlying I/O error (store file access).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store file could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Specific reason a stream URI was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriErrorKind {
    /// Input was empty.
    Empty,
    /// Scheme is not one of `rtsp://`, `rtspt://`, `rtsph://`.
    UnsupportedScheme,
    /// Scheme is accepted but nothing follows it.
    MissingLocation,
}

impl fmt::Display for UriErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty URI"),
            Self::UnsupportedScheme => {
                write!(f, "accepted format is rtsp[t|h]://IP/path[?options]")
            }
            Self::MissingLocation => write!(f, "missing host and path"),
        }
    }
}

/// Convenience alias for `Result<T, ViewerError>`.
pub type Result<T> = std::result::Result<T, ViewerError>;
