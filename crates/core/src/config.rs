//! Stream configuration values and viewer-level settings.
//!
//! A [`PlayerConfiguration`] describes what one player slot streams: the
//! RTSP URI, optional credentials and a display name. URIs are validated
//! against the three schemes the engine understands:
//!
//! | Scheme | Transport label |
//! |--------|-----------------|
//! | `rtsp://` | RTP/UDP |
//! | `rtspt://` | RTP/RTSP (interleaved TCP) |
//! | `rtsph://` | RTP/RTSP/HTTP (tunnelled) |

use serde::{Deserialize, Serialize};

use crate::error::{Result, UriErrorKind, ViewerError};

/// Upper bound on simultaneously managed players.
pub const MAX_SESSIONS: usize = 4;

/// Number of players when nothing else is configured.
pub const DEFAULT_SESSION_COUNT: usize = 2;

/// Default stream for an unconfigured slot (Axis camera media path).
pub const DEFAULT_MEDIA_URI: &str = "rtsp://192.168.0.90/axis-media/media.amp";
pub const DEFAULT_MEDIA_USER: &str = "root";
pub const DEFAULT_MEDIA_PASS: &str = "pass";

/// Accepted URI schemes, in match order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriScheme {
    /// `rtsp://`: RTP over UDP.
    Udp,
    /// `rtspt://`: RTP interleaved on the RTSP TCP connection.
    Tcp,
    /// `rtsph://`: RTSP tunnelled over HTTP.
    Http,
}

impl UriScheme {
    const ALL: [UriScheme; 3] = [UriScheme::Udp, UriScheme::Tcp, UriScheme::Http];

    pub fn prefix(self) -> &'static str {
        match self {
            UriScheme::Udp => "rtsp://",
            UriScheme::Tcp => "rtspt://",
            UriScheme::Http => "rtsph://",
        }
    }

    /// Transport label shown in player titles.
    pub fn label(self) -> &'static str {
        match self {
            UriScheme::Udp => "RTP/UDP",
            UriScheme::Tcp => "RTP/RTSP",
            UriScheme::Http => "RTP/RTSP/HTTP",
        }
    }

    /// Detect the scheme of `uri` without validating the remainder.
    pub fn detect(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| uri.starts_with(s.prefix()))
    }
}

/// Check that `uri` is a streamable RTSP location.
///
/// ```
/// use viewer::config::validate_uri;
///
/// assert!(validate_uri("rtsph://94.190.242.153/axis-media/media.amp").is_ok());
/// assert!(validate_uri("ftp://x").is_err());
/// assert!(validate_uri("rtspt://").is_err());
/// ```
pub fn validate_uri(uri: &str) -> Result<UriScheme> {
    let reject = |kind| ViewerError::InvalidUri {
        uri: uri.to_string(),
        kind,
    };

    if uri.is_empty() {
        return Err(reject(UriErrorKind::Empty));
    }
    let scheme = UriScheme::detect(uri).ok_or_else(|| reject(UriErrorKind::UnsupportedScheme))?;
    if uri[scheme.prefix().len()..].is_empty() {
        return Err(reject(UriErrorKind::MissingLocation));
    }
    Ok(scheme)
}

/// What a single player streams.
///
/// Replaced wholesale; never edited field by field once handed to a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfiguration {
    pub uri: String,
    pub user: String,
    pub pass: String,
    /// Display name; empty means "use the player number".
    pub name: String,
}

impl PlayerConfiguration {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, user: &str, pass: &str) -> Self {
        self.user = user.to_string();
        self.pass = pass.to_string();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Validate the URI, returning its scheme.
    pub fn validate(&self) -> Result<UriScheme> {
        validate_uri(&self.uri)
    }

    /// Transport label for the title bar; empty for unrecognized schemes.
    pub fn protocol_label(&self) -> &'static str {
        UriScheme::detect(&self.uri).map_or("", UriScheme::label)
    }
}

/// Viewer-level configuration.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Number of player slots, fixed for the lifetime of a viewer.
    pub session_count: usize,
    /// Configuration given to slots with no stored URI.
    pub default_stream: PlayerConfiguration,
    /// Slot that receives transport commands first.
    pub start_active: usize,
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.session_count == 0 || self.session_count > MAX_SESSIONS {
            return Err(ViewerError::SessionCount(self.session_count));
        }
        if self.start_active >= self.session_count {
            return Err(ViewerError::NoSuchSession(self.start_active));
        }
        self.default_stream.validate()?;
        Ok(())
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            session_count: DEFAULT_SESSION_COUNT,
            default_stream: PlayerConfiguration::new(DEFAULT_MEDIA_URI)
                .with_credentials(DEFAULT_MEDIA_USER, DEFAULT_MEDIA_PASS),
            start_active: 0,
        }
    }
}
