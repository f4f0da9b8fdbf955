//! Common types used across host messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ParameterError;

/// Default RTMP port.
pub const DEFAULT_RTMP_PORT: u16 = 1935;

/// Length of a hex-rendered SHA-256 digest.
const SIGNATURE_HEX_LEN: usize = 64;

/// Target of a broadcast or a playback. Never mutated once built.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParameters {
    /// Server host name or address (e.g., "wowza.example.com").
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Application name on the server (e.g., "live").
    pub application: String,

    /// Stream name within the application.
    pub stream_name: String,

    /// Optional source username.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional source password.
    #[serde(default)]
    pub password: Option<String>,
}

impl ConnectionParameters {
    /// Build parameters without credentials.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        application: impl Into<String>,
        stream_name: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            application: application.into(),
            stream_name: stream_name.into(),
            username: None,
            password: None,
        }
    }

    /// Attach source credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Check that every field is usable and that the target forms a URL.
    pub fn validate(&self) -> Result<(), ParameterError> {
        self.rtmp_url().map(|_| ())
    }

    /// The `rtmp://host:port/application` URL for this target.
    ///
    /// Fails unless host, port and application come back out of the parsed
    /// URL exactly as given.
    pub fn rtmp_url(&self) -> Result<Url, ParameterError> {
        self.check_fields()?;

        let url = Url::parse(&format!(
            "rtmp://{}:{}/{}",
            self.host, self.port, self.application
        ))
        .map_err(|e| ParameterError::Malformed {
            field: "host",
            reason: e.to_string(),
        })?;

        // IPv6 literals must be bracketed and in canonical form.
        let host_matches = url.host_str() == Some(self.host.as_str());
        if !host_matches || url.port() != Some(self.port) {
            return Err(ParameterError::Malformed {
                field: "host",
                reason: "not a plain host name or address".to_string(),
            });
        }
        if url.path().strip_prefix('/') != Some(self.application.as_str()) {
            return Err(ParameterError::Malformed {
                field: "application",
                reason: "does not survive URL parsing".to_string(),
            });
        }
        Ok(url)
    }

    fn check_fields(&self) -> Result<(), ParameterError> {
        check_token("host", &self.host)?;
        if self.port == 0 {
            return Err(ParameterError::InvalidPort);
        }
        check_token("application", &self.application)?;
        check_path("application", &self.application, true)?;
        check_token("stream name", &self.stream_name)?;
        check_path("stream name", &self.stream_name, false)?;
        if let Some(username) = &self.username {
            check_token("username", username)?;
        }
        Ok(())
    }

    /// Short `host:port/application/stream` form for logs.
    pub fn target(&self) -> String {
        format!(
            "{}:{}/{}/{}",
            self.host, self.port, self.application, self.stream_name
        )
    }
}

impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("application", &self.application)
            .field("stream_name", &self.stream_name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Application and stream names travel inside URLs and RTMP commands, so
/// only unreserved characters are allowed, plus `/` between application
/// segments.
fn check_path(field: &'static str, value: &str, nested: bool) -> Result<(), ParameterError> {
    let malformed = |reason: &str| ParameterError::Malformed {
        field,
        reason: reason.to_string(),
    };

    if let Some(c) = value.chars().find(|&c| {
        !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~') || (nested && c == '/'))
    }) {
        return Err(malformed(&format!("character {c:?} is not allowed")));
    }
    for segment in value.split('/') {
        match segment {
            "" => return Err(malformed("empty path segment")),
            "." | ".." => return Err(malformed("relative path segment")),
            _ => {}
        }
    }
    Ok(())
}

fn check_token(field: &'static str, value: &str) -> Result<(), ParameterError> {
    if value.trim().is_empty() {
        return Err(ParameterError::Empty(field));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(ParameterError::Malformed {
            field,
            reason: "contains whitespace".to_string(),
        });
    }
    Ok(())
}

/// Keyed digest proving a start request is authorised, as 64 lowercase hex characters.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature(String);

impl Signature {
    /// Wrap a raw SHA-256 sized digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parse a hex signature handed over by the host.
    pub fn parse(value: &str) -> Result<Self, ParameterError> {
        if value.is_empty() {
            return Err(ParameterError::Empty("signature"));
        }
        if value.len() != SIGNATURE_HEX_LEN {
            return Err(ParameterError::Malformed {
                field: "signature",
                reason: format!("expected {SIGNATURE_HEX_LEN} hex characters, got {}", value.len()),
            });
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(ParameterError::Malformed {
                field: "signature",
                reason: "expected lowercase hexadecimal".to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }

    /// The hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Signature {
    type Error = ParameterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Signature> for String {
    fn from(signature: Signature) -> Self {
        signature.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}…)", &self.0[..8])
    }
}

/// Capture and encode preset used by the camera view and the publisher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamQuality {
    /// 640x360, 1 Mbps.
    Low360p,

    /// 1280x720, 3.75 Mbps.
    #[default]
    Medium720p,

    /// 1920x1080, 5 Mbps.
    High1080p,
}

impl StreamQuality {
    /// Frames per second for every preset.
    pub const FRAME_RATE: u32 = 30;

    /// Keyframe interval in frames for every preset.
    pub const KEYFRAME_INTERVAL: u32 = 30;

    /// Audio sample rate in Hz.
    pub const AUDIO_SAMPLE_RATE: u32 = 44_100;

    /// Audio bitrate in kbps.
    pub const AUDIO_BITRATE_KBPS: u32 = 64;

    /// Frame width and height in pixels.
    pub fn frame_size(self) -> (u32, u32) {
        match self {
            Self::Low360p => (640, 360),
            Self::Medium720p => (1280, 720),
            Self::High1080p => (1920, 1080),
        }
    }

    /// Video bitrate in kbps.
    pub fn video_bitrate_kbps(self) -> u32 {
        match self {
            Self::Low360p => 1000,
            Self::Medium720p => 3750,
            Self::High1080p => 5000,
        }
    }
}

/// What `start` does when a session already holds the live slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Refuse the new start with a session conflict.
    #[default]
    Reject,

    /// Stop the running session, then start the new one.
    Restart,
}

/// How the broadcast capability is decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityMode {
    /// Decide from the build target.
    #[default]
    Auto,

    /// Always report support.
    Enabled,

    /// Never report support.
    Disabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParameters {
        ConnectionParameters::new("wowza.example.com", DEFAULT_RTMP_PORT, "live", "cam1")
    }

    #[test]
    fn test_validate_accepts_complete_parameters() {
        assert_eq!(params().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut p = params();
        p.host = "  ".to_string();
        assert_eq!(p.validate(), Err(ParameterError::Empty("host")));

        let mut p = params();
        p.stream_name.clear();
        assert_eq!(p.validate(), Err(ParameterError::Empty("stream name")));

        let mut p = params();
        p.port = 0;
        assert_eq!(p.validate(), Err(ParameterError::InvalidPort));
    }

    #[test]
    fn test_rtmp_url() {
        let url = params().rtmp_url().unwrap();
        assert_eq!(url.as_str(), "rtmp://wowza.example.com:1935/live");
        assert_eq!(url.host_str(), Some("wowza.example.com"));
    }

    #[test]
    fn test_application_must_survive_url_parsing() {
        for application in ["li#ve", "live/../other", "./live", "live/.", "li%76e", "live?x=1", "live//a", "live:1"] {
            let mut p = params();
            p.application = application.to_string();
            assert!(
                matches!(p.validate(), Err(ParameterError::Malformed { field: "application", .. })),
                "{application} accepted"
            );
        }

        let mut p = params();
        p.application = "live/_definst_".to_string();
        assert_eq!(p.validate(), Ok(()));
        assert_eq!(p.rtmp_url().unwrap().path(), "/live/_definst_");
    }

    #[test]
    fn test_stream_name_rejects_reserved_characters() {
        for stream in ["cam#1", "cam/1", "cam?1", "..", "cam%201"] {
            let mut p = params();
            p.stream_name = stream.to_string();
            assert!(
                matches!(p.validate(), Err(ParameterError::Malformed { field: "stream name", .. })),
                "{stream} accepted"
            );
        }
    }

    #[test]
    fn test_host_must_be_plain() {
        for host in ["wowza.example.com:80", "[bad", "::1", "user@wowza.example.com", "wowza.example.com/x"] {
            let mut p = params();
            p.host = host.to_string();
            assert!(
                matches!(p.validate(), Err(ParameterError::Malformed { field: "host", .. })),
                "{host} accepted"
            );
        }

        let mut p = params();
        p.host = "[::1]".to_string();
        assert_eq!(p.validate(), Ok(()));
        p.host = "127.0.0.1".to_string();
        assert_eq!(p.validate(), Ok(()));
    }

    #[test]
    fn test_debug_redacts_password() {
        let p = params().with_credentials("user", "hunter2");
        let rendered = format!("{p:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_signature_parse() {
        let hex = "a".repeat(64);
        assert_eq!(Signature::parse(&hex).unwrap().as_str(), hex);
        assert_eq!(Signature::parse(""), Err(ParameterError::Empty("signature")));
        assert!(Signature::parse("abc").is_err());
        assert!(Signature::parse(&"A".repeat(64)).is_err());
    }

    #[test]
    fn test_signature_serde_validates() {
        let ok: Result<Signature, _> = serde_json::from_str(&format!("\"{}\"", "0f".repeat(32)));
        assert!(ok.is_ok());
        let bad: Result<Signature, _> = serde_json::from_str("\"not-hex\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_quality_presets() {
        assert_eq!(StreamQuality::default(), StreamQuality::Medium720p);
        assert_eq!(StreamQuality::Low360p.frame_size(), (640, 360));
        assert_eq!(StreamQuality::High1080p.video_bitrate_kbps(), 5000);
    }
}
