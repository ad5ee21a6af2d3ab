use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified error kinds recorded for failed extraction targets
///
/// Transient kinds are retried with backoff; the rest terminate the item on
/// first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// URL could not be parsed; never retried
    MalformedUrl,
    /// Timeout, connection reset, or similar network fault
    TransientNetwork,
    /// Explicit throttling response (HTTP 429)
    RateLimited,
    /// HTTP 5xx from the portal
    ServerError,
    /// HTTP 404
    NotFound,
    /// Other HTTP 4xx
    ClientError,
    /// Content did not match the expected section page structure
    ParseError,
}

impl ErrorKind {
    /// Returns true if an error of this kind is worth retrying
    ///
    /// A parse failure caused by a truncated response is indistinguishable
    /// from structurally bad content, so `ParseError` is terminal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientNetwork | Self::RateLimited | Self::ServerError
        )
    }

    /// Stable string label, matching the serialized form
    pub fn label(&self) -> &'static str {
        match self {
            Self::MalformedUrl => "malformed_url",
            Self::TransientNetwork => "transient_network",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::NotFound => "not_found",
            Self::ClientError => "client_error",
            Self::ParseError => "parse_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A leaf URL found by the discovery traversal
///
/// Unique by canonical URL; appended once and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredTarget {
    pub canonical_url: String,
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredTarget {
    pub fn new(canonical_url: impl Into<String>) -> Self {
        Self {
            canonical_url: canonical_url.into(),
            discovered_at: Utc::now(),
        }
    }
}

/// Canonical structured record for one regulation section
///
/// The hierarchy fields are each optional: not every section sits under every
/// level of the Title / Division / Chapter / Subchapter / Article structure.
/// Unique by source URL; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub title_number: Option<u32>,
    pub title_name: Option<String>,
    pub division: Option<String>,
    pub chapter: Option<String>,
    pub subchapter: Option<String>,
    pub article: Option<String>,

    pub section_number: String,
    pub section_heading: String,

    pub citation: String,
    pub breadcrumb_path: String,
    pub source_url: String,

    /// Section body converted to Markdown
    pub content: String,

    pub retrieved_at: DateTime<Utc>,
}

/// A target whose extraction attempts were exhausted or terminally failed
///
/// May be superseded by a later successful record for the same URL (the
/// recovery pass appends, it does not rewrite); reconciliation treats the
/// extracted record as authoritative in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTarget {
    pub canonical_url: String,
    pub error_kind: ErrorKind,
    pub attempt_count: u32,
    pub last_error_message: String,
    pub last_attempt_at: DateTime<Utc>,
}

impl FailedTarget {
    pub fn new(
        canonical_url: impl Into<String>,
        error_kind: ErrorKind,
        attempt_count: u32,
        last_error_message: impl Into<String>,
    ) -> Self {
        Self {
            canonical_url: canonical_url.into(),
            error_kind,
            attempt_count,
            last_error_message: last_error_message.into(),
            last_attempt_at: Utc::now(),
        }
    }
}
