//! Boundary utilities: pure, stateless validation functions enforced at every
//! point this subsystem accepts a URL, filesystem path, dynamic SQL
//! identifier, or string destined for a log line (spec §4.1).
//!
//! None of these functions panic and none of them log — callers decide what
//! to do with a [`SecurityError`]. The only I/O performed anywhere in this
//! module is the DNS resolution inside [`url::validate_url`].

pub mod identifier;
pub mod log_sanitize;
pub mod path;
pub mod url;

/// The specific rule a boundary utility rejected input for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
    #[error("url is empty")]
    EmptyUrl,
    #[error("url is not syntactically valid: {0}")]
    MalformedUrl(String),
    #[error("scheme `{0}` is not in the allowed scheme list")]
    DisallowedScheme(String),
    #[error("url has no hostname")]
    EmptyHost,
    #[error("host `{0}` is blocked")]
    BlockedHost(String),
    #[error("host `{0}` is not in the allow-list")]
    HostNotAllowed(String),
    #[error("host `{0}` resolves to a private/reserved address ({1}) — rejected to prevent SSRF")]
    PrivateAddress(String, String),
    #[error("DNS resolution failed for host `{0}`: {1}")]
    DnsResolutionFailed(String, String),
    #[error("path is empty")]
    EmptyPath,
    #[error("path contains a `..` traversal segment")]
    PathTraversal,
    #[error("path contains a NUL byte")]
    NulByte,
    #[error("path `{0}` targets a restricted system directory")]
    RestrictedPath(String),
    #[error("identifier is empty")]
    EmptyIdentifier,
    #[error("identifier `{0}` does not match `^[A-Za-z_][A-Za-z0-9_]*$`")]
    InvalidIdentifierShape(String),
    #[error("identifier `{0}` is a reserved SQL keyword")]
    ReservedIdentifier(String),
}
