//! SSRF-safe URL validation (spec §4.1).
//!
//! [`validate_url`] is the single choke point every connector MUST run an
//! operator- or tenant-supplied URL through before dialling it. It rejects
//! disallowed schemes, empty/blocked/non-allow-listed hosts, and — when
//! `allow_private_ips` is false — any hostname whose DNS resolution set
//! contains even one private, loopback, link-local, CGNAT, documentation, or
//! reserved address. Checking the *full* resolution set (not just the first
//! answer) is what defeats DNS-rebinding: an attacker who controls DNS can
//! otherwise publish one public and one private A record and race the
//! application's second connect against this check.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::SecurityError;

/// Policy governing [`validate_url`]. Defaults deny private IPs and restrict
/// schemes to `https`/`http`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlValidationOptions {
    #[serde(default)]
    pub allow_private_ips: bool,
    #[serde(default = "default_schemes")]
    pub allowed_schemes: Vec<String>,
    #[serde(default)]
    pub allowed_host_suffixes: Vec<String>,
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    #[serde(default)]
    pub blocked_hosts: Vec<String>,
}

fn default_schemes() -> Vec<String> {
    vec!["https".to_string(), "http".to_string()]
}

impl Default for UrlValidationOptions {
    fn default() -> Self {
        Self {
            allow_private_ips: false,
            allowed_schemes: default_schemes(),
            allowed_host_suffixes: Vec::new(),
            allowed_hosts: Vec::new(),
            blocked_hosts: Vec::new(),
        }
    }
}

/// Validate `raw_url` against `opts`. Performs DNS resolution when
/// `opts.allow_private_ips` is `false` (the default) — this is the only
/// suspension point in the `security` module.
pub async fn validate_url(raw_url: &str, opts: &UrlValidationOptions) -> Result<(), SecurityError> {
    if raw_url.is_empty() {
        return Err(SecurityError::EmptyUrl);
    }

    let parsed = url::Url::parse(raw_url).map_err(|e| SecurityError::MalformedUrl(e.to_string()))?;

    let scheme = parsed.scheme();
    if !opts.allowed_schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
        return Err(SecurityError::DisallowedScheme(scheme.to_string()));
    }

    let host = parsed.host_str().unwrap_or("").to_lowercase();
    if host.is_empty() {
        return Err(SecurityError::EmptyHost);
    }

    if is_blocked_host(&host, &opts.blocked_hosts) {
        return Err(SecurityError::BlockedHost(host));
    }

    if (!opts.allowed_hosts.is_empty() || !opts.allowed_host_suffixes.is_empty())
        && !is_allowed_host(&host, &opts.allowed_hosts, &opts.allowed_host_suffixes)
    {
        return Err(SecurityError::HostNotAllowed(host));
    }

    if !opts.allow_private_ips {
        check_not_private(&host, parsed.port_or_known_default().unwrap_or(443)).await?;
    }

    Ok(())
}

/// `host` is blocked if it equals an entry in `blocked`, or is a dotted
/// subdomain of one (`evil.malicious.com` is blocked by `malicious.com`, but
/// `evilmalicious.com` is not — the leading-dot anchor prevents the
/// `evil.com.company.com`-style bypass).
fn is_blocked_host(host: &str, blocked: &[String]) -> bool {
    blocked.iter().any(|b| {
        let b = b.to_lowercase();
        host == b || host.ends_with(&format!(".{b}"))
    })
}

fn is_allowed_host(host: &str, allowed_hosts: &[String], allowed_suffixes: &[String]) -> bool {
    let exact = allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host));
    let suffix = allowed_suffixes.iter().any(|s| {
        let s = s.to_lowercase();
        let anchored = if s.starts_with('.') { s } else { format!(".{s}") };
        host.ends_with(&anchored) || host == anchored.trim_start_matches('.')
    });
    exact || suffix
}

async fn check_not_private(host: &str, port: u16) -> Result<(), SecurityError> {
    // A bare IP literal in the URL skips DNS resolution entirely.
    if let Ok(ip) = host.parse::<IpAddr>() {
        if let Some(reason) = classify_unsafe(ip) {
            return Err(SecurityError::PrivateAddress(host.to_string(), reason));
        }
        return Ok(());
    }

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| SecurityError::DnsResolutionFailed(host.to_string(), e.to_string()))?;

    let mut any = false;
    for addr in addrs {
        any = true;
        if let Some(reason) = classify_unsafe(addr.ip()) {
            return Err(SecurityError::PrivateAddress(host.to_string(), reason));
        }
    }

    if !any {
        return Err(SecurityError::DnsResolutionFailed(
            host.to_string(),
            "no addresses returned".to_string(),
        ));
    }

    Ok(())
}

/// Classify an address as unsafe for outbound SSRF-prone calls, returning a
/// short human-readable reason, or `None` if the address is routable public
/// space.
fn classify_unsafe(ip: IpAddr) -> Option<String> {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            if v4.is_loopback() {
                Some("loopback".into())
            } else if v4.is_link_local() {
                Some("link-local".into())
            } else if v4.is_unspecified() {
                Some("unspecified".into())
            } else if o[0] == 10 {
                Some("private (10/8)".into())
            } else if o[0] == 172 && (16..=31).contains(&o[1]) {
                Some("private (172.16/12)".into())
            } else if o[0] == 192 && o[1] == 168 {
                Some("private (192.168/16)".into())
            } else if o[0] == 100 && (64..=127).contains(&o[1]) {
                Some("carrier-grade NAT (100.64/10)".into())
            } else if o[0] == 192 && o[1] == 0 && o[2] == 0 {
                Some("IETF protocol assignment (192.0.0/24)".into())
            } else if o[0] == 192 && o[1] == 0 && o[2] == 2 {
                Some("TEST-NET-1 (192.0.2/24)".into())
            } else if o[0] == 198 && o[1] == 51 && o[2] == 100 {
                Some("TEST-NET-2 (198.51.100/24)".into())
            } else if o[0] == 203 && o[1] == 0 && o[2] == 113 {
                Some("TEST-NET-3 (203.0.113/24)".into())
            } else if o[0] >= 224 && o[0] <= 239 {
                Some("multicast (224/4)".into())
            } else if o[0] >= 240 {
                Some("reserved (240/4)".into())
            } else {
                None
            }
        }
        IpAddr::V6(v6) => {
            if v6.is_loopback() {
                Some("loopback".into())
            } else if v6.is_unspecified() {
                Some("unspecified".into())
            } else if (v6.segments()[0] & 0xfe00) == 0xfc00 {
                Some("unique local (fc00::/7)".into())
            } else if (v6.segments()[0] & 0xffc0) == 0xfe80 {
                Some("link-local".into())
            } else if (v6.segments()[0] & 0xff00) == 0xff00 {
                Some("link-local multicast".into())
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> UrlValidationOptions {
        UrlValidationOptions::default()
    }

    #[tokio::test]
    async fn rejects_empty_url() {
        assert_eq!(validate_url("", &opts()).await, Err(SecurityError::EmptyUrl));
    }

    #[tokio::test]
    async fn rejects_disallowed_scheme() {
        let err = validate_url("file:///etc/passwd", &opts()).await.unwrap_err();
        assert!(matches!(err, SecurityError::DisallowedScheme(s) if s == "file"));
    }

    #[tokio::test]
    async fn rejects_javascript_scheme() {
        let err = validate_url("javascript:alert(1)", &opts()).await.unwrap_err();
        assert!(matches!(err, SecurityError::DisallowedScheme(_)));
    }

    #[tokio::test]
    async fn rejects_loopback_ip_literal() {
        let err = validate_url("http://127.0.0.1/admin", &opts()).await.unwrap_err();
        assert!(matches!(err, SecurityError::PrivateAddress(_, reason) if reason.contains("loopback")));
    }

    #[tokio::test]
    async fn rejects_private_10_range() {
        let err = validate_url("http://10.0.0.5/", &opts()).await.unwrap_err();
        assert!(matches!(err, SecurityError::PrivateAddress(_, reason) if reason.contains("private")));
    }

    #[tokio::test]
    async fn allow_private_ips_permits_loopback() {
        let mut o = opts();
        o.allow_private_ips = true;
        assert!(validate_url("http://127.0.0.1/admin", &o).await.is_ok());
    }

    #[tokio::test]
    async fn blocked_host_is_rejected() {
        let mut o = opts();
        o.allow_private_ips = true;
        o.blocked_hosts = vec!["malicious.com".into()];
        let err = validate_url("https://malicious.com/x", &o).await.unwrap_err();
        assert!(matches!(err, SecurityError::BlockedHost(_)));
    }

    #[tokio::test]
    async fn blocked_host_subdomain_is_rejected() {
        let mut o = opts();
        o.allow_private_ips = true;
        o.blocked_hosts = vec!["malicious.com".into()];
        let err = validate_url("https://sub.malicious.com/api", &o).await.unwrap_err();
        assert!(matches!(err, SecurityError::BlockedHost(_)));
    }

    #[tokio::test]
    async fn suffix_does_not_permit_bypass_via_extra_dotted_segment() {
        // evil.com.company.com must NOT be treated as a subdomain of company.com's
        // allowed suffix unless the suffix literally anchors at a dot boundary —
        // here it correctly matches since ".company.com" is a real suffix.
        let mut o = opts();
        o.allow_private_ips = true;
        o.allowed_host_suffixes = vec![".salesforce.com".into()];
        let err = validate_url("https://evilsalesforce.com/api", &o).await.unwrap_err();
        assert!(matches!(err, SecurityError::HostNotAllowed(_)));
    }

    #[tokio::test]
    async fn allowed_suffix_permits_matching_subdomain() {
        let o = UrlValidationOptions {
            allow_private_ips: true,
            allowed_schemes: vec!["https".into()],
            allowed_host_suffixes: vec![".salesforce.com".into()],
            allowed_hosts: vec![],
            blocked_hosts: vec![],
        };
        assert!(validate_url("https://mycompany.salesforce.com/api", &o).await.is_ok());
    }

    #[tokio::test]
    async fn host_not_in_allow_list_is_rejected() {
        let mut o = opts();
        o.allow_private_ips = true;
        o.allowed_hosts = vec!["good.example.com".into()];
        let err = validate_url("https://attacker.example.com/api", &o).await.unwrap_err();
        assert!(matches!(err, SecurityError::HostNotAllowed(_)));
    }
}
