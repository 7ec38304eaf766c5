//! URL validation against server-side request forgery.
//!
//! Any URL supplied by a caller must pass [`validate_url`] before it is
//! fetched. Accepted URLs:
//!
//! - parse as absolute URLs with an `http` or `https` scheme
//! - carry no username or password
//! - do not point at `localhost`, loopback, unspecified, private, link-local
//!   or unique-local addresses, or at a known cloud metadata endpoint
//!
//! Host names are compared case-insensitively and without a trailing dot.
//! IPv4 literals in any form the URL parser accepts (`0x7f.1`, `2130706433`)
//! and IPv4-mapped IPv6 addresses (`::ffff:127.0.0.1`) are checked as the
//! IPv4 address they denote. Host names are not resolved, so a public name
//! that resolves to a private address is accepted.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tracing::debug;
use url::{Host, Url};

use crate::error::{UrlRejection, UrlValidationError};
use crate::metrics;

const METADATA_HOSTS: &[&str] = &["metadata.google.internal", "metadata", "metadata.azure.com"];

const METADATA_ADDRS: &[IpAddr] = &[
    // AWS, GCP, Azure, OpenStack
    IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254)),
    // AWS ECS task metadata
    IpAddr::V4(Ipv4Addr::new(169, 254, 170, 2)),
    // Alibaba Cloud
    IpAddr::V4(Ipv4Addr::new(100, 100, 100, 200)),
    // AWS IMDS over IPv6
    IpAddr::V6(Ipv6Addr::new(0xfd00, 0xec2, 0, 0, 0, 0, 0, 0x254)),
];

/// Outcome of [`validate_url_with_result`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlValidationResult {
    /// Whether the URL may be fetched.
    pub is_valid: bool,
    /// Normalized URL, present iff valid.
    pub normalized_url: Option<String>,
    /// Rejection, present iff invalid.
    pub error: Option<UrlValidationError>,
}

/// Parse `input` and check it against the SSRF rules.
///
/// ```
/// use backstop::ssrf::validate_url;
///
/// assert!(validate_url("https://example.com/a?b=1#c").is_ok());
/// let err = validate_url("http://169.254.169.254/latest/meta-data").unwrap_err();
/// assert_eq!(err.reason.kind(), "metadata");
/// ```
pub fn validate_url(input: &str) -> Result<Url, UrlValidationError> {
    check_url(input).map_err(|reason| {
        debug!(url = input, reason = reason.kind(), "URL rejected: {reason}");
        metrics::record_url_rejection(reason.kind());
        UrlValidationError {
            url: input.to_string(),
            reason,
        }
    })
}

/// Returns `true` if [`validate_url`] rejects `input`.
pub fn is_blocked_url(input: &str) -> bool {
    validate_url(input).is_err()
}

/// Validate `input` and return it in normalized form.
///
/// Normalization lowercases the scheme and host, resolves IPv4 shorthand and
/// adds the root path when it is missing.
pub fn sanitize_url(input: &str) -> Result<String, UrlValidationError> {
    validate_url(input).map(String::from)
}

/// Non-failing form of [`validate_url`].
pub fn validate_url_with_result(input: &str) -> UrlValidationResult {
    match validate_url(input) {
        Ok(url) => UrlValidationResult {
            is_valid: true,
            normalized_url: Some(url.into()),
            error: None,
        },
        Err(error) => UrlValidationResult {
            is_valid: false,
            normalized_url: None,
            error: Some(error),
        },
    }
}

/// Returns `true` if `ip` is an IP literal in a blocked address class.
///
/// Covers loopback, unspecified, private, link-local and unique-local
/// ranges. Brackets around IPv6 literals are accepted. Anything that is not
/// an IP literal returns `false`.
pub fn is_private_ip(ip: &str) -> bool {
    parse_ip(ip).is_some_and(is_private_addr)
}

/// Returns `true` if `addr` is in a blocked address class.
pub fn is_private_addr(addr: IpAddr) -> bool {
    classify_addr(canonical(addr)).is_some()
}

/// Returns `true` if `host` names a known cloud metadata endpoint.
///
/// Accepts a host name or an IP literal, compared case-insensitively.
pub fn is_metadata_endpoint(host: &str) -> bool {
    match parse_ip(host) {
        Some(addr) => METADATA_ADDRS.contains(&canonical(addr)),
        None => {
            let host = normalize_host(host);
            METADATA_HOSTS.contains(&host.as_str())
        }
    }
}

fn check_url(input: &str) -> Result<Url, UrlRejection> {
    let url = Url::parse(input.trim()).map_err(|err| UrlRejection::Malformed(err.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlRejection::UnsupportedScheme(other.to_string())),
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(UrlRejection::EmbeddedCredentials);
    }

    match url.host() {
        None => return Err(UrlRejection::MissingHost),
        Some(Host::Domain(domain)) => check_domain(domain)?,
        Some(Host::Ipv4(addr)) => check_addr(IpAddr::V4(addr))?,
        Some(Host::Ipv6(addr)) => check_addr(IpAddr::V6(addr))?,
    }

    Ok(url)
}

fn check_domain(domain: &str) -> Result<(), UrlRejection> {
    let host = normalize_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return Err(UrlRejection::Localhost);
    }
    if METADATA_HOSTS.contains(&host.as_str()) {
        return Err(UrlRejection::MetadataEndpoint(host));
    }
    Ok(())
}

fn check_addr(addr: IpAddr) -> Result<(), UrlRejection> {
    let addr = canonical(addr);
    // Metadata addresses overlap the link-local and unique-local ranges.
    if METADATA_ADDRS.contains(&addr) {
        return Err(UrlRejection::MetadataEndpoint(addr.to_string()));
    }
    match classify_addr(addr) {
        Some(rejection) => Err(rejection),
        None => Ok(()),
    }
}

fn classify_addr(addr: IpAddr) -> Option<UrlRejection> {
    match addr {
        IpAddr::V4(v4) => {
            if v4.is_loopback() {
                Some(UrlRejection::Loopback(addr))
            } else if v4.octets()[0] == 0 {
                Some(UrlRejection::Unspecified(addr))
            } else if v4.is_private() {
                Some(UrlRejection::PrivateNetwork(addr))
            } else if v4.is_link_local() {
                Some(UrlRejection::LinkLocal(addr))
            } else {
                None
            }
        }
        IpAddr::V6(v6) => {
            if v6.is_loopback() {
                Some(UrlRejection::Loopback(addr))
            } else if v6.is_unspecified() {
                Some(UrlRejection::Unspecified(addr))
            } else if v6.is_unique_local() {
                Some(UrlRejection::PrivateNetwork(addr))
            } else if v6.is_unicast_link_local() {
                Some(UrlRejection::LinkLocal(addr))
            } else {
                None
            }
        }
    }
}

/// IPv4-mapped IPv6 addresses are checked as IPv4.
fn canonical(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map_or(addr, IpAddr::V4),
        IpAddr::V4(_) => addr,
    }
}

fn parse_ip(input: &str) -> Option<IpAddr> {
    let trimmed = input.trim();
    let unbracketed = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);
    unbracketed.parse().ok()
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}
