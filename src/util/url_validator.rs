use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

/// Why a source URL was refused.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("Private address not allowed: {0}")]
    PrivateHost(String),
}

/// Which hosts a feed source may point at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostPolicy {
    /// Reject localhost, loopback, private, link-local and unspecified addresses.
    #[default]
    PublicOnly,
    /// Accept any host. Meant for feeds served inside a trusted network.
    AllowPrivate,
}

impl HostPolicy {
    pub fn from_allow_private(allow_private_hosts: bool) -> Self {
        if allow_private_hosts {
            HostPolicy::AllowPrivate
        } else {
            HostPolicy::PublicOnly
        }
    }
}

/// Parse and check a feed source URL.
///
/// Only `http` and `https` are accepted. Under [`HostPolicy::PublicOnly`],
/// hosts that resolve syntactically to internal addresses are refused so a
/// config file cannot turn the poller into an internal network probe.
/// Hostnames are not resolved.
///
/// ```
/// use newsservice::util::{validate_source_url, HostPolicy};
///
/// assert!(validate_source_url("https://example.com/rss", HostPolicy::PublicOnly).is_ok());
/// assert!(validate_source_url("http://10.0.0.8/rss", HostPolicy::PublicOnly).is_err());
/// assert!(validate_source_url("http://10.0.0.8/rss", HostPolicy::AllowPrivate).is_ok());
/// ```
pub fn validate_source_url(url_str: &str, policy: HostPolicy) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host().ok_or(UrlValidationError::MissingHost)?;
    if policy == HostPolicy::AllowPrivate {
        return Ok(url);
    }

    let internal = match &host {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Host::Ipv4(ip) => is_internal_ip(&IpAddr::V4(*ip)),
        Host::Ipv6(ip) => is_internal_ip(&IpAddr::V6(*ip)),
    };
    if internal {
        return Err(UrlValidationError::PrivateHost(host.to_string()));
    }

    Ok(url)
}

fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_internal_ip(&IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link local
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
        }
    }
}
