//! Pre-flight URL policy guard.
//!
//! Every request target is checked against the scheme policy and the optional
//! base-site scope before any network I/O happens. The check is pure: it only
//! parses and compares URLs.
//!
//! | base site | URL      | rule |
//! |-----------|----------|------|
//! | none      | relative | rejected ([`PolicyError::RelativeUrlNotAllowed`]) |
//! | none      | `https`  | allowed |
//! | none      | `http`   | allowed only when `only_https` is false |
//! | none      | other    | rejected ([`PolicyError::UnsupportedScheme`]) |
//! | set       | absolute | origin must equal the base site |
//! | set       | relative | resolved against the base site, origin must still match |

use bytes::Bytes;
use reqwest::Method;
use url::Url;

use super::error::PolicyError;

/// One request as seen by the guard and the retry executor.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// Absolute URL, or a URL relative to `base_site`.
    pub url: String,
    /// HTTP method.
    pub method: Method,
    /// Request body for `POST`.
    pub body: Option<Bytes>,
    /// Site every request must stay on, e.g. `https://a.com`.
    pub base_site: Option<String>,
    /// Reject plain `http` when no base site is set.
    pub only_https: bool,
}

impl RequestSpec {
    /// A `GET` request with the default (https-only, unscoped) policy.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            body: None,
            base_site: None,
            only_https: true,
        }
    }

    /// A `POST` request carrying `body`.
    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::POST,
            body: Some(body.into()),
            ..Self::get(url)
        }
    }

    /// Scopes the request to `base_site`.
    #[must_use]
    pub fn with_base_site(mut self, base_site: Option<String>) -> Self {
        self.base_site = base_site;
        self
    }

    /// Sets the https-only flag.
    #[must_use]
    pub fn with_only_https(mut self, only_https: bool) -> Self {
        self.only_https = only_https;
        self
    }

    /// Runs the guard and returns the resolved absolute URL.
    ///
    /// # Errors
    ///
    /// Returns the [`PolicyError`] describing why the URL is refused.
    pub fn validate(&self) -> Result<Url, PolicyError> {
        validate_request_url(&self.url, self.base_site.as_deref(), self.only_https)
    }
}

/// Validates `url` and returns it resolved to an absolute [`Url`].
///
/// # Errors
///
/// Returns a [`PolicyError`] when the URL is relative without a base site,
/// uses a scheme the policy does not allow, or leaves the base site.
pub fn validate_request_url(
    url: &str,
    base_site: Option<&str>,
    only_https: bool,
) -> Result<Url, PolicyError> {
    match (Url::parse(url), base_site) {
        (Ok(parsed), None) => check_scheme(url, parsed, only_https),
        (Ok(parsed), Some(site)) => check_scope(url, parsed, site),
        (Err(url::ParseError::RelativeUrlWithoutBase), None) => {
            Err(PolicyError::RelativeUrlNotAllowed {
                url: url.to_string(),
            })
        }
        (Err(url::ParseError::RelativeUrlWithoutBase), Some(site)) => {
            let base = parse_site(site)?;
            let joined = base.join(url).map_err(|e| PolicyError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            check_scope(url, joined, site)
        }
        (Err(e), _) => Err(PolicyError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Normalizes a site to its `scheme://host[:port]` form.
///
/// Default ports are dropped and scheme and host are lowercased, so
/// `HTTPS://A.com:443/` becomes `https://a.com`.
///
/// # Errors
///
/// Returns [`PolicyError::InvalidUrl`] when the site is not an absolute
/// URL with a host.
pub fn normalize_site(site: &str) -> Result<String, PolicyError> {
    let parsed = parse_site(site)?;
    Ok(parsed.origin().ascii_serialization())
}

fn parse_site(site: &str) -> Result<Url, PolicyError> {
    let parsed = Url::parse(site).map_err(|e| PolicyError::InvalidUrl {
        url: site.to_string(),
        reason: e.to_string(),
    })?;
    if !parsed.origin().is_tuple() {
        return Err(PolicyError::InvalidUrl {
            url: site.to_string(),
            reason: "base site must have a host".to_string(),
        });
    }
    Ok(parsed)
}

fn check_scheme(raw: &str, parsed: Url, only_https: bool) -> Result<Url, PolicyError> {
    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" if !only_https => Ok(parsed),
        "http" => Err(PolicyError::InsecureSchemeRejected {
            url: raw.to_string(),
        }),
        other => Err(PolicyError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: other.to_string(),
        }),
    }
}

fn check_scope(raw: &str, resolved: Url, site: &str) -> Result<Url, PolicyError> {
    let expected = normalize_site(site)?;
    if resolved.origin().ascii_serialization() == expected {
        Ok(resolved)
    } else {
        Err(PolicyError::SiteScopeViolation {
            url: raw.to_string(),
            base_site: site.to_string(),
        })
    }
}
