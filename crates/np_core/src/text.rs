//! Text, URL and date helpers shared by every source.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref SPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref INTEGER_RE: Regex = Regex::new(r"\d+(?:[ \u{a0}\u{202f}]\d{3})*").unwrap();
}

/// Strips markup and collapses whitespace runs into single spaces.
pub fn clean_text(text: &str) -> String {
    let without_tags = TAG_RE.replace_all(text, " ");
    SPACE_RE.replace_all(&without_tags, " ").trim().to_string()
}

/// Turns a possibly relative reference into an absolute URL.
///
/// * absolute `http(s)://` references are returned unchanged
/// * protocol-relative `//host/...` gets `https:`
/// * root-relative `/path` is joined onto the scheme and host of `base`
/// * anything else is appended to `base` with a single `/`
pub fn normalize_url(reference: &str, base: &str) -> String {
    let reference = reference.trim();
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.to_string();
    }
    if let Some(rest) = reference.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    if reference.starts_with('/') {
        return format!("{}{}", origin_of(base), reference);
    }
    format!("{}/{}", base.trim_end_matches('/'), reference)
}

fn origin_of(base: &str) -> String {
    match Url::parse(base) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}://{}:{}", url.scheme(), host, port),
            (Some(host), None) => format!("{}://{}", url.scheme(), host),
            _ => base.trim_end_matches('/').to_string(),
        },
        Err(_) => base.splitn(4, '/').take(3).collect::<Vec<_>>().join("/"),
    }
}

/// Forces a media URL onto `https`.
///
/// Returns `None` for values that cannot be turned into an absolute https URL
/// (bare paths, data URIs, other schemes).
pub fn ensure_https(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value.starts_with("https://") {
        return Some(value.to_string());
    }
    if let Some(rest) = value.strip_prefix("http://") {
        return Some(format!("https://{}", rest));
    }
    if let Some(rest) = value.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    if value.starts_with('/') || value.contains(':') {
        return None;
    }
    let host = value.split('/').next().unwrap_or_default();
    if host.contains('.') && !host.contains(char::is_whitespace) {
        Some(format!("https://{}", value))
    } else {
        None
    }
}

/// Lower-cased host of an absolute URL.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// Drops a leading `www.` from a host.
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// The last two labels of a host, or the last three when the second-level
/// label is a generic one such as `com.ua`.
pub fn registrable_domain(host: &str) -> String {
    let labels: Vec<&str> = host.trim_end_matches('.').split('.').collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }
    let second = labels[labels.len() - 2];
    let keep = if matches!(second, "com" | "net" | "org" | "gov" | "edu" | "in" | "co") {
        3
    } else {
        2
    };
    labels[labels.len().saturating_sub(keep)..].join(".")
}

/// Whether two URLs belong to the same site.
///
/// Without `subdomain_aware` the hosts must match exactly (ignoring `www.`).
/// With it, any two hosts under the same registrable domain match, so
/// `life.pravda.com.ua` and `www.pravda.com.ua` are the same site.
pub fn same_site(a: &str, b: &str, subdomain_aware: bool) -> bool {
    match (host_of(a), host_of(b)) {
        (Some(ha), Some(hb)) => {
            if subdomain_aware {
                registrable_domain(strip_www(&ha)) == registrable_domain(strip_www(&hb))
            } else {
                strip_www(&ha) == strip_www(&hb)
            }
        }
        _ => false,
    }
}

/// Date filter used for articles.
///
/// An article is kept unless both its timestamp and the boundary are known and
/// the article's calendar day falls before the boundary's calendar day.
pub fn date_is_acceptable(candidate: Option<DateTime<Utc>>, boundary: Option<DateTime<Utc>>) -> bool {
    match (candidate, boundary) {
        (Some(candidate), Some(boundary)) => candidate.date_naive() >= boundary.date_naive(),
        _ => true,
    }
}

/// First integer in a text, accepting space-grouped thousands ("12 345").
pub fn first_integer(text: &str) -> Option<u64> {
    INTEGER_RE.find(text).and_then(|m| {
        m.as_str()
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .ok()
    })
}
