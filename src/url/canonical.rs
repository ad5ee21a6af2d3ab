use crate::UrlError;
use url::Url;

/// Query parameters that never affect which document a URL selects.
///
/// Covers the common tracking family plus the portal's own session baggage;
/// `guid` and `viewType` select distinct documents and are always preserved.
const SESSION_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
    "transitiontype",
    "contextdata",
    "originationcontext",
    "rs",
    "vr",
    "bhcp",
];

/// Canonicalizes a URL into the identity key used everywhere in the pipeline
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Validate scheme (HTTP or HTTPS only)
/// 3. Lowercase the host
/// 4. Remove www. prefix from the host
/// 5. Normalize path:
///    - Remove dot segments (. and ..)
///    - Collapse repeated slashes
///    - Remove trailing slash (except for root /)
/// 6. Remove fragment (everything after #)
/// 7. Remove session/tracking query parameters
/// 8. Sort remaining query parameters alphabetically
/// 9. Remove empty query string (trailing ?)
///
/// The function is total over well-formed URLs and idempotent:
/// `canonicalize(canonicalize(u)) == canonicalize(u)`.
///
/// # Errors
///
/// Returns `UrlError` only for syntactically invalid input (unparseable text,
/// missing scheme, non-HTTP scheme, missing host).
pub fn canonicalize(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if let Some(host) = url.host_str() {
        let mut normalized_host = host.to_lowercase();

        if normalized_host.starts_with("www.") {
            normalized_host = normalized_host[4..].to_string();
        }

        url.set_host(Some(&normalized_host))
            .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;
    } else {
        return Err(UrlError::MissingHost);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let filtered_params = filter_and_sort_query_params(&url);

        if filtered_params.is_empty() {
            url.set_query(None);
        } else {
            let query_string = filtered_params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query_string));
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let segments: Vec<&str> = path.split('/').collect();
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in segments {
        match segment {
            // Skip empty segments (from repeated slashes) and current-directory markers
            "" | "." => continue,
            ".." => {
                if !normalized_segments.is_empty() {
                    normalized_segments.pop();
                }
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out session parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_session_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

/// Checks if a query parameter is a session/tracking parameter
fn is_session_param(key: &str) -> bool {
    let lower = key.to_lowercase();

    if SESSION_PARAMS.contains(&lower.as_str()) {
        return true;
    }

    // Catches any utm parameter not in the explicit list
    lower.starts_with("utm_")
}
