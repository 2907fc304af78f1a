//! Canonical domain extraction for brand identity.
//!
//! A brand's domain is the lowercase host of its URL with any leading `www.`
//! removed. Scheme, port, path, query and fragment never participate.

use url::Url;

/// Normalize a URL (or bare host) into a canonical domain string.
///
/// Returns `None` when no host can be recovered from the input.
///
/// ```
/// use brandkit_core::extract_domain;
///
/// assert_eq!(extract_domain("https://www.Example.com/path").as_deref(), Some("example.com"));
/// assert_eq!(extract_domain("sub.example.com").as_deref(), Some("sub.example.com"));
/// ```
#[must_use]
pub fn extract_domain(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches("//"))
    };

    let parsed = Url::parse(&candidate).ok()?;
    let host = parsed.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Returns `true` when `host` is `domain` itself or one of its subdomains.
#[must_use]
pub fn is_same_site(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_www_and_path() {
        assert_eq!(
            extract_domain("https://www.Example.com/path").as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn strips_port() {
        assert_eq!(
            extract_domain("http://example.com:8080/x").as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn accepts_bare_host_without_scheme() {
        assert_eq!(
            extract_domain("sub.example.com").as_deref(),
            Some("sub.example.com")
        );
    }

    #[test]
    fn drops_query_and_fragment() {
        assert_eq!(
            extract_domain("https://shop.example.com/?utm_source=x#top").as_deref(),
            Some("shop.example.com")
        );
    }

    #[test]
    fn bare_host_with_www_and_path() {
        assert_eq!(
            extract_domain("WWW.Acme.io/about").as_deref(),
            Some("acme.io")
        );
    }

    #[test]
    fn only_leading_www_is_removed() {
        assert_eq!(
            extract_domain("https://wwwidgets.com").as_deref(),
            Some("wwwidgets.com")
        );
        assert_eq!(
            extract_domain("https://app.www.example.com").as_deref(),
            Some("app.www.example.com")
        );
    }

    #[test]
    fn trailing_dot_is_removed() {
        assert_eq!(
            extract_domain("https://example.com./").as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn empty_and_garbage_inputs_yield_none() {
        assert_eq!(extract_domain(""), None);
        assert_eq!(extract_domain("   "), None);
        assert_eq!(extract_domain("https://"), None);
    }

    #[test]
    fn same_site_matches_subdomains_only_on_label_boundary() {
        assert!(is_same_site("example.com", "example.com"));
        assert!(is_same_site("blog.example.com", "example.com"));
        assert!(!is_same_site("badexample.com", "example.com"));
        assert!(!is_same_site("example.org", "example.com"));
    }
}
