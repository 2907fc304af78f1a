//! Choosing which pages of a site to scrape.

use std::collections::HashSet;

use brandkit_core::{extract_domain, is_same_site, ExtractionKind};
use reqwest::Url;

/// Path fragments that never carry sales or audience signal.
const EXCLUDED_PATH_MARKERS: &[&str] = &[
    "/blog/", "/news/", "/careers", "/jobs", "/legal", "/privacy", "/terms", "/cookie", "/login",
    "/signin", "/signup", "/register", "/cart", "/checkout",
];

fn keywords(kind: ExtractionKind) -> &'static [&'static str] {
    match kind {
        ExtractionKind::SalesProfile => &[
            "pricing", "product", "feature", "solution", "platform", "customer", "case-stud",
            "about", "why", "compare",
        ],
        ExtractionKind::IcpSuggestion => &[
            "customer", "case-stud", "industr", "solution", "use-case", "who-we-serve", "about",
            "testimonial", "partner", "enterprise",
        ],
    }
}

/// Canonical form used for de-duplication: normalized host, path without a
/// trailing slash, and query. Scheme and fragment are ignored.
fn dedupe_key(url: &Url) -> String {
    let host = url.host_str().and_then(extract_domain).unwrap_or_default();
    let path = url.path().trim_end_matches('/').to_ascii_lowercase();
    match url.query() {
        Some(query) => format!("{host}{path}?{query}"),
        None => format!("{host}{path}"),
    }
}

fn score(url: &Url, kind: ExtractionKind) -> i64 {
    let path = url.path().to_ascii_lowercase();
    let hits = keywords(kind)
        .iter()
        .filter(|keyword| path.contains(*keyword))
        .count();
    let depth = url.path_segments().map_or(0, |s| s.filter(|p| !p.is_empty()).count());
    i64::try_from(hits).unwrap_or(i64::MAX) * 10 - i64::try_from(depth).unwrap_or(i64::MAX)
}

/// Pick up to `max_pages` URLs to scrape, homepage first.
///
/// Mapped URLs must be http(s) on `domain` or one of its subdomains. They are
/// de-duplicated, filtered against boilerplate paths, and ranked by how many
/// kind-specific keywords their path contains (shallower paths win ties,
/// then map order).
#[must_use]
pub fn select_pages(
    homepage: &str,
    domain: &str,
    mapped: &[String],
    kind: ExtractionKind,
    max_pages: usize,
) -> Vec<String> {
    let max_pages = max_pages.max(1);
    let mut seen = HashSet::new();
    if let Ok(home) = Url::parse(homepage) {
        seen.insert(dedupe_key(&home));
    }

    let mut candidates: Vec<(i64, usize, Url)> = mapped
        .iter()
        .filter_map(|raw| Url::parse(raw.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .filter(|url| {
            url.host_str()
                .and_then(extract_domain)
                .is_some_and(|host| is_same_site(&host, domain))
        })
        .filter(|url| {
            let path = format!("{}/", url.path().to_ascii_lowercase());
            !EXCLUDED_PATH_MARKERS.iter().any(|m| path.contains(m))
        })
        .filter(|url| seen.insert(dedupe_key(url)))
        .enumerate()
        .map(|(position, url)| (score(&url, kind), position, url))
        .collect();

    candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    std::iter::once(homepage.to_string())
        .chain(candidates.into_iter().map(|(_, _, mut url)| {
            url.set_fragment(None);
            url.to_string()
        }))
        .take(max_pages)
        .collect()
}
