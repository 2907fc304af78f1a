//! Prompt assembly for extraction requests.

use std::fmt::Write as _;

use brandkit_core::ExtractionKind;

/// Characters of markdown kept per page.
pub const PAGE_CHAR_BUDGET: usize = 12_000;

/// One successfully scraped page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedPage {
    pub url: String,
    pub markdown: String,
}

const SALES_PROFILE_SYSTEM: &str = "You are a B2B sales analyst. Read the website content \
you are given and describe how the company sells. Respond with one JSON object and nothing \
else, using exactly these camelCase keys: companyName (string), companyOverview (string), \
valueProposition (string), targetAudience (string), keyFeatures (string[]), \
productOfferings (string[]), customerPainPoints (string[]), differentiators (string[]), \
competitors (string[]), socialProof ({caseStudies: string[], testimonials: string[], \
metrics: string[], customerLogos: string[]}), pricing (string), callToAction (string). \
Use null or [] when the content does not say.";

const ICP_SUGGESTION_SYSTEM: &str = "You are a go-to-market strategist. Read the website \
content you are given and suggest the ideal customer profile to prospect. Respond with one \
JSON object and nothing else, using exactly these camelCase keys: targetIndustries \
(string[]), targetJobTitles (string[]), companySizes (string[], e.g. \"51-200\"), \
targetLocations (string[]), keywords (string[]), rationale (string). Use null or [] when \
the content gives no basis.";

#[must_use]
pub fn system_prompt(kind: ExtractionKind) -> &'static str {
    match kind {
        ExtractionKind::SalesProfile => SALES_PROFILE_SYSTEM,
        ExtractionKind::IcpSuggestion => ICP_SUGGESTION_SYSTEM,
    }
}

/// Longest prefix of `text` with at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// User prompt: brand identity followed by each page, truncated to
/// [`PAGE_CHAR_BUDGET`].
#[must_use]
pub fn build_prompt(brand_name: Option<&str>, domain: &str, pages: &[ScrapedPage]) -> String {
    let mut prompt = String::new();
    match brand_name {
        Some(name) => {
            let _ = writeln!(prompt, "Company: {name} ({domain})");
        }
        None => {
            let _ = writeln!(prompt, "Company website: {domain}");
        }
    }

    for page in pages {
        let body = truncate_chars(page.markdown.trim(), PAGE_CHAR_BUDGET);
        let _ = write!(prompt, "\n--- PAGE: {} ---\n{}\n", page.url, body);
    }
    prompt
}
