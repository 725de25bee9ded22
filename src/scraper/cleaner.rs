use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static PRICE_SNIPPET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(US\$|\$|price)[^\n]{0,50}").expect("price snippet regex"));
static MOQ_SNIPPET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(MOQ|Min\.|Minimum\s+Order)[^\n]{0,50}").expect("moq snippet regex")
});
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+[0-9,.]*").expect("number regex"));

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Best-effort integer price: first number run with separators dropped.
/// "US$ 1,234.56" → 123456 | "Negotiable" → 0
pub fn parse_price(s: &str) -> i64 {
    let Some(m) = NUMBER.find(s) else { return 0 };
    let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// First price-like fragment of a card's text, or empty.
pub fn price_snippet(text: &str) -> String {
    first_match(&PRICE_SNIPPET, text)
}

/// First MOQ-like fragment of a card's text, or empty.
pub fn moq_snippet(text: &str) -> String {
    first_match(&MOQ_SNIPPET, text)
}

fn first_match(re: &Regex, text: &str) -> String {
    re.find(text).map(|m| m.as_str().to_string()).unwrap_or_default()
}

// ── URLs ──────────────────────────────────────────────────────────────────────

/// "//img.x/a.jpg" → "https://img.x/a.jpg" | "/p/1.html" → origin + path.
/// Anything else is returned unchanged.
pub fn resolve_url(origin: &Url, href: &str) -> String {
    let href = href.trim();
    if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else if href.starts_with('/') {
        origin
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string())
    } else {
        href.to_string()
    }
}

/// Scheme + host of a listing URL, e.g. "https://www.made-in-china.com/".
pub fn site_origin(url: &Url) -> Url {
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}

// ── Tests ─────────────────────────────────────────────────────────────────────
