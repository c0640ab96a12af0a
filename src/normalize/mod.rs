//! Text normalization for counts, prices, ratings and delivery phrases.
//!
//! Every function here is total: malformed or partial input degrades to
//! [`UNKNOWN`] instead of failing, so one bad field never costs a record.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::UNKNOWN;

/// `<digits>[.decimal]?[K|M]?[+]?` directly followed by a count keyword.
static COUNT_WITH_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d[\d,]*(?:\.\d+)?\s*[km]?\+?)\s*(?:bought|sold|purchased|ratings?|reviews?)\b",
    )
    .expect("valid regex")
});

/// The same numeric shape, anchored to the whole input.
static BARE_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\d[\d,]*(?:\.\d+)?\s*[km]?\+?$").expect("valid regex"));

static RATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:out\s+of|stars?)").expect("valid regex")
});

static BARE_RATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-5](?:\.\d+)?)\s*★?$").expect("valid regex"));

static DAY_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d{1,2}\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)")
        .expect("valid regex")
});

static GET_IT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)get it\s+(?:by|on|before)\b").expect("valid regex"));

static UNITS_SOLD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?\s*[km]?\+?)\s*(?:bought|sold|purchased)\b")
        .expect("valid regex")
});

static RATING_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?\s*[km]?\+?)\s*(?:ratings?|reviews?)\b")
        .expect("valid regex")
});

/// Which keywords may qualify a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountKeywords {
    /// bought, sold, purchased, rating(s), review(s)
    Any,
    /// bought, sold, purchased
    UnitsSold,
    /// rating(s), review(s)
    Ratings,
}

impl CountKeywords {
    fn pattern(self) -> &'static Regex {
        match self {
            Self::Any => &COUNT_WITH_KEYWORD_RE,
            Self::UnitsSold => &UNITS_SOLD_RE,
            Self::Ratings => &RATING_COUNT_RE,
        }
    }
}

/// Normalizes a units-sold or rating-count phrase to a canonical count.
///
/// `"1K+ bought in past month"` becomes `"1K+"`, `"2,500 ratings"` becomes
/// `"2500"`. Input with neither a keyword-qualified number nor a bare number
/// yields [`UNKNOWN`]. Applying it to its own output is a no-op.
#[must_use]
pub fn normalize_count(raw: &str) -> String {
    normalize_count_with(raw, CountKeywords::Any, true)
}

/// [`normalize_count`] restricted to one keyword family.
///
/// With `allow_bare` unset, a number without a qualifying keyword is
/// rejected; used when scanning text that may contain unrelated numbers.
#[must_use]
pub fn normalize_count_with(raw: &str, keywords: CountKeywords, allow_bare: bool) -> String {
    let text = raw.trim();

    if let Some(caps) = keywords.pattern().captures(text) {
        return canonical_count(&caps[1]);
    }

    if allow_bare {
        // Rating counts are often rendered as "(36,417)".
        let bare = text.trim_matches(|c: char| c.is_whitespace() || c == '(' || c == ')');
        if BARE_COUNT_RE.is_match(bare) {
            return canonical_count(bare);
        }
    }

    UNKNOWN.to_string()
}

fn canonical_count(matched: &str) -> String {
    matched
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Parts of a price rendered as separate elements.
#[derive(Debug, Clone, Default)]
pub struct PriceParts<'a> {
    pub symbol: Option<&'a str>,
    pub whole: Option<&'a str>,
    pub fraction: Option<&'a str>,
}

/// Builds a display price.
///
/// A pre-rendered full price string wins. Otherwise the price is rebuilt as
/// `symbol + whole + "." + fraction`, with `default_symbol` and
/// `default_fraction` standing in for missing parts. A whole part without
/// any digit is unusable.
#[must_use]
pub fn normalize_price(
    full: Option<&str>,
    parts: &PriceParts<'_>,
    default_symbol: &str,
    default_fraction: &str,
) -> String {
    if let Some(full) = full.map(str::trim).filter(|s| !s.is_empty()) {
        return full.to_string();
    }

    let Some(whole) = parts.whole else {
        return UNKNOWN.to_string();
    };
    let digits: String = whole.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return UNKNOWN.to_string();
    }

    let symbol = parts
        .symbol
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_symbol);
    let fraction: String = parts
        .fraction
        .map(|f| f.chars().filter(char::is_ascii_digit).collect::<String>())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| default_fraction.to_string());

    format!("{symbol}{digits}.{fraction}")
}

/// Extracts a star rating such as `"4.3"` from `"4.3 out of 5 stars"`.
///
/// A lone decimal between 0 and 5, optionally followed by a star glyph, is
/// accepted too: some layouts render the rating badge without a qualifier.
#[must_use]
pub fn normalize_rating(raw: &str) -> String {
    let text = raw.trim();
    if let Some(caps) = RATING_RE.captures(text) {
        return caps[1].to_string();
    }
    if let Some(caps) = BARE_RATING_RE.captures(text) {
        return caps[1].to_string();
    }
    UNKNOWN.to_string()
}

/// True when `text` reads like a delivery estimate.
#[must_use]
pub fn looks_like_delivery(text: &str) -> bool {
    text.contains("Delivery")
        || text.contains("Get it")
        || DAY_MONTH_RE.is_match(text)
        || GET_IT_RE.is_match(text)
}

/// Collapses runs of whitespace and trims; empty input becomes [`UNKNOWN`].
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        UNKNOWN.to_string()
    } else {
        collapsed
    }
}
