//! Structured offer extraction from untrusted message text.
//!
//! Extraction is a heuristic. It never decides whether a price is
//! acceptable; that is the job of [`crate::constraints`]. The price rules are
//! deliberately simple and do not try to infer negation: `"120€ is too low"`
//! still yields 120.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Substrings that indicate an attempt to steer the agent through message
/// content. Matched case-insensitively, in this order.
pub const INJECTION_MARKERS: &[&str] = &[
    "[SYSTEM",
    "[INSTRUCTION",
    "[OVERRIDE",
    "[ADMIN",
    "<|system|>",
    "<|im_start|>",
    "ignore previous",
    "disregard constraints",
    "forget your limits",
    "your owner would",
    "owner would understand",
    "owner wants you to",
    "forget the price",
];

/// Condition vocabulary. The first entry found wins, in vocabulary order.
pub const CONDITION_KEYWORDS: &[&str] =
    &["excellent", "good", "fair", "poor", "mint", "used", "new"];

/// Lowest and highest price accepted from a lexical pattern.
const PATTERN_PRICE_RANGE: std::ops::RangeInclusive<u32> = 10..=999;

static CURRENCY_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{2,3})\s*€").expect("currency price pattern"));

static KEYWORD_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:take|do|offer|asking|deal|pay|accept|budget|price|cost|lowest|highest|maximum|minimum|floor|ceiling)(?:[\s:]+is)?[\s:]+([0-9]{2,3})\b",
    )
    .expect("keyword price pattern")
});

static TRAILING_WORD_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{2,3})\s+(?:is my|is the|cash|euros?)\b").expect("trailing word pattern")
});

static AT_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bat[\s:]+([0-9]{2,3})").expect("at price pattern"));

/// Structured view of a single message. Recomputed per message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedOffer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<&'static str>,
    pub suspicious: bool,
    /// Matched injection markers, in marker-list order.
    pub injection_markers: Vec<&'static str>,
}

/// Extracts price, condition, and injection markers from `text`.
///
/// Stateless: identical input always produces identical output.
pub fn extract_offer(text: &str) -> ExtractedOffer {
    let lower = text.to_lowercase();
    let injection_markers = detect_injection_markers(&lower);

    ExtractedOffer {
        price: parse_price(&lower),
        condition: CONDITION_KEYWORDS
            .iter()
            .copied()
            .find(|keyword| lower.contains(keyword)),
        suspicious: !injection_markers.is_empty(),
        injection_markers,
    }
}

/// Returns every marker from [`INJECTION_MARKERS`] present in `text`.
pub fn detect_injection_markers(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    INJECTION_MARKERS
        .iter()
        .copied()
        .filter(|marker| lower.contains(&marker.to_lowercase()))
        .collect()
}

/// Parses a price from message text.
///
/// A number directly followed by `€` wins. Otherwise the lexical patterns
/// are tried in order, and a value is only taken if it falls within
/// `10..=999`. A number immediately followed by `:` is never taken from the
/// `at <n>` pattern, which keeps clock times like `19:15` out.
pub fn parse_price(text: &str) -> Option<f64> {
    let lower = text.to_lowercase();

    if let Some(n) = CURRENCY_PRICE
        .captures(&lower)
        .and_then(|caps| caps[1].parse::<u32>().ok())
    {
        return Some(f64::from(n));
    }

    let keyword = KEYWORD_PRICE.captures(&lower).map(|caps| caps[1].to_string());
    let trailing = TRAILING_WORD_PRICE
        .captures(&lower)
        .map(|caps| caps[1].to_string());
    let at = first_at_price(&lower);

    [keyword, trailing, at]
        .into_iter()
        .flatten()
        .filter_map(|digits| digits.parse::<u32>().ok())
        .find(|n| PATTERN_PRICE_RANGE.contains(n))
        .map(f64::from)
}

fn first_at_price(lower: &str) -> Option<String> {
    AT_PRICE.captures_iter(lower).find_map(|caps| {
        let digits = caps.get(1)?;
        if lower[digits.end()..].starts_with(':') {
            None
        } else {
            Some(digits.as_str().to_string())
        }
    })
}
