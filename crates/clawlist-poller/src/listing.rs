//! Listing detection for marketplace messages.

use std::sync::LazyLock;

use regex::Regex;

static ASKING_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"asking \d+€").expect("asking price pattern"));

static PRICE_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)price.*\d+").expect("price mention pattern"));

/// Returns `true` if `body` looks like a sale listing.
///
/// A body qualifies if it contains `SELLING` or `RUN_ID` (case-sensitive),
/// contains `asking <digits>€`, or mentions `price` followed later on the
/// same line by a digit.
pub fn is_listing(body: &str) -> bool {
    body.contains("SELLING")
        || body.contains("RUN_ID")
        || ASKING_PRICE.is_match(body)
        || PRICE_MENTION.is_match(body)
}
