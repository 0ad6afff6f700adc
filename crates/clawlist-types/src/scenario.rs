//! Negotiation scenario definitions and their structural checks.

use serde::{Deserialize, Serialize};

use crate::{BuyerConstraints, SellerConstraints};

/// Placeholder that seed templates must contain so listings carry a
/// per-run correlation id.
pub const RUN_ID_PLACEHOLDER: &str = "{RUN_ID}";

/// Scenario durations above this many seconds are flagged.
const LONG_DURATION_SEC: f64 = 600.0;

/// A single negotiation scenario: one seller, one buyer, one item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scenario {
    pub name: String,
    pub item: String,
    pub market_room_alias: String,
    pub seller: SellerScenario,
    pub buyer: BuyerScenario,
    pub duration_sec: f64,
    pub seed: SeedTemplate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SellerScenario {
    pub profile: String,
    /// Opening asking price.
    pub anchor_price: f64,
    /// Hard floor handed to the seller's constraint validator.
    pub floor_price: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuyerScenario {
    pub profile: String,
    pub start_offer: f64,
    /// Hard ceiling handed to the buyer's constraint validator.
    pub ceiling_price: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedTemplate {
    pub body_template: String,
}

/// How serious a scenario issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// The scenario cannot be run.
    Error,
    /// The scenario runs but is likely misconfigured.
    Warning,
}

/// A field-scoped problem found by [`Scenario::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioIssue {
    /// Dotted path of the offending field, e.g. `buyer.ceilingPrice`.
    pub field: String,
    pub message: String,
    pub severity: IssueSeverity,
}

impl ScenarioIssue {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            severity: IssueSeverity::Error,
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            severity: IssueSeverity::Warning,
        }
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl Scenario {
    /// Checks the scenario for missing fields, non-positive prices, and
    /// inconsistent price bounds.
    ///
    /// Returns every issue found; an empty list means the scenario is clean.
    pub fn validate(&self) -> Vec<ScenarioIssue> {
        let mut issues = Vec::new();

        for (field, value) in [
            ("name", &self.name),
            ("item", &self.item),
            ("marketRoomAlias", &self.market_room_alias),
            ("seller.profile", &self.seller.profile),
            ("buyer.profile", &self.buyer.profile),
        ] {
            if value.trim().is_empty() {
                issues.push(ScenarioIssue::error(field, "Required string field"));
            }
        }

        // ── Seller ───────────────────────────────────────────────────────
        if !is_positive(self.seller.anchor_price) {
            issues.push(ScenarioIssue::error(
                "seller.anchorPrice",
                "Must be positive number",
            ));
        }
        if !is_positive(self.seller.floor_price) {
            issues.push(ScenarioIssue::error(
                "seller.floorPrice",
                "Must be positive number",
            ));
        }
        if self.seller.floor_price > self.seller.anchor_price {
            issues.push(ScenarioIssue::error(
                "seller.floorPrice",
                "Floor price must be <= anchor price",
            ));
        }

        // ── Buyer ────────────────────────────────────────────────────────
        if !is_positive(self.buyer.start_offer) {
            issues.push(ScenarioIssue::error(
                "buyer.startOffer",
                "Must be positive number",
            ));
        }
        if !is_positive(self.buyer.ceiling_price) {
            issues.push(ScenarioIssue::error(
                "buyer.ceilingPrice",
                "Must be positive number",
            ));
        }
        if self.buyer.start_offer > self.buyer.ceiling_price {
            issues.push(ScenarioIssue::error(
                "buyer.startOffer",
                "Start offer must be <= ceiling price",
            ));
        }

        // ── Duration and seed ────────────────────────────────────────────
        if !is_positive(self.duration_sec) {
            issues.push(ScenarioIssue::error("durationSec", "Must be positive number"));
        } else if self.duration_sec > LONG_DURATION_SEC {
            issues.push(ScenarioIssue::warning(
                "durationSec",
                "duration > 10 minutes may be too long",
            ));
        }

        if self.seed.body_template.trim().is_empty() {
            issues.push(ScenarioIssue::error(
                "seed.bodyTemplate",
                "Required string field",
            ));
        } else if !self.seed.body_template.contains(RUN_ID_PLACEHOLDER) {
            issues.push(ScenarioIssue::warning(
                "seed.bodyTemplate",
                "Should include {RUN_ID} placeholder for deduplication",
            ));
        }

        if is_positive(self.seller.floor_price)
            && is_positive(self.buyer.ceiling_price)
            && self.seller.floor_price > self.buyer.ceiling_price
        {
            issues.push(ScenarioIssue::error(
                "negotiation",
                format!(
                    "No overlap zone! Seller floor ({}) > Buyer ceiling ({})",
                    self.seller.floor_price, self.buyer.ceiling_price
                ),
            ));
        }

        issues
    }

    /// Returns `true` if [`validate`](Self::validate) reports no errors.
    /// Warnings do not make a scenario invalid.
    pub fn is_valid(&self) -> bool {
        self.validate()
            .iter()
            .all(|issue| issue.severity != IssueSeverity::Error)
    }

    /// Hard limits for the buyer agent in this scenario.
    pub fn buyer_constraints(&self) -> BuyerConstraints {
        BuyerConstraints::with_budget(self.buyer.ceiling_price)
    }

    /// Hard limits for the seller agent in this scenario.
    pub fn seller_constraints(&self) -> SellerConstraints {
        SellerConstraints::with_floor(self.seller.floor_price)
    }

    /// Renders the seed listing for a run, substituting the run id.
    pub fn seed_body(&self, run_id: &str) -> String {
        self.seed.body_template.replace(RUN_ID_PLACEHOLDER, run_id)
    }
}
