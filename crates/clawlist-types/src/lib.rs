//! Shared types for the Clawlist negotiation supervisor.
//!
//! This crate provides the data model used across all Clawlist crates:
//! room events as seen by the poller, buyer profiles loaded from
//! configuration, the hard price constraints enforced by the guard, the run
//! outcome taxonomy consumed by the sweep engine, and scenario definitions.
//!
//! No crate in the workspace depends on anything *except* `clawlist-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

use serde::{Deserialize, Serialize};
use std::fmt;

mod scenario;
pub use scenario::{
    BuyerScenario, IssueSeverity, Scenario, ScenarioIssue, SeedTemplate, SellerScenario,
    RUN_ID_PLACEHOLDER,
};

/// Event kind carried by ordinary text messages in a room timeline.
pub const MESSAGE_EVENT_KIND: &str = "m.room.message";

/// A single event read from the marketplace room timeline.
///
/// Immutable once received. The poller reads it, classifies it, and either
/// schedules triggers for it or drops it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEvent {
    /// Server-assigned unique event identifier.
    pub event_id: String,
    /// Chat identity of the sender.
    pub sender: String,
    /// Plain-text message body (empty for non-message events).
    pub body: String,
    /// Event kind, e.g. `m.room.message`.
    pub kind: String,
    /// Origin timestamp in milliseconds since the epoch.
    pub origin_server_ts: i64,
}

impl RoomEvent {
    /// Returns `true` if this is a text message event.
    pub fn is_message(&self) -> bool {
        self.kind == MESSAGE_EVENT_KIND
    }
}

/// A buyer agent watching the marketplace room.
///
/// Loaded from configuration at startup and immutable for the process
/// lifetime.
#[derive(Clone, Serialize, Deserialize)]
pub struct BuyerProfile {
    /// Agent profile name, passed to the dispatch command.
    pub profile: String,
    /// Interest keywords matched case-insensitively against listing bodies.
    pub interests: Vec<String>,
    /// Chat identity of the buyer, e.g. `@switch_buyer:localhost`.
    pub user_id: String,
    /// Chat credential used for room reads.
    #[serde(skip_serializing)]
    pub access_token: String,
    /// Agent gateway endpoint that receives triggers.
    pub gateway_url: String,
    /// Bearer token for the agent gateway.
    #[serde(skip_serializing)]
    pub gateway_token: String,
}

impl BuyerProfile {
    /// Returns `true` if any interest keyword occurs in `body`, ignoring case.
    pub fn matches(&self, body: &str) -> bool {
        let lower = body.to_lowercase();
        self.interests
            .iter()
            .any(|keyword| lower.contains(&keyword.to_lowercase()))
    }
}

impl fmt::Debug for BuyerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuyerProfile")
            .field("profile", &self.profile)
            .field("interests", &self.interests)
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .field("gateway_url", &self.gateway_url)
            .field("gateway_token", &"[REDACTED]")
            .finish()
    }
}

/// Hard limits for a buyer agent.
///
/// Set once per negotiation. Nothing derived from message content may alter
/// these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerConstraints {
    /// Hard price ceiling. Offers above this are never valid.
    pub max_budget: f64,
    /// Minimum acceptable item condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_quality: Option<String>,
    /// Items that must be part of the deal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_items: Option<Vec<String>>,
}

impl BuyerConstraints {
    /// Creates constraints with only a budget ceiling.
    pub fn with_budget(max_budget: f64) -> Self {
        Self {
            max_budget,
            min_quality: None,
            required_items: None,
        }
    }
}

/// Hard limits for a seller agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerConstraints {
    /// Hard price floor. Acceptances below this are never valid.
    pub min_price: f64,
    /// Maximum discount in percent relative to the anchor price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_discount: Option<f64>,
    /// Buyer identities the seller refuses to deal with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_buyers: Option<Vec<String>>,
}

impl SellerConstraints {
    /// Creates constraints with only a price floor.
    pub fn with_floor(min_price: f64) -> Self {
        Self {
            min_price,
            max_discount: None,
            blocked_buyers: None,
        }
    }
}

/// Final classification of a completed simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunOutcome {
    /// A deal was reached within constraints.
    #[serde(rename = "pass")]
    Pass,
    /// The run failed (crash, timeout, or rule breach).
    #[serde(rename = "fail")]
    Fail,
    /// The agents talked but did not agree on a price.
    #[serde(rename = "no_deal")]
    NoDeal,
}

impl RunOutcome {
    /// Returns the canonical string label for this outcome.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::NoDeal => "no_deal",
        }
    }

    /// Derives an outcome from a bare deal flag when no explicit result was
    /// recorded.
    pub fn from_deal_reached(deal_reached: bool) -> Self {
        if deal_reached {
            Self::Pass
        } else {
            Self::NoDeal
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunOutcome {
    type Err = ParseRunOutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            "no_deal" => Ok(Self::NoDeal),
            _ => Err(ParseRunOutcomeError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown run outcome string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown run outcome: {0}")]
pub struct ParseRunOutcomeError(pub String);
