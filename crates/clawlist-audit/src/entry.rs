//! Event type and record types for the audit trail.

use serde::{Deserialize, Serialize};

/// Audit event types.
///
/// Every constraint decision and every detected injection produces exactly
/// one entry of one of these types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEventType {
    /// A buyer offer passed the budget ceiling and was sent.
    #[serde(rename = "OFFER_MADE")]
    OfferMade,
    /// A seller acceptance passed the price floor and was committed.
    #[serde(rename = "OFFER_ACCEPTED")]
    OfferAccepted,
    /// An offer was declined for negotiation reasons (not a hard bound).
    #[serde(rename = "OFFER_REJECTED")]
    OfferRejected,
    /// The constraint validator blocked a price.
    #[serde(rename = "CONSTRAINT_VIOLATION")]
    ConstraintViolation,
    /// Injection markers were found in an incoming message.
    #[serde(rename = "INJECTION_DETECTED")]
    InjectionDetected,
}

impl AuditEventType {
    /// Returns the canonical string label for this event type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OfferMade => "OFFER_MADE",
            Self::OfferAccepted => "OFFER_ACCEPTED",
            Self::OfferRejected => "OFFER_REJECTED",
            Self::ConstraintViolation => "CONSTRAINT_VIOLATION",
            Self::InjectionDetected => "INJECTION_DETECTED",
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditEventType {
    type Err = ParseAuditEventTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OFFER_MADE" => Ok(Self::OfferMade),
            "OFFER_ACCEPTED" => Ok(Self::OfferAccepted),
            "OFFER_REJECTED" => Ok(Self::OfferRejected),
            "CONSTRAINT_VIOLATION" => Ok(Self::ConstraintViolation),
            "INJECTION_DETECTED" => Ok(Self::InjectionDetected),
            _ => Err(ParseAuditEventTypeError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown audit event type string.
#[derive(Debug, Clone)]
pub struct ParseAuditEventTypeError(pub String);

impl std::fmt::Display for ParseAuditEventTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown audit event type: {}", self.0)
    }
}

impl std::error::Error for ParseAuditEventTypeError {}

/// A single line of the audit log.
///
/// Entries are append-only and identified only by their position in the
/// file. Optional fields are omitted from the JSON when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// RFC 3339 timestamp of when the decision was recorded.
    pub timestamp: String,
    /// Profile name of the agent that made the decision.
    pub agent_profile: String,
    /// Simulation run this entry belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub event_type: AuditEventType,
    /// Short description of the decision, e.g. `Offered 150€`.
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Snapshot of the constraint record the decision was checked against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<serde_json::Value>,
    /// Violation codes such as `BUDGET_EXCEEDED:250>200`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<String>>,
    /// Injection markers that triggered this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspicious_content: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AuditEntry {
    /// Creates an entry stamped with the current UTC time.
    pub fn now(
        agent_profile: impl Into<String>,
        event_type: AuditEventType,
        decision: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            agent_profile: agent_profile.into(),
            run_id: None,
            event_type,
            decision: decision.into(),
            reasoning: None,
            constraints: None,
            violations: None,
            suspicious_content: None,
            metadata: None,
        }
    }

    /// Returns the violation prefixes (text before the first `:`).
    pub fn violation_kinds(&self) -> impl Iterator<Item = &str> {
        self.violations
            .iter()
            .flatten()
            .map(|code| code.split(':').next().unwrap_or(code.as_str()))
    }
}
