//! Hard price bounds for buyer offers and seller acceptances.
//!
//! This module is the sole authority that may declare a price acceptable.
//! It only ever sees a number and a constraint record: message text,
//! injection flags, and claims of "owner approval" have no way in. The
//! same `(price, constraints)` pair always produces the same result,
//! whether the price came from the model, from [`extract_offer`], or from
//! a manual override.
//!
//! [`extract_offer`]: crate::extract_offer

use std::fmt;

use clawlist_types::{BuyerConstraints, SellerConstraints};
use serde::{Serialize, Serializer};

use crate::error::GuardError;

/// A single broken constraint.
///
/// Rendered as a stable code string such as `BUDGET_EXCEEDED:450>200`,
/// which is what lands in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Violation {
    /// Buyer price above the budget ceiling.
    BudgetExceeded { price: f64, max_budget: f64 },
    /// Seller price below the floor.
    FloorViolated { price: f64, min_price: f64 },
    /// Price is zero or negative.
    InvalidPrice { price: f64 },
}

impl Violation {
    /// The code prefix before the first `:`, used for histograms.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            Self::FloorViolated { .. } => "FLOOR_VIOLATED",
            Self::InvalidPrice { .. } => "INVALID_PRICE",
        }
    }

    /// The full violation code.
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BudgetExceeded { price, max_budget } => {
                write!(f, "BUDGET_EXCEEDED:{price}>{max_budget}")
            }
            Self::FloorViolated { price, min_price } => {
                write!(f, "FLOOR_VIOLATED:{price}<{min_price}")
            }
            Self::InvalidPrice { price } => write!(f, "INVALID_PRICE:{price}"),
        }
    }
}

impl Serialize for Violation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of a single validation call. Never mutated after return.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    /// Every violated rule, in rule order.
    pub violations: Vec<Violation>,
    /// Human-readable summary, present only when invalid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationResult {
    fn from_violations(violations: Vec<Violation>, verb: &str) -> Self {
        let reason = if violations.is_empty() {
            None
        } else {
            let codes: Vec<String> = violations.iter().map(Violation::code).collect();
            Some(format!("{verb} rejected: {}", codes.join(", ")))
        };
        Self {
            valid: violations.is_empty(),
            violations,
            reason,
        }
    }

    /// Violation codes as plain strings, for audit entries.
    pub fn codes(&self) -> Vec<String> {
        self.violations.iter().map(Violation::code).collect()
    }
}

fn ensure_finite_price(price: f64) -> Result<(), GuardError> {
    if price.is_finite() {
        Ok(())
    } else {
        Err(GuardError::NonFinitePrice(price))
    }
}

fn ensure_positive_bound(field: &'static str, value: f64) -> Result<(), GuardError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GuardError::InvalidConstraint { field, value })
    }
}

/// Validates a buyer's offer against the budget ceiling.
///
/// A price exactly equal to `max_budget` is valid.
///
/// # Errors
///
/// Returns `GuardError::NonFinitePrice` for NaN or infinite prices and
/// `GuardError::InvalidConstraint` if the ceiling itself is not a positive
/// finite number. These are caller bugs, not rejections.
pub fn validate_buyer_offer(
    price: f64,
    constraints: &BuyerConstraints,
) -> Result<ValidationResult, GuardError> {
    ensure_finite_price(price)?;
    ensure_positive_bound("maxBudget", constraints.max_budget)?;

    let mut violations = Vec::new();
    if price > constraints.max_budget {
        violations.push(Violation::BudgetExceeded {
            price,
            max_budget: constraints.max_budget,
        });
    }
    if price <= 0.0 {
        violations.push(Violation::InvalidPrice { price });
    }

    Ok(ValidationResult::from_violations(violations, "Offer"))
}

/// Validates a seller's acceptance against the price floor.
///
/// A price exactly equal to `min_price` is valid.
///
/// # Errors
///
/// Same contract as [`validate_buyer_offer`].
pub fn validate_seller_acceptance(
    price: f64,
    constraints: &SellerConstraints,
) -> Result<ValidationResult, GuardError> {
    ensure_finite_price(price)?;
    ensure_positive_bound("minPrice", constraints.min_price)?;

    let mut violations = Vec::new();
    if price < constraints.min_price {
        violations.push(Violation::FloorViolated {
            price,
            min_price: constraints.min_price,
        });
    }
    if price <= 0.0 {
        violations.push(Violation::InvalidPrice { price });
    }

    Ok(ValidationResult::from_violations(violations, "Acceptance"))
}
