//! Error types for the negotiation guard.

/// Contract violations raised by the constraint validator.
///
/// These are never folded into a [`ValidationResult`](crate::ValidationResult):
/// they indicate a caller bug that could otherwise slip past the price gate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GuardError {
    /// The price handed to the validator is NaN or infinite.
    #[error("guard contract violation: price is not a finite number ({0})")]
    NonFinitePrice(f64),

    /// A constraint bound is not a positive finite number.
    #[error("guard contract violation: constraint {field} must be a positive finite number, got {value}")]
    InvalidConstraint {
        /// The constraint field, e.g. `maxBudget`.
        field: &'static str,
        /// The offending value.
        value: f64,
    },
}
