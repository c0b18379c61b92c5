//! Error taxonomy.
//!
//! - [`ValidationError`]: a request was rejected before any state changed.
//! - [`StoreError`]: the [`OrderStore`](crate::OrderStore) contract error.
//! - [`InvariantViolation`]: internal state is inconsistent. Never expected to
//!   reach a caller; the engine logs it and aborts.

use crate::{BracketId, OcoId, OrderId};

/// Errors returned by request validation. No state is mutated when one is returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ValidationError {
    #[error("symbol must not be empty")]
    EmptySymbol,
    #[error("quantity must be greater than zero")]
    ZeroQuantity,
    /// A price field was zero or negative. The payload names the field.
    #[error("{0} must be greater than zero")]
    NonPositivePrice(&'static str),
    #[error("stop loss must be below entry for BUY")]
    StopLossNotBelowEntry,
    #[error("take profit must be above entry for BUY")]
    TakeProfitNotAboveEntry,
    #[error("stop loss must be above entry for SELL")]
    StopLossNotAboveEntry,
    #[error("take profit must be below entry for SELL")]
    TakeProfitNotBelowEntry,
    #[error("trailing distance must be greater than zero")]
    NonPositiveTrailDistance,
    #[error("trailing percentage must be in (0, 1)")]
    InvalidTrailPercentage,
    #[error("oco group needs at least 2 legs, got {0}")]
    TooFewLegs(usize),
    #[error("oco leg {0} is missing its limit price")]
    MissingLimitPrice(usize),
    #[error("oco leg {0} is missing its stop price")]
    MissingStopPrice(usize),
    #[error("expiry must be later than the current time")]
    ExpiryNotInFuture,
}

/// Errors from the order store contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    NotFound(OrderId),
    #[error("order {0} already exists")]
    DuplicateId(OrderId),
}

/// Internal inconsistency: a reference that must resolve did not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("bracket {0} not found")]
    MissingBracket(BracketId),
    #[error("oco group {0} not found")]
    MissingOco(OcoId),
}
