//! Aggregate view of live orders.

use std::collections::BTreeMap;
use std::fmt;

use crate::Symbol;

/// Active order counts per side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SideCounts {
    pub buy: usize,
    pub sell: usize,
}

/// Snapshot returned by [`OrderEngine::portfolio_summary`](crate::OrderEngine::portfolio_summary).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortfolioSummary {
    /// Orders that can still fill
    pub active_orders: usize,
    /// Bracket groups not closed
    pub bracket_orders: usize,
    /// OCO groups still pending
    pub oco_orders: usize,
    /// Trailing stops still pending or active
    pub trailing_stops: usize,
    /// Active orders per symbol, sorted by symbol
    pub by_symbol: BTreeMap<Symbol, SideCounts>,
}

impl fmt::Display for PortfolioSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "active orders:  {}", self.active_orders)?;
        writeln!(f, "brackets:       {}", self.bracket_orders)?;
        writeln!(f, "oco groups:     {}", self.oco_orders)?;
        write!(f, "trailing stops: {}", self.trailing_stops)?;
        for (symbol, counts) in &self.by_symbol {
            write!(f, "\n  {symbol:<8} buy {:>3}  sell {:>3}", counts.buy, counts.sell)?;
        }
        Ok(())
    }
}
