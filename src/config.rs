//! Engine policy knobs.

/// Which bracket exit wins when one tick satisfies both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TieBreak {
    #[default]
    StopLoss,
    TakeProfit,
}

/// Behavior switches of an [`OrderEngine`](crate::OrderEngine).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Only evaluate bracket exits once the entry has filled. When off,
    /// stop-loss and take-profit are live from creation.
    pub gate_exit_legs: bool,
    pub exit_tie_break: TieBreak,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gate_exit_legs: true,
            exit_tie_break: TieBreak::StopLoss,
        }
    }
}

impl EngineConfig {
    pub fn with_gate_exit_legs(mut self, gate: bool) -> Self {
        self.gate_exit_legs = gate;
        self
    }

    pub fn with_exit_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.exit_tie_break = tie_break;
        self
    }
}
