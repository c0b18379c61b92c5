//! Command journal for deterministic replay.
//!
//! Every mutating call on an [`OrderEngine`] is recorded as a [`Command`]
//! carrying the clock reading it ran with. Replaying the same commands with
//! the same id generator reproduces the same ids, states and events:
//! - debugging and audit trails
//! - offline simulation of recorded sessions
//! - persistence (see the `persistence` feature)

use crate::{
    BracketHandle, BracketId, BracketRequest, OcoHandle, OcoId, OcoRequest, OrderId, Price,
    Symbol, Timestamp, TrailingRequest,
};
#[cfg(feature = "event-log")]
use crate::{EngineConfig, Event, IdGenerator, ManualClock, OrderEngine, SequentialIds, ValidationError};

/// An input to the engine.
///
/// Commands capture inputs, not outputs: events are recomputed on replay.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Command {
    CreateBracket {
        #[cfg_attr(feature = "serde", serde(default))]
        at: Timestamp,
        #[cfg_attr(feature = "serde", serde(flatten))]
        request: BracketRequest,
    },
    CreateOco {
        #[cfg_attr(feature = "serde", serde(default))]
        at: Timestamp,
        #[cfg_attr(feature = "serde", serde(flatten))]
        request: OcoRequest,
    },
    CreateTrailing {
        #[cfg_attr(feature = "serde", serde(default))]
        at: Timestamp,
        #[cfg_attr(feature = "serde", serde(flatten))]
        request: TrailingRequest,
    },
    PriceTick {
        #[cfg_attr(feature = "serde", serde(default))]
        at: Timestamp,
        symbol: Symbol,
        price: Price,
    },
    Cancel {
        #[cfg_attr(feature = "serde", serde(default))]
        at: Timestamp,
        order_id: OrderId,
    },
    CancelBracket {
        #[cfg_attr(feature = "serde", serde(default))]
        at: Timestamp,
        bracket_id: BracketId,
    },
    CancelOco {
        #[cfg_attr(feature = "serde", serde(default))]
        at: Timestamp,
        oco_id: OcoId,
    },
}

impl Command {
    /// Clock reading the command ran with.
    pub fn at(&self) -> Timestamp {
        match *self {
            Command::CreateBracket { at, .. }
            | Command::CreateOco { at, .. }
            | Command::CreateTrailing { at, .. }
            | Command::PriceTick { at, .. }
            | Command::Cancel { at, .. }
            | Command::CancelBracket { at, .. }
            | Command::CancelOco { at, .. } => at,
        }
    }

    /// A tick command.
    pub fn tick(at: Timestamp, symbol: Symbol, price: Price) -> Self {
        Command::PriceTick { at, symbol, price }
    }

    /// A cancel command.
    pub fn cancel(at: Timestamp, order_id: OrderId) -> Self {
        Command::Cancel { at, order_id }
    }
}

/// What applying one command returned.
#[derive(Clone, Debug, PartialEq)]
pub enum ApplyResult {
    Bracket(Result<BracketHandle, crate::ValidationError>),
    Oco(Result<OcoHandle, crate::ValidationError>),
    Trailing(Result<OrderId, crate::ValidationError>),
    Tick(Result<Vec<crate::Event>, crate::ValidationError>),
    /// Result of any of the cancel commands
    Cancelled(bool),
}

impl ApplyResult {
    /// Events produced by a tick command; empty for everything else.
    #[cfg(feature = "event-log")]
    pub fn events(&self) -> &[Event] {
        match self {
            ApplyResult::Tick(Ok(events)) => events,
            _ => &[],
        }
    }

    /// The validation error, if the command was rejected.
    #[cfg(feature = "event-log")]
    pub fn error(&self) -> Option<ValidationError> {
        match self {
            ApplyResult::Bracket(Err(e))
            | ApplyResult::Oco(Err(e))
            | ApplyResult::Trailing(Err(e))
            | ApplyResult::Tick(Err(e)) => Some(*e),
            _ => None,
        }
    }
}

#[cfg(feature = "event-log")]
impl OrderEngine {
    /// Apply one command using its recorded timestamp instead of the clock.
    ///
    /// The command is recorded in this engine's journal.
    pub fn apply(&mut self, command: &Command) -> ApplyResult {
        match command {
            Command::CreateBracket { at, request } => {
                ApplyResult::Bracket(self.create_bracket_at(request.clone(), *at))
            }
            Command::CreateOco { at, request } => {
                ApplyResult::Oco(self.create_oco_at(request.clone(), *at))
            }
            Command::CreateTrailing { at, request } => {
                ApplyResult::Trailing(self.create_trailing_at(request.clone(), *at))
            }
            Command::PriceTick { at, symbol, price } => {
                ApplyResult::Tick(self.submit_price_tick_at(*symbol, *price, *at))
            }
            Command::Cancel { at, order_id } => {
                ApplyResult::Cancelled(self.cancel_order_at(*order_id, *at))
            }
            Command::CancelBracket { at, bracket_id } => {
                ApplyResult::Cancelled(self.cancel_bracket_at(*bracket_id, *at))
            }
            Command::CancelOco { at, oco_id } => {
                ApplyResult::Cancelled(self.cancel_oco_at(*oco_id, *at))
            }
        }
    }

    /// Apply commands in sequence. Returns every event produced.
    pub fn apply_all(&mut self, commands: &[Command]) -> Vec<Event> {
        commands
            .iter()
            .flat_map(|c| self.apply(c).events().to_vec())
            .collect()
    }

    /// Rebuild an engine from a journal with default policy and sequential ids.
    pub fn replay(commands: &[Command]) -> Self {
        Self::replay_with(EngineConfig::default(), Box::new(SequentialIds::new()), commands)
    }

    /// Rebuild an engine from a journal.
    ///
    /// `ids` must produce the same sequence as the generator of the
    /// recording engine. The replayed engine keeps a manual clock left at the
    /// last command's timestamp.
    pub fn replay_with(
        config: EngineConfig,
        ids: Box<dyn IdGenerator>,
        commands: &[Command],
    ) -> Self {
        let clock = ManualClock::new(0);
        let mut engine = Self::with_parts(config, ids, Box::new(clock.clone()));
        for command in commands {
            clock.set(command.at());
            engine.apply(command);
        }
        engine
    }
}

#[cfg(all(test, feature = "event-log"))]
mod tests {
    use super::*;
    use crate::{OcoLeg, Side};

    fn eurusd() -> Symbol {
        Symbol::new("EURUSD")
    }

    #[test]
    fn engine_records_every_call() {
        let mut engine = OrderEngine::with_parts(
            EngineConfig::default(),
            Box::new(SequentialIds::new()),
            Box::new(ManualClock::new(5)),
        );
        let request =
            BracketRequest::new(eurusd(), Side::Buy, Price(1_0850), 1000, Price(1_0800), Price(1_0950));
        engine.create_bracket_order(request.clone()).unwrap();
        engine.submit_price_tick(eurusd(), Price(1_0840)).unwrap();
        engine.cancel_order(OrderId(99));

        assert_eq!(
            engine.commands(),
            &[
                Command::CreateBracket { at: 5, request },
                Command::tick(5, eurusd(), Price(1_0840)),
                Command::cancel(5, OrderId(99)),
            ]
        );

        engine.clear_commands();
        assert!(engine.commands().is_empty());
    }

    #[test]
    fn replay_reproduces_state_and_events() {
        let gbp = Symbol::new("GBPUSD");
        let commands = vec![
            Command::CreateBracket {
                at: 1,
                request: BracketRequest::new(
                    eurusd(), Side::Buy, Price(1_0850), 1000, Price(1_0800), Price(1_0950),
                ),
            },
            Command::CreateOco {
                at: 2,
                request: OcoRequest::new(
                    gbp,
                    500,
                    vec![OcoLeg::limit(Side::Sell, Price(1_2750)), OcoLeg::stop(Side::Sell, Price(1_2650))],
                ),
            },
            Command::tick(3, eurusd(), Price(1_0850)),
            Command::tick(4, gbp, Price(1_2640)),
            Command::tick(5, eurusd(), Price(1_0790)),
        ];

        let mut live = OrderEngine::with_parts(
            EngineConfig::default(),
            Box::new(SequentialIds::new()),
            Box::new(ManualClock::new(0)),
        );
        let live_events = live.apply_all(&commands);
        assert_eq!(live_events.len(), 3);

        let replayed = OrderEngine::replay(live.commands());
        assert_eq!(replayed.commands(), live.commands());
        assert_eq!(replayed.portfolio_summary(), live.portfolio_summary());
        for id in 1..=8 {
            assert_eq!(replayed.get_order(OrderId(id)), live.get_order(OrderId(id)));
        }
        assert_eq!(replayed.now(), 5);
    }

    #[test]
    fn apply_reports_rejections() {
        let mut engine = OrderEngine::default();
        let result = engine.apply(&Command::tick(0, eurusd(), Price(0)));
        assert_eq!(
            result.error(),
            Some(ValidationError::NonPositivePrice("tick price"))
        );
        assert!(result.events().is_empty());
    }
}
