//! Rules, card algebra and round state for the wildcard landlord game.
//!
//! Everything here is synchronous and deterministic for a given seed; the
//! server owns locking, turn tokens and I/O.

pub mod card;
pub mod faces;
pub mod game;
pub mod hand;
pub mod rules;

pub use card::{standard_deck, Card, Rank, Suit};
pub use faces::{parse_faces, Face, FaceKind};
pub use game::{BidTurn, Crowning, Game, PlayOutcome, PlayerId, RoundPhase};
pub use hand::{format_hand, format_played, RemainingCounts, SelectedCard};
pub use rules::{LandlordRules, RuleSet, TeamRules};

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("players count does not fit the deal")]
    PlayerCountMismatch,
    #[error("player is not seated in this game")]
    UnknownPlayer,
    #[error("the round is not in that phase")]
    WrongPhase,
    #[error("cards do not form a valid play")]
    InvalidFaces,
    #[error("you must play this turn")]
    MustPlay,
    #[error("your cards do not beat the last play")]
    MustBeatPrevious,
}
