//! Room registry, turn engine and session driver for the landlord server.

pub mod config;
pub mod engine;
pub mod error;
pub mod players;
pub mod protocol;
pub mod rooms;
pub mod session;
pub mod table;

pub use config::{EngineConfig, LobbyConfig, ServerConfig};
pub use engine::TurnEngine;
pub use error::{AskError, EngineError, RoomError};
pub use players::{display_name_for_user, Player, PlayerDirectory};
pub use rooms::{should_reap, GameKind, Room, RoomManager, RoomState};
pub use session::Screen;
pub use table::{Phase, Table, TokenQueue};
